//! Silent (pseudorandom-correlation) 1-of-2 random OT.
//!
//! Ferret-style one-shot primal construction: the sender's global
//! correlation `Δ` is planted in `t` punctured GGM trees ([`spcot`]), one
//! noise position per tree; a `d = 10` local linear code ([`lpn`]) over `k`
//! IKNP-base correlated OTs compresses the sparse correlation into `n`
//! correlated OTs, and a correlation-robust hash turns those into random
//! OTs. The receiver's choice bits come out of the protocol (they are LPN
//! syndrome bits), which is what the phase-one stretching variant expects.
//!
//! Communication is the `k` base OTs plus `t · log_bin_sz` tree OTs and `t`
//! correction words — sublinear in the extension length `n`.

mod lpn;
mod spcot;

use rand::{CryptoRng, Rng};

use self::lpn::LpnCode;
use self::spcot::{receiver_tree, sender_tree, TwoKeyPrp};
use super::{
    iknp, CorrelatedOtReceiver, CorrelatedOtSender, Error, OtReceiver, OtSender,
};
use crate::block::Block;
use crate::channel::{recv_from, recv_vec_from, send_to, Channel};
use crate::crypto::AesHash;

/// A one-shot primal LPN parameter set.
///
/// `n = t · 2^log_bin_sz` outputs from `k` base OTs and `t` noise positions,
/// one per bin.
#[derive(Clone, Copy, Debug)]
pub struct LpnParams {
    /// Extension output length.
    pub n: usize,
    /// Number of base correlated OTs.
    pub k: usize,
    /// Number of GGM trees (noise weight).
    pub t: usize,
    /// Binary logarithm of the bin size (tree depth).
    pub log_bin_sz: usize,
}

/// Parameters for extensions up to 2^14 OTs.
pub const LPN_2_14: LpnParams = LpnParams {
    n: 16384,
    k: 1536,
    t: 64,
    log_bin_sz: 8,
};

/// Parameters for extensions up to 2^18 OTs.
pub const LPN_2_18: LpnParams = LpnParams {
    n: 262144,
    k: 8192,
    t: 512,
    log_bin_sz: 9,
};

/// Parameters for extensions up to 2^22 OTs.
pub const LPN_2_22: LpnParams = LpnParams {
    n: 4194304,
    k: 65536,
    t: 2048,
    log_bin_sz: 11,
};

fn choose(count: usize) -> Result<LpnParams, Error> {
    for p in [LPN_2_14, LPN_2_18, LPN_2_22] {
        if count <= p.n {
            return Ok(p);
        }
    }
    Err(Error::TooManyOts {
        requested: count,
        available: LPN_2_22.n,
    })
}

/// Silent OT sender.
pub struct Sender {
    ot: iknp::Sender,
    hash: AesHash,
    delta: Block,
    counter: u128,
    config: Option<(usize, LpnParams)>,
}

impl Sender {
    /// Runs the base-OT bootstrap of the inner extension.
    pub async fn init<C: Channel, RNG: CryptoRng + Rng>(
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<Self, Error> {
        Ok(Self {
            ot: iknp::Sender::init(channel, rng).await?,
            hash: AesHash::fixed_key(),
            delta: rng.gen(),
            counter: 0,
            config: None,
        })
    }

    /// Selects the LPN parameter set for an extension of `count` OTs.
    pub fn configure(&mut self, count: usize) -> Result<(), Error> {
        self.config = Some((count, choose(count)?));
        Ok(())
    }

    /// Runs the configured extension, returning the random message pairs.
    pub async fn extend<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<Vec<[Block; 2]>, Error> {
        let (count, p) = self.config.ok_or(Error::NotConfigured)?;
        let depth = p.log_bin_sz;
        let base = self
            .ot
            .send_correlated(channel, &vec![self.delta; p.k], rng)
            .await?;
        let prp = TwoKeyPrp::new();
        let mut leaves = Vec::with_capacity(p.n);
        let mut tree_msgs = Vec::with_capacity(p.t * depth);
        let mut psis = Vec::with_capacity(p.t);
        for _ in 0..p.t {
            let tree = sender_tree(&prp, rng.gen(), depth);
            let mut psi = self.delta;
            for &leaf in &tree.leaves {
                psi ^= leaf;
            }
            psis.push(psi);
            tree_msgs.extend(tree.ot_msgs);
            leaves.extend(tree.leaves);
        }
        self.ot.send(channel, &tree_msgs, rng).await?;
        send_to(channel, "silent psi", &psis).await?;
        let lpn_seed: Block = rng.gen();
        send_to(channel, "lpn seed", &lpn_seed).await?;
        let code = LpnCode::new(lpn_seed, p.k);
        let mut out = Vec::with_capacity(count);
        for (i, &leaf) in leaves.iter().take(count).enumerate() {
            let mut z = leaf;
            for idx in code.row_indices(i) {
                z ^= base[idx][0];
            }
            let tweak = self.counter + i as u128;
            out.push([
                self.hash.cr_hash(tweak, z),
                self.hash.cr_hash(tweak, z ^ self.delta),
            ]);
        }
        self.counter += count as u128;
        Ok(out)
    }
}

/// Silent OT receiver.
pub struct Receiver {
    ot: iknp::Receiver,
    hash: AesHash,
    counter: u128,
    config: Option<(usize, LpnParams)>,
}

impl Receiver {
    /// Runs the base-OT bootstrap of the inner extension.
    pub async fn init<C: Channel, RNG: CryptoRng + Rng>(
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<Self, Error> {
        Ok(Self {
            ot: iknp::Receiver::init(channel, rng).await?,
            hash: AesHash::fixed_key(),
            counter: 0,
            config: None,
        })
    }

    /// Selects the LPN parameter set for an extension of `count` OTs.
    pub fn configure(&mut self, count: usize) -> Result<(), Error> {
        self.config = Some((count, choose(count)?));
        Ok(())
    }

    /// Runs the configured extension, returning the protocol-chosen choice
    /// bits and the chosen random message per OT.
    pub async fn extend<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<(Vec<bool>, Vec<Block>), Error> {
        let (count, p) = self.config.ok_or(Error::NotConfigured)?;
        let depth = p.log_bin_sz;
        let bin = 1usize << depth;
        let b: Vec<bool> = (0..p.k).map(|_| rng.gen()).collect();
        let base = self.ot.recv_correlated(channel, &b, rng).await?;
        let alphas: Vec<usize> = (0..p.t).map(|_| rng.gen_range(0..bin)).collect();
        let mut tree_choices = Vec::with_capacity(p.t * depth);
        for &alpha in &alphas {
            for level in 0..depth {
                let a = (alpha >> (depth - 1 - level)) & 1;
                tree_choices.push(a == 0);
            }
        }
        let msgs = self.ot.recv(channel, &tree_choices, rng).await?;
        let psis: Vec<Block> = recv_vec_from(channel, "silent psi", p.t).await?;
        let prp = TwoKeyPrp::new();
        let mut wleaves = Vec::with_capacity(p.n);
        for (j, (&alpha, &psi)) in alphas.iter().zip(&psis).enumerate() {
            let mut leaves = receiver_tree(&prp, alpha, depth, &msgs[j * depth..(j + 1) * depth]);
            let mut w_alpha = psi;
            for (i, &leaf) in leaves.iter().enumerate() {
                if i != alpha {
                    w_alpha ^= leaf;
                }
            }
            leaves[alpha] = w_alpha;
            wleaves.extend(leaves);
        }
        let lpn_seed: Block = recv_from(channel, "lpn seed").await?;
        let code = LpnCode::new(lpn_seed, p.k);
        let mut choices = Vec::with_capacity(count);
        let mut out = Vec::with_capacity(count);
        for (i, &wleaf) in wleaves.iter().take(count).enumerate() {
            let mut w = wleaf;
            let mut c = alphas[i >> depth] == (i & (bin - 1));
            for idx in code.row_indices(i) {
                w ^= base[idx];
                c ^= b[idx];
            }
            let tweak = self.counter + i as u128;
            choices.push(c);
            out.push(self.hash.cr_hash(tweak, w));
        }
        self.counter += count as u128;
        Ok((choices, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes_rng::AesRng;
    use crate::channel::SimpleChannel;

    #[test]
    fn parameter_sets_are_consistent() {
        for p in [LPN_2_14, LPN_2_18, LPN_2_22] {
            assert_eq!(p.n, p.t << p.log_bin_sz);
            assert!(p.k < p.n);
        }
    }

    #[tokio::test]
    async fn random_ot_correctness() {
        let (mut a, mut b) = SimpleChannel::pair();
        let count = 2000;
        let sender = tokio::spawn(async move {
            let mut rng = AesRng::new();
            let mut ot = Sender::init(&mut a, &mut rng).await.unwrap();
            ot.configure(count).unwrap();
            ot.extend(&mut a, &mut rng).await.unwrap()
        });
        let mut rng = AesRng::new();
        let mut ot = Receiver::init(&mut b, &mut rng).await.unwrap();
        ot.configure(count).unwrap();
        let (choices, out) = ot.extend(&mut b, &mut rng).await.unwrap();
        let pairs = sender.await.unwrap();
        assert_eq!(pairs.len(), count);
        for ((pair, c), r) in pairs.iter().zip(&choices).zip(&out) {
            assert_eq!(pair[usize::from(*c)], *r);
        }
        // The protocol-chosen bits should not be constant.
        assert!(choices.iter().any(|&c| c));
        assert!(choices.iter().any(|&c| !c));
    }

    #[tokio::test]
    async fn unconfigured_extend_fails() {
        let (mut a, mut b) = SimpleChannel::pair();
        let task = tokio::spawn(async move {
            let mut rng = AesRng::new();
            Sender::init(&mut a, &mut rng).await.unwrap()
        });
        let mut rng = AesRng::new();
        let mut ot = Receiver::init(&mut b, &mut rng).await.unwrap();
        let result = ot.extend(&mut b, &mut rng).await;
        assert!(matches!(result, Err(Error::NotConfigured)));
        task.await.unwrap();
    }
}
