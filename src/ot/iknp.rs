//! IKNP-style semi-honest 1-of-2 OT extension
//! (cf. <https://eprint.iacr.org/2016/602>, Protocol 4).
//!
//! 128 KEM base OTs seed one column PRG pair per matrix row; the receiver
//! sends one correction column per row, both sides transpose, and each OT
//! becomes one 128-bit row hashed with the correlation-robust AES hash.
//! Extensions of any length are processed in bounded batches so peak memory
//! and message sizes stay flat; each batch costs one message from the
//! receiver (plus one payload message from the sender outside the random
//! variant).

use rand::{CryptoRng, Rng, RngCore, SeedableRng};

use super::{
    base, utils, CorrelatedOtReceiver, CorrelatedOtSender, Error, OtReceiver, OtSender,
    RandomOtReceiver, RandomOtSender,
};
use crate::aes_rng::AesRng;
use crate::block::Block;
use crate::channel::{recv_vec_from, send_to, Channel};
use crate::crypto::AesHash;

/// Width of the extension matrix: one column pair per base OT.
pub(crate) const EXT_WIDTH: usize = 128;

/// OTs processed per extension round.
const EXT_BATCH: usize = 1 << 16;

/// IKNP extension sender.
pub struct Sender {
    s: Vec<bool>,
    s_block: Block,
    rngs: Vec<AesRng>,
    hash: AesHash,
    counter: u128,
}

/// IKNP extension receiver.
pub struct Receiver {
    rngs: Vec<(AesRng, AesRng)>,
    hash: AesHash,
    counter: u128,
}

fn rows_from_bytes(bytes: &[u8]) -> Vec<Block> {
    bytes
        .chunks_exact(Block::BYTES)
        .map(|c| Block::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

impl Sender {
    /// One extension round: receive the correction columns for `m` OTs and
    /// return the (padded) rows `Q_i = T_i ⊕ r_i · s`.
    async fn setup_chunk<C: Channel>(
        &mut self,
        channel: &mut C,
        m: usize,
    ) -> Result<Vec<Block>, Error> {
        let col_bytes = m.div_ceil(8);
        let m_pad = col_bytes * 8;
        let cols: Vec<Vec<u8>> = recv_vec_from(channel, "iknp columns", EXT_WIDTH).await?;
        let mut qs = vec![0u8; EXT_WIDTH * col_bytes];
        for ((u, b), (j, rng)) in cols
            .iter()
            .zip(&self.s)
            .zip(self.rngs.iter_mut().enumerate())
        {
            if u.len() != col_bytes {
                return Err(Error::InvalidLength);
            }
            let q = &mut qs[j * col_bytes..(j + 1) * col_bytes];
            rng.fill_bytes(q);
            if *b {
                utils::xor_inplace(q, u);
            }
        }
        Ok(rows_from_bytes(&utils::transpose(&qs, EXT_WIDTH, m_pad)))
    }
}

impl Receiver {
    /// One extension round: send the correction columns for the given
    /// choices and return the (padded) rows `T_i`.
    async fn setup_chunk<C: Channel>(
        &mut self,
        channel: &mut C,
        choices: &[bool],
    ) -> Result<Vec<Block>, Error> {
        let col_bytes = choices.len().div_ceil(8);
        let m_pad = col_bytes * 8;
        let r = utils::boolvec_to_u8vec(choices);
        let mut ts = vec![0u8; EXT_WIDTH * col_bytes];
        let mut cols = Vec::with_capacity(EXT_WIDTH);
        for (j, (rng0, rng1)) in self.rngs.iter_mut().enumerate() {
            let t = &mut ts[j * col_bytes..(j + 1) * col_bytes];
            rng0.fill_bytes(t);
            let mut g = vec![0u8; col_bytes];
            rng1.fill_bytes(&mut g);
            utils::xor_inplace(&mut g, t);
            utils::xor_inplace(&mut g, &r);
            cols.push(g);
        }
        send_to(channel, "iknp columns", &cols).await?;
        Ok(rows_from_bytes(&utils::transpose(&ts, EXT_WIDTH, m_pad)))
    }
}

impl OtSender for Sender {
    async fn init<C: Channel, RNG: CryptoRng + Rng>(
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<Self, Error> {
        let mut s_bytes = [0u8; 16];
        rng.fill_bytes(&mut s_bytes);
        let s = utils::u8vec_to_boolvec(&s_bytes);
        let ks = base::receive(channel, &s, rng).await?;
        Ok(Self {
            s,
            s_block: Block::from_le_bytes(s_bytes),
            rngs: ks.into_iter().map(AesRng::from_seed).collect(),
            hash: AesHash::fixed_key(),
            counter: 0,
        })
    }

    async fn send<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        inputs: &[[Block; 2]],
        _: &mut RNG,
    ) -> Result<(), Error> {
        let mut done = 0;
        while done < inputs.len() {
            let m = (inputs.len() - done).min(EXT_BATCH);
            let qs = self.setup_chunk(channel, m).await?;
            let mut ys = Vec::with_capacity(m);
            for (i, input) in inputs[done..done + m].iter().enumerate() {
                let tweak = self.counter + (done + i) as u128;
                ys.push([
                    self.hash.cr_hash(tweak, qs[i]) ^ input[0],
                    self.hash.cr_hash(tweak, qs[i] ^ self.s_block) ^ input[1],
                ]);
            }
            send_to(channel, "iknp ys", &ys).await?;
            done += m;
        }
        self.counter += inputs.len() as u128;
        Ok(())
    }
}

impl OtReceiver for Receiver {
    async fn init<C: Channel, RNG: CryptoRng + Rng>(
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<Self, Error> {
        let pairs = base::send(channel, EXT_WIDTH, rng).await?;
        Ok(Self {
            rngs: pairs
                .into_iter()
                .map(|[k0, k1]| (AesRng::from_seed(k0), AesRng::from_seed(k1)))
                .collect(),
            hash: AesHash::fixed_key(),
            counter: 0,
        })
    }

    async fn recv<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        choices: &[bool],
        _: &mut RNG,
    ) -> Result<Vec<Block>, Error> {
        let mut out = Vec::with_capacity(choices.len());
        let mut done = 0;
        while done < choices.len() {
            let m = (choices.len() - done).min(EXT_BATCH);
            let ts = self.setup_chunk(channel, &choices[done..done + m]).await?;
            let ys: Vec<[Block; 2]> = recv_vec_from(channel, "iknp ys", m).await?;
            for (i, (&c, y)) in choices[done..done + m].iter().zip(&ys).enumerate() {
                let tweak = self.counter + (done + i) as u128;
                out.push(y[usize::from(c)] ^ self.hash.cr_hash(tweak, ts[i]));
            }
            done += m;
        }
        self.counter += choices.len() as u128;
        Ok(out)
    }
}

impl RandomOtSender for Sender {
    async fn send_random<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        count: usize,
        _: &mut RNG,
    ) -> Result<Vec<[Block; 2]>, Error> {
        let mut out = Vec::with_capacity(count);
        let mut done = 0;
        while done < count {
            let m = (count - done).min(EXT_BATCH);
            let qs = self.setup_chunk(channel, m).await?;
            for (i, q) in qs.into_iter().take(m).enumerate() {
                let tweak = self.counter + (done + i) as u128;
                out.push([
                    self.hash.cr_hash(tweak, q),
                    self.hash.cr_hash(tweak, q ^ self.s_block),
                ]);
            }
            done += m;
        }
        self.counter += count as u128;
        Ok(out)
    }
}

impl RandomOtReceiver for Receiver {
    async fn recv_random<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        choices: &[bool],
        _: &mut RNG,
    ) -> Result<Vec<Block>, Error> {
        let mut out = Vec::with_capacity(choices.len());
        let mut done = 0;
        while done < choices.len() {
            let m = (choices.len() - done).min(EXT_BATCH);
            let ts = self.setup_chunk(channel, &choices[done..done + m]).await?;
            for (i, t) in ts.into_iter().take(m).enumerate() {
                let tweak = self.counter + (done + i) as u128;
                out.push(self.hash.cr_hash(tweak, t));
            }
            done += m;
        }
        self.counter += choices.len() as u128;
        Ok(out)
    }
}

impl CorrelatedOtSender for Sender {
    async fn send_correlated<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        deltas: &[Block],
        _: &mut RNG,
    ) -> Result<Vec<[Block; 2]>, Error> {
        let mut out = Vec::with_capacity(deltas.len());
        let mut done = 0;
        while done < deltas.len() {
            let m = (deltas.len() - done).min(EXT_BATCH);
            let qs = self.setup_chunk(channel, m).await?;
            let mut ys = Vec::with_capacity(m);
            for (i, delta) in deltas[done..done + m].iter().enumerate() {
                let tweak = self.counter + (done + i) as u128;
                let x0 = self.hash.cr_hash(tweak, qs[i]);
                let x1 = x0 ^ *delta;
                ys.push(self.hash.cr_hash(tweak, qs[i] ^ self.s_block) ^ x1);
                out.push([x0, x1]);
            }
            send_to(channel, "iknp correlated ys", &ys).await?;
            done += m;
        }
        self.counter += deltas.len() as u128;
        Ok(out)
    }
}

impl CorrelatedOtReceiver for Receiver {
    async fn recv_correlated<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        choices: &[bool],
        _: &mut RNG,
    ) -> Result<Vec<Block>, Error> {
        let mut out = Vec::with_capacity(choices.len());
        let mut done = 0;
        while done < choices.len() {
            let m = (choices.len() - done).min(EXT_BATCH);
            let ts = self.setup_chunk(channel, &choices[done..done + m]).await?;
            let ys: Vec<Block> = recv_vec_from(channel, "iknp correlated ys", m).await?;
            for (i, (&c, y)) in choices[done..done + m].iter().zip(&ys).enumerate() {
                let tweak = self.counter + (done + i) as u128;
                let masked = if c { *y } else { Block::ZERO };
                out.push(masked ^ self.hash.cr_hash(tweak, ts[i]));
            }
            done += m;
        }
        self.counter += choices.len() as u128;
        Ok(out)
    }
}
