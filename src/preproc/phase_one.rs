//! Phase-one preprocessing: 1-of-2 random OTs with tiled choice bits.
//!
//! The variant consumed by the online phase is the tiled IKNP batch over
//! all `n·τ` slots. The silent variants trade extension work for
//! communication: `silent_stretched_*` runs only `n` silent OTs and
//! expands them locally into `n·κ` usable OTs through per-OT PRGs (sound
//! because the chosen-side seeds coincide after the OT), `silent_full_*`
//! and `iknp_wide_*` are the `n·κ`-sized measurement variants of the
//! benchmark binary.

use std::time::Instant;

use rand::{CryptoRng, Rng, SeedableRng};
use tracing::info;

use crate::aes_rng::AesRng;
use crate::block::Block;
use crate::channel::{self, Channel};
use crate::ot::{
    iknp, silent, Error, OtReceiver, OtSender, RandomOtReceiver, RandomOtSender,
};
use crate::params::Params;

/// Tiles the n-bit pattern so that `b[j·n + i] = b_n[i]` for all slots `j`.
pub fn tile_choices(b_n: &[bool], copies: usize) -> Vec<bool> {
    let mut b = Vec::with_capacity(b_n.len() * copies);
    for _ in 0..copies {
        b.extend_from_slice(b_n);
    }
    b
}

/// Receiver of the tiled IKNP phase one: samples the n-bit pattern, runs
/// `n·τ` random OTs over the tiled choices and returns `(b_n, Rs_r)`.
pub async fn iknp_receive<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<(Vec<bool>, Vec<Block>), Error> {
    let start = Instant::now();
    let b_n: Vec<bool> = (0..params.n).map(|_| rng.gen()).collect();
    let choices = tile_choices(&b_n, params.tau);
    let mut ot = iknp::Receiver::init(channel, rng).await?;
    let rs_r = ot.recv_random(channel, &choices, rng).await?;
    channel::flush(channel, "phase one iknp").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase one iknp receiver"
    );
    Ok((b_n, rs_r))
}

/// Sender of the tiled IKNP phase one: returns the `n·τ` random pairs `Sc`.
pub async fn iknp_send<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<[Block; 2]>, Error> {
    let start = Instant::now();
    let mut ot = iknp::Sender::init(channel, rng).await?;
    let sc = ot.send_random(channel, params.n * params.tau, rng).await?;
    channel::flush(channel, "phase one iknp").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase one iknp sender"
    );
    Ok(sc)
}

/// Receiver of the stretched silent phase one: `n` silent OTs expanded
/// locally into material for `κ` slots. The choice pattern `b_n` is chosen
/// by the silent protocol.
pub async fn silent_stretched_receive<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<(Vec<bool>, Vec<Block>), Error> {
    let start = Instant::now();
    let mut ot = silent::Receiver::init(channel, rng).await?;
    ot.configure(params.n)?;
    let (b_n, rs_r_n) = ot.extend(channel, rng).await?;
    channel::flush(channel, "phase one silent").await?;
    let ot_ms = start.elapsed().as_millis() as u64;
    let stretch_start = Instant::now();
    let mut rs_r = vec![Block::ZERO; params.n * params.kappa];
    for (i, &seed) in rs_r_n.iter().enumerate() {
        let mut prg = AesRng::from_seed(seed);
        for j in 0..params.kappa {
            rs_r[j * params.n + i] = prg.next_block();
        }
    }
    info!(
        ot_ms,
        stretch_ms = stretch_start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase one silent receiver, stretched"
    );
    Ok((b_n, rs_r))
}

/// Sender of the stretched silent phase one: `n` silent OTs expanded
/// locally into pairs for `κ` slots.
pub async fn silent_stretched_send<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<[Block; 2]>, Error> {
    let start = Instant::now();
    let mut ot = silent::Sender::init(channel, rng).await?;
    ot.configure(params.n)?;
    let sc_n = ot.extend(channel, rng).await?;
    channel::flush(channel, "phase one silent").await?;
    let ot_ms = start.elapsed().as_millis() as u64;
    let stretch_start = Instant::now();
    let mut sc = vec![[Block::ZERO; 2]; params.n * params.kappa];
    for (i, pair) in sc_n.iter().enumerate() {
        let mut prg0 = AesRng::from_seed(pair[0]);
        let mut prg1 = AesRng::from_seed(pair[1]);
        for j in 0..params.kappa {
            sc[j * params.n + i] = [prg0.next_block(), prg1.next_block()];
        }
    }
    info!(
        ot_ms,
        stretch_ms = stretch_start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase one silent sender, stretched"
    );
    Ok(sc)
}

/// Measurement variant: `n·κ` silent OTs in one extension, untiled.
pub async fn silent_full_receive<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<(Vec<bool>, Vec<Block>), Error> {
    let start = Instant::now();
    let mut ot = silent::Receiver::init(channel, rng).await?;
    ot.configure(params.n * params.kappa)?;
    let out = ot.extend(channel, rng).await?;
    channel::flush(channel, "phase one silent full").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase one silent receiver, full width"
    );
    Ok(out)
}

/// Measurement variant: sender side of [`silent_full_receive`].
pub async fn silent_full_send<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<[Block; 2]>, Error> {
    let start = Instant::now();
    let mut ot = silent::Sender::init(channel, rng).await?;
    ot.configure(params.n * params.kappa)?;
    let out = ot.extend(channel, rng).await?;
    channel::flush(channel, "phase one silent full").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase one silent sender, full width"
    );
    Ok(out)
}

/// Measurement variant: tiled IKNP over `n·κ` OTs.
pub async fn iknp_wide_receive<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<(Vec<bool>, Vec<Block>), Error> {
    let start = Instant::now();
    let b_n: Vec<bool> = (0..params.n).map(|_| rng.gen()).collect();
    let choices = tile_choices(&b_n, params.kappa);
    let mut ot = iknp::Receiver::init(channel, rng).await?;
    let rs_r = ot.recv_random(channel, &choices, rng).await?;
    channel::flush(channel, "phase one iknp wide").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase one iknp receiver, full width"
    );
    Ok((b_n, rs_r))
}

/// Measurement variant: sender side of [`iknp_wide_receive`].
pub async fn iknp_wide_send<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<[Block; 2]>, Error> {
    let start = Instant::now();
    let mut ot = iknp::Sender::init(channel, rng).await?;
    let sc = ot
        .send_random(channel, params.n * params.kappa, rng)
        .await?;
    channel::flush(channel, "phase one iknp wide").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase one iknp sender, full width"
    );
    Ok(sc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SimpleChannel;

    fn small_params() -> Params {
        Params::new(8, 16, 4, 1, 4, 4).unwrap()
    }

    #[tokio::test]
    async fn tiled_iknp_satisfies_ot_correctness() {
        let params = small_params();
        let (mut a, mut b) = SimpleChannel::pair();
        let sender = tokio::spawn(async move {
            let mut rng = AesRng::new();
            iknp_send(&params, &mut a, &mut rng).await.unwrap()
        });
        let mut rng = AesRng::new();
        let (b_n, rs_r) = iknp_receive(&params, &mut b, &mut rng).await.unwrap();
        let sc = sender.await.unwrap();
        assert_eq!(rs_r.len(), params.n * params.tau);
        for j in 0..params.tau {
            for i in 0..params.n {
                let k = j * params.n + i;
                // Tiling: the choice at slot j, position i is b_n[i].
                assert_eq!(rs_r[k], sc[k][usize::from(b_n[i])]);
            }
        }
    }

    #[tokio::test]
    async fn stretching_preserves_ot_correctness() {
        let params = small_params();
        let (mut a, mut b) = SimpleChannel::pair();
        let sender = tokio::spawn(async move {
            let mut rng = AesRng::new();
            silent_stretched_send(&params, &mut a, &mut rng)
                .await
                .unwrap()
        });
        let mut rng = AesRng::new();
        let (b_n, rs_r) = silent_stretched_receive(&params, &mut b, &mut rng)
            .await
            .unwrap();
        let sc = sender.await.unwrap();
        assert_eq!(rs_r.len(), params.n * params.kappa);
        assert_eq!(sc.len(), params.n * params.kappa);
        for j in 0..params.kappa {
            for i in 0..params.n {
                let k = j * params.n + i;
                assert_eq!(rs_r[k], sc[k][usize::from(b_n[i])]);
            }
        }
    }
}
