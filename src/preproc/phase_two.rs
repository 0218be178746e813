//! Phase-two preprocessing: one 1-of-δ random OT per slot.
//!
//! The variant consumed by the online phase is KKRT with corrections
//! streamed in strides of 2^10 slots (smaller strides cost round trips,
//! larger strides cost peak memory). The IKNP and silent variants run
//! `lg δ · τ` plain 1-of-2 random OTs instead and exist for the benchmark
//! comparison only.

use std::time::Instant;

use rand::{CryptoRng, Rng};
use tracing::info;

use crate::block::Block;
use crate::channel::{self, Channel};
use crate::ot::{
    iknp, kkrt, silent, Error, OtReceiver, OtSender, RandomOtReceiver, RandomOtSender,
};
use crate::params::Params;

/// Slots per correction batch.
const CORRECTION_STRIDE: usize = 1 << 10;

/// Receiver of the KKRT phase two: samples one choice in `[0, δ)` per slot
/// and returns `(bpr, Rc_r)`.
pub async fn kkrt_receive<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<(Vec<u8>, Vec<Block>), Error> {
    let start = Instant::now();
    let mut receiver = kkrt::Receiver::configure(params.stat_sec, params.delta().log2())?;
    receiver.init(params.tau, channel, rng).await?;
    let mut bpr = Vec::with_capacity(params.tau);
    let mut rc_r = Vec::with_capacity(params.tau);
    let mut done = 0;
    while done < params.tau {
        let batch = (params.tau - done).min(CORRECTION_STRIDE);
        for i in done..done + batch {
            let choice = rng.gen::<u8>() & params.delta().mask() as u8;
            rc_r.push(receiver.encode(i, choice as u32)?);
            bpr.push(choice);
        }
        receiver.send_correction(channel, batch).await?;
        done += batch;
    }
    receiver.check(channel, rng.gen()).await?;
    channel::flush(channel, "phase two kkrt").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase two kkrt receiver"
    );
    Ok((bpr, rc_r))
}

/// Sender of the KKRT phase two: returns the `τ × δ` matrix `Ss` holding
/// one encoding per slot and choice.
pub async fn kkrt_send<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<Vec<Block>>, Error> {
    let start = Instant::now();
    let mut sender = kkrt::Sender::configure(params.stat_sec, params.delta().log2())?;
    sender.init(params.tau, channel, rng).await?;
    let delta = params.delta().value();
    let mut ss = Vec::with_capacity(params.tau);
    let mut done = 0;
    while done < params.tau {
        let batch = (params.tau - done).min(CORRECTION_STRIDE);
        sender.recv_correction(channel, batch).await?;
        for i in done..done + batch {
            let row: Vec<Block> = (0..delta)
                .map(|k| sender.encode(i, k))
                .collect::<Result<_, _>>()?;
            ss.push(row);
        }
        done += batch;
    }
    sender.check(channel).await?;
    channel::flush(channel, "phase two kkrt").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase two kkrt sender"
    );
    Ok(ss)
}

/// Measurement variant: `lg δ · τ` 1-of-2 random OTs through IKNP.
pub async fn iknp_receive<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<(Vec<bool>, Vec<Block>), Error> {
    let start = Instant::now();
    let count = params.delta().log2() as usize * params.tau;
    let choices: Vec<bool> = (0..count).map(|_| rng.gen()).collect();
    let mut ot = iknp::Receiver::init(channel, rng).await?;
    let out = ot.recv_random(channel, &choices, rng).await?;
    channel::flush(channel, "phase two iknp").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase two iknp receiver"
    );
    Ok((choices, out))
}

/// Measurement variant: sender side of [`iknp_receive`].
pub async fn iknp_send<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<[Block; 2]>, Error> {
    let start = Instant::now();
    let count = params.delta().log2() as usize * params.tau;
    let mut ot = iknp::Sender::init(channel, rng).await?;
    let out = ot.send_random(channel, count, rng).await?;
    channel::flush(channel, "phase two iknp").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase two iknp sender"
    );
    Ok(out)
}

/// Measurement variant: `lg δ · τ` 1-of-2 random OTs through silent OT.
pub async fn silent_receive<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<(Vec<bool>, Vec<Block>), Error> {
    let start = Instant::now();
    let count = params.delta().log2() as usize * params.tau;
    let mut ot = silent::Receiver::init(channel, rng).await?;
    ot.configure(count)?;
    let out = ot.extend(channel, rng).await?;
    channel::flush(channel, "phase two silent").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase two silent receiver"
    );
    Ok(out)
}

/// Measurement variant: sender side of [`silent_receive`].
pub async fn silent_send<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<[Block; 2]>, Error> {
    let start = Instant::now();
    let count = params.delta().log2() as usize * params.tau;
    let mut ot = silent::Sender::init(channel, rng).await?;
    ot.configure(count)?;
    let out = ot.extend(channel, rng).await?;
    channel::flush(channel, "phase two silent").await?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_sent = channel.bytes_sent(),
        bytes_received = channel.bytes_received(),
        "phase two silent sender"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes_rng::AesRng;
    use crate::channel::SimpleChannel;

    #[tokio::test]
    async fn kkrt_outputs_match_on_receiver_choice() {
        let params = Params::new(4, 40, 4, 1, 2, 4).unwrap();
        let (mut a, mut b) = SimpleChannel::pair();
        let sender = tokio::spawn(async move {
            let mut rng = AesRng::new();
            kkrt_send(&params, &mut a, &mut rng).await.unwrap()
        });
        let mut rng = AesRng::new();
        let (bpr, rc_r) = kkrt_receive(&params, &mut b, &mut rng).await.unwrap();
        let ss = sender.await.unwrap();
        assert_eq!(ss.len(), params.tau);
        for i in 0..params.tau {
            assert_eq!(ss[i].len(), params.delta().value() as usize);
            assert!((bpr[i] as u32) < params.delta().value());
            assert_eq!(ss[i][bpr[i] as usize], rc_r[i]);
        }
    }
}
