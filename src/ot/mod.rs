//! Oblivious transfer: traits and the vendored extender implementations.
//!
//! The preprocessing layer consumes three extender flavors, each following
//! the same pattern — base-OT bootstrap, configuration, extension:
//!
//! * [`iknp`]: IKNP/ALSZ semi-honest 1-of-2 OT extension (chosen-message,
//!   correlated and random variants).
//! * [`silent`]: pseudorandom-correlation ("silent") 1-of-2 random OT with
//!   protocol-chosen receiver bits.
//! * [`kkrt`]: 1-of-N random OT with online correction.
//!
//! All extenders bootstrap from the KEM-based base OT in [`base`]. The
//! implementations are adaptations of the swanky OT suite to this crate's
//! async channel; messages are batched to keep the number of communication
//! rounds independent of the extension length.

pub mod base;
pub mod iknp;
pub mod kkrt;
pub mod silent;
pub(crate) mod utils;

use rand::{CryptoRng, Rng};

use crate::block::Block;
use crate::channel::{recv_from, send_to, Channel, Error as ChannelError};

/// Errors occurring during oblivious transfer.
#[derive(Debug)]
pub enum Error {
    /// A message could not be sent or received.
    ChannelErr(ChannelError),
    /// The transcript digests of the two parties disagree.
    ConsistencyCheckFailed,
    /// A coin-toss reveal did not match its commitment.
    CommitmentCheckFailed,
    /// A received message had an unexpected shape.
    MalformedMessage,
    /// Invalid array length.
    InvalidLength,
    /// The extender was used before `configure`.
    NotConfigured,
    /// `encode` was called for a slot whose correction has not been seen.
    MissingCorrection,
    /// `encode` calls must visit slots in order.
    OutOfOrderEncode,
    /// The requested configuration is outside the supported range.
    UnsupportedParameters,
    /// The requested extension exceeds every supported parameter set.
    TooManyOts {
        /// Number of OTs requested.
        requested: usize,
        /// Largest supported extension.
        available: usize,
    },
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::ChannelErr(e)
    }
}

/// Trait for one-out-of-two oblivious transfer from the sender's
/// point-of-view.
#[allow(async_fn_in_trait)]
pub trait OtSender
where
    Self: Sized,
{
    /// Runs the base-OT bootstrap and creates the sender.
    async fn init<C: Channel, RNG: CryptoRng + Rng>(
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<Self, Error>;

    /// Sends the chosen message pairs.
    async fn send<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        inputs: &[[Block; 2]],
        rng: &mut RNG,
    ) -> Result<(), Error>;
}

/// Trait for one-out-of-two oblivious transfer from the receiver's
/// point-of-view.
#[allow(async_fn_in_trait)]
pub trait OtReceiver
where
    Self: Sized,
{
    /// Runs the base-OT bootstrap and creates the receiver.
    async fn init<C: Channel, RNG: CryptoRng + Rng>(
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<Self, Error>;

    /// Receives one message per choice bit.
    async fn recv<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        choices: &[bool],
        rng: &mut RNG,
    ) -> Result<Vec<Block>, Error>;
}

/// Correlated OT (sender side): message pairs with a caller-chosen offset.
#[allow(async_fn_in_trait)]
pub trait CorrelatedOtSender: OtSender {
    /// Runs one correlated OT per delta, returning the random pairs
    /// `(x, x ⊕ delta)`.
    async fn send_correlated<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        deltas: &[Block],
        rng: &mut RNG,
    ) -> Result<Vec<[Block; 2]>, Error>;
}

/// Correlated OT (receiver side).
#[allow(async_fn_in_trait)]
pub trait CorrelatedOtReceiver: OtReceiver {
    /// Receives the chosen side of each correlated pair.
    async fn recv_correlated<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        choices: &[bool],
        rng: &mut RNG,
    ) -> Result<Vec<Block>, Error>;
}

/// Random OT (sender side): both messages are outputs of the protocol, no
/// payload is transmitted.
#[allow(async_fn_in_trait)]
pub trait RandomOtSender: OtSender {
    /// Runs `count` random OTs, returning the random message pairs.
    async fn send_random<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        count: usize,
        rng: &mut RNG,
    ) -> Result<Vec<[Block; 2]>, Error>;
}

/// Random OT (receiver side) with caller-chosen choice bits.
#[allow(async_fn_in_trait)]
pub trait RandomOtReceiver: OtReceiver {
    /// Receives the chosen random message per choice bit.
    async fn recv_random<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        choices: &[bool],
        rng: &mut RNG,
    ) -> Result<Vec<Block>, Error>;
}

fn seeds_digest(seeds: &[Block]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for seed in seeds {
        hasher.update(&seed.to_le_bytes());
    }
    *hasher.finalize().as_bytes()
}

/// Coin toss (committing side): agree on `count` random blocks with the peer.
pub(crate) async fn cointoss_send<C: Channel, RNG: CryptoRng + Rng>(
    channel: &mut C,
    rng: &mut RNG,
    count: usize,
) -> Result<Vec<Block>, Error> {
    let seeds: Vec<Block> = (0..count).map(|_| rng.gen()).collect();
    send_to(channel, "cointoss commit", &seeds_digest(&seeds)).await?;
    let theirs: Vec<Block> = crate::channel::recv_vec_from(channel, "cointoss seeds", count).await?;
    send_to(channel, "cointoss reveal", &seeds).await?;
    Ok(seeds
        .into_iter()
        .zip(theirs)
        .map(|(a, b)| a ^ b)
        .collect())
}

/// Coin toss (responding side).
pub(crate) async fn cointoss_recv<C: Channel, RNG: CryptoRng + Rng>(
    channel: &mut C,
    rng: &mut RNG,
    count: usize,
) -> Result<Vec<Block>, Error> {
    let commitment: [u8; 32] = recv_from(channel, "cointoss commit").await?;
    let seeds: Vec<Block> = (0..count).map(|_| rng.gen()).collect();
    send_to(channel, "cointoss seeds", &seeds).await?;
    let theirs: Vec<Block> = crate::channel::recv_vec_from(channel, "cointoss reveal", count).await?;
    if seeds_digest(&theirs) != commitment {
        return Err(Error::CommitmentCheckFailed);
    }
    Ok(theirs
        .into_iter()
        .zip(seeds)
        .map(|(a, b)| a ^ b)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes_rng::AesRng;
    use crate::channel::SimpleChannel;

    #[tokio::test]
    async fn cointoss_agrees() {
        let (mut a, mut b) = SimpleChannel::pair();
        let task = tokio::spawn(async move {
            let mut rng = AesRng::new();
            cointoss_send(&mut a, &mut rng, 4).await.unwrap()
        });
        let mut rng = AesRng::new();
        let theirs = cointoss_recv(&mut b, &mut rng, 4).await.unwrap();
        let ours = task.await.unwrap();
        assert_eq!(ours, theirs);
    }
}
