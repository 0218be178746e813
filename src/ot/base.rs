//! KEM-based 1-of-2 random base OT.
//!
//! The receiver sends, per OT, two encapsulation keys: a freshly generated
//! one at its choice position and a uniformly random one at the other. The
//! sender encapsulates against both keys and outputs the two shared secrets
//! (truncated to blocks); the receiver can decapsulate only the ciphertext
//! at its choice position. Under the key-indistinguishability of the KEM
//! the sender learns nothing about the choice, and the receiver learns
//! nothing about the unchosen secret since it holds no decapsulation key
//! for a uniformly random public key. Semi-honest only.
//!
//! The KEM is ML-KEM-512, so the base OTs carry no discrete-log assumption.

use ml_kem::kem::{Decapsulate, Encapsulate, EncapsulationKey};
use ml_kem::{Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem512, MlKem512Params};
use rand::{CryptoRng, Rng, RngCore};

use super::Error;
use crate::block::Block;
use crate::channel::{recv_vec_from, send_to, Channel};

type EncodedKey = Encoded<EncapsulationKey<MlKem512Params>>;

fn ss_to_block(ss: &[u8]) -> Block {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&ss[..16]);
    Block::from_le_bytes(bytes)
}

/// Base-OT sender: outputs `count` random block pairs.
pub async fn send<C: Channel, RNG: CryptoRng + Rng>(
    channel: &mut C,
    count: usize,
    rng: &mut RNG,
) -> Result<Vec<[Block; 2]>, Error> {
    let pks: Vec<[Vec<u8>; 2]> = recv_vec_from(channel, "base OT pks", count).await?;
    let mut out = Vec::with_capacity(count);
    let mut cts = Vec::with_capacity(count);
    for pair in pks {
        let mut blocks = [Block::ZERO; 2];
        let mut ct_pair: [Vec<u8>; 2] = [vec![], vec![]];
        for (b, pk_bytes) in pair.iter().enumerate() {
            let encoded =
                EncodedKey::try_from(pk_bytes.as_slice()).map_err(|_| Error::MalformedMessage)?;
            let ek = EncapsulationKey::<MlKem512Params>::from_bytes(&encoded);
            let (ct, ss) = ek.encapsulate(rng).map_err(|_| Error::MalformedMessage)?;
            blocks[b] = ss_to_block(&ss);
            ct_pair[b] = ct.to_vec();
        }
        out.push(blocks);
        cts.push(ct_pair);
    }
    send_to(channel, "base OT cts", &cts).await?;
    Ok(out)
}

/// Base-OT receiver: outputs the chosen random block per choice bit.
pub async fn receive<C: Channel, RNG: CryptoRng + Rng>(
    channel: &mut C,
    choices: &[bool],
    rng: &mut RNG,
) -> Result<Vec<Block>, Error> {
    let mut dks = Vec::with_capacity(choices.len());
    let mut pks = Vec::with_capacity(choices.len());
    for &c in choices {
        let (dk, ek) = MlKem512::generate(rng);
        let real = ek.as_bytes().to_vec();
        let mut dummy = EncodedKey::default();
        rng.fill_bytes(&mut dummy);
        let dummy = dummy.to_vec();
        pks.push(if c { [dummy, real] } else { [real, dummy] });
        dks.push(dk);
    }
    send_to(channel, "base OT pks", &pks).await?;
    let cts: Vec<[Vec<u8>; 2]> = recv_vec_from(channel, "base OT cts", choices.len()).await?;
    let mut out = Vec::with_capacity(choices.len());
    for ((dk, &c), ct_pair) in dks.iter().zip(choices).zip(cts) {
        let ct = Ciphertext::<MlKem512>::try_from(ct_pair[usize::from(c)].as_slice())
            .map_err(|_| Error::MalformedMessage)?;
        let ss = dk.decapsulate(&ct).map_err(|_| Error::MalformedMessage)?;
        out.push(ss_to_block(&ss));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes_rng::AesRng;
    use crate::channel::SimpleChannel;

    #[tokio::test]
    async fn chosen_blocks_match() {
        let (mut a, mut b) = SimpleChannel::pair();
        let choices: Vec<bool> = (0..8).map(|i| i % 3 == 0).collect();
        let sender = tokio::spawn(async move {
            let mut rng = AesRng::new();
            send(&mut a, 8, &mut rng).await.unwrap()
        });
        let mut rng = AesRng::new();
        let received = receive(&mut b, &choices, &mut rng).await.unwrap();
        let pairs = sender.await.unwrap();
        for ((pair, c), r) in pairs.iter().zip(&choices).zip(&received) {
            assert_eq!(pair[usize::from(*c)], *r);
            assert_ne!(pair[0], pair[1]);
        }
    }
}
