//! Fixed-key AES primitives used by the OT extension layer.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::block::Block;

/// Key for the crate-wide fixed-key AES hash. Public constant, both roles
/// use the same instance.
const FIXED_KEY: u128 = 0x3b9a_52f1_7f54_6ff3_60a1_9ecb_8a4d_1b37;

/// AES accelerated correlation-robust hashing of [`Block`]s.
///
/// Computes `π(x ⊕ tweak) ⊕ (x ⊕ tweak)` for a fixed-key permutation `π`.
/// Only secure in the semi-honest setting, see
/// <https://eprint.iacr.org/2019/074>.
#[derive(Clone)]
pub(crate) struct AesHash {
    aes: Aes128,
}

impl AesHash {
    /// The crate-wide fixed-key instance.
    pub(crate) fn fixed_key() -> Self {
        let key: aes::cipher::Key<Aes128> = FIXED_KEY.to_le_bytes().into();
        Self {
            aes: Aes128::new(&key),
        }
    }

    /// Correlation robust hash of `x` under the domain-separation `tweak`.
    pub(crate) fn cr_hash(&self, tweak: u128, x: Block) -> Block {
        let sigma = x ^ Block::from(tweak);
        let mut buf: aes::Block = sigma.to_le_bytes().into();
        self.aes.encrypt_block(&mut buf);
        Block::from_le_bytes(buf.into()) ^ sigma
    }
}

/// The pseudorandom code of the 1-of-N OT extension: four independently
/// keyed AES-128 ciphers producing a 512-bit codeword per input.
pub(crate) struct PseudorandomCode {
    ciphers: [Aes128; 4],
}

impl PseudorandomCode {
    /// Creates the code from four (coin-tossed) keys.
    pub(crate) fn new(keys: [Block; 4]) -> Self {
        let ciphers = keys.map(|k| {
            let key: aes::cipher::Key<Aes128> = k.to_le_bytes().into();
            Aes128::new(&key)
        });
        Self { ciphers }
    }

    /// Encodes `m` into a 512-bit codeword.
    pub(crate) fn encode(&self, m: Block) -> [Block; 4] {
        let mut out = [Block::ZERO; 4];
        for (o, cipher) in out.iter_mut().zip(&self.ciphers) {
            let mut buf: aes::Block = m.to_le_bytes().into();
            cipher.encrypt_block(&mut buf);
            *o = Block::from_le_bytes(buf.into());
        }
        out
    }
}
