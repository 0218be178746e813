//! The d=10 local linear code of the primal-LPN compression step.
//!
//! Both parties derive, from a shared seed, ten base-OT indices per output
//! row and XOR the corresponding base values into the row. The index stream
//! is a fixed-key AES permutation of the row counter, reduced into `[0, k)`
//! with the mask-and-subtract trick, so the two sides agree on every index
//! without communicating them.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::block::Block;

/// Nonzero entries per code row.
pub(crate) const LPN_D: usize = 10;

pub(crate) struct LpnCode {
    aes: Aes128,
    k: usize,
    mask: u32,
}

impl LpnCode {
    pub(crate) fn new(seed: Block, k: usize) -> Self {
        let key: aes::cipher::Key<Aes128> = seed.to_le_bytes().into();
        let mut mask = 1u32;
        while (mask as usize) < k {
            mask = (mask << 1) | 1;
        }
        Self {
            aes: Aes128::new(&key),
            k,
            mask,
        }
    }

    /// The ten base indices of output row `i`.
    pub(crate) fn row_indices(&self, i: usize) -> [usize; LPN_D] {
        let mut words = [0u32; 12];
        for m in 0..3 {
            let ctr = ((i as u128) << 64) | m as u128;
            let mut blk: aes::Block = ctr.to_le_bytes().into();
            self.aes.encrypt_block(&mut blk);
            let bytes: [u8; 16] = blk.into();
            for (w, chunk) in words[4 * m..4 * m + 4].iter_mut().zip(bytes.chunks_exact(4)) {
                *w = u32::from_le_bytes(chunk.try_into().unwrap());
            }
        }
        let mut out = [0usize; LPN_D];
        for (o, w) in out.iter_mut().zip(words.iter()) {
            let mut idx = (w & self.mask) as usize;
            if idx >= self.k {
                idx -= self.k;
            }
            *o = idx;
        }
        out
    }
}
