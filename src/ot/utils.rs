//! Bit-matrix plumbing shared by the OT extensions.
//!
//! Bits are packed LSB-first within each byte throughout: bit `i` of a
//! vector lives in byte `i / 8` at position `i % 8`. The transpose below
//! uses the same convention, so packed choice vectors, PRG-filled columns
//! and transposed rows all agree on bit order.

/// Packs a bool slice LSB-first, padding the last byte with zeros.
pub(crate) fn boolvec_to_u8vec(bv: &[bool]) -> Vec<u8> {
    let offset = usize::from(bv.len() % 8 != 0);
    let mut v = vec![0u8; bv.len() / 8 + offset];
    for (i, b) in bv.iter().enumerate() {
        v[i / 8] |= u8::from(*b) << (i % 8);
    }
    v
}

/// Unpacks a byte slice into bools, LSB-first.
pub(crate) fn u8vec_to_boolvec(v: &[u8]) -> Vec<bool> {
    let mut bv = Vec::with_capacity(v.len() * 8);
    for byte in v.iter() {
        for i in 0..8 {
            bv.push((1 << i) & byte != 0);
        }
    }
    bv
}

/// XORs `src` into `dst`.
pub(crate) fn xor_inplace(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Transposes one 8×8 bit block held as a little-endian `u64` (byte `r` is
/// row `r`, bit `c` within a byte is column `c`).
///
/// Writing a position as the concatenated index bits `(r2 r1 r0, c2 c1 c0)`,
/// a transpose swaps `r_k ↔ c_k` independently for each `k`; the swap for
/// level `k` exchanges positions at distance `7 · 2^k`.
#[inline]
fn transpose_8x8(mut x: u64) -> u64 {
    let mut t = (x ^ (x >> 7)) & 0x00AA_00AA_00AA_00AA;
    x ^= t ^ (t << 7);
    t = (x ^ (x >> 14)) & 0x0000_CCCC_0000_CCCC;
    x ^= t ^ (t << 14);
    t = (x ^ (x >> 28)) & 0x0000_0000_F0F0_F0F0;
    x ^= t ^ (t << 28);
    x
}

/// Transposes a bit matrix of `nrows × ncols` bits (both multiples of 8),
/// row-major, LSB-first.
pub(crate) fn transpose(input: &[u8], nrows: usize, ncols: usize) -> Vec<u8> {
    assert_eq!(nrows % 8, 0);
    assert_eq!(ncols % 8, 0);
    assert_eq!(input.len() * 8, nrows * ncols);
    let mut out = vec![0u8; input.len()];
    let in_stride = ncols / 8;
    let out_stride = nrows / 8;
    for rb in 0..nrows / 8 {
        for cb in 0..ncols / 8 {
            let mut x = 0u64;
            for k in 0..8 {
                x |= u64::from(input[(rb * 8 + k) * in_stride + cb]) << (8 * k);
            }
            let y = transpose_8x8(x);
            for k in 0..8 {
                out[(cb * 8 + k) * out_stride + rb] = (y >> (8 * k)) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn get_bit(m: &[u8], row: usize, col: usize, ncols: usize) -> bool {
        let i = row * ncols + col;
        m[i / 8] & (1 << (i % 8)) != 0
    }

    #[test]
    fn transpose_matches_naive() {
        let mut rng = crate::aes_rng::AesRng::from_seed(crate::block::Block::from(1u128));
        for &(nrows, ncols) in &[(8, 8), (128, 64), (16, 104)] {
            let input: Vec<u8> = (0..nrows * ncols / 8).map(|_| rng.gen()).collect();
            let output = transpose(&input, nrows, ncols);
            for r in 0..nrows {
                for c in 0..ncols {
                    assert_eq!(
                        get_bit(&input, r, c, ncols),
                        get_bit(&output, c, r, nrows),
                        "mismatch at ({r}, {c})"
                    );
                }
            }
        }
    }

    #[test]
    fn boolvec_round_trip() {
        let bv: Vec<bool> = (0..48).map(|i| i % 3 == 0).collect();
        assert_eq!(u8vec_to_boolvec(&boolvec_to_u8vec(&bv)), bv);
    }
}
