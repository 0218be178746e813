//! Random-oracle expansion of the evaluation input.
//!
//! The request input is a pair of 64-bit seeds `(t, x)`; the oracle expands
//! it deterministically into the vector `a ∈ ℤ_q^n` that both the blinded
//! request and the reference evaluator consume. blake3's extendable output
//! fills the `2n` bytes, which are parsed as little-endian 16-bit values and
//! reduced mod `q`.

use crate::params::Params;

/// Expands `(t, x)` into `n` values in `[0, q)`.
pub fn expand(params: &Params, t: u64, x: u64) -> Vec<u32> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&t.to_le_bytes());
    hasher.update(&x.to_le_bytes());
    let mut bytes = vec![0u8; 2 * params.n];
    hasher.finalize_xof().fill(&mut bytes);
    bytes
        .chunks_exact(2)
        .map(|c| params.q().reduce(u16::from_le_bytes([c[0], c[1]]) as u32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_reduced() {
        let params = Params::default();
        let a = expand(&params, 7, 13);
        let b = expand(&params, 7, 13);
        assert_eq!(a, b);
        assert_eq!(a.len(), params.n);
        assert!(a.iter().all(|&v| v < params.q().value()));
    }

    #[test]
    fn inputs_separate() {
        let params = Params::default();
        assert_ne!(expand(&params, 0, 1), expand(&params, 1, 0));
    }
}
