//! Protocol parameters and their validation.
//!
//! Parameters are runtime values rather than compile-time constants so tests
//! can instantiate tiny instances; every constraint is checked once at
//! construction, which is where configuration errors surface.

use serde::{Deserialize, Serialize};

use crate::arith::Modulus;

/// Errors raised by [`Params::new`] for inconsistent parameter choices.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The secret-key dimension `n` must be nonzero.
    EmptyKeyDimension,
    /// The number of preprocessed slots `τ` must be nonzero.
    NoSlots,
    /// `num_rounds` exceeds the number of preprocessed slots `τ`.
    RoundsExceedSlots {
        /// Requested number of online rounds.
        num_rounds: usize,
        /// Available preprocessing slots.
        tau: usize,
    },
    /// `q` must be strictly larger than `p` so that `δ = q / p ≥ 2`.
    ModulusOrder {
        /// Binary logarithm of the large modulus.
        lg_q: u32,
        /// Binary logarithm of the small modulus.
        lg_p: u32,
    },
    /// `lg δ` exceeds the 7-bit bound of the 1-of-δ preprocessing.
    DeltaTooWide {
        /// Binary logarithm of `δ`.
        lg_delta: u32,
    },
    /// `q` exceeds the 16-bit range the wire format carries.
    ModulusTooWide {
        /// Binary logarithm of the large modulus.
        lg_q: u32,
    },
}

/// The full parameter set of one OPRF session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Secret-key dimension `n`.
    pub n: usize,
    /// Number of evaluations supported by one preprocessing, `τ`.
    pub tau: usize,
    /// Expansion factor of the stretched phase-one variant, `κ`.
    pub kappa: usize,
    /// Number of online evaluations to run.
    pub num_rounds: usize,
    /// Number of base OTs bootstrapping each extender.
    pub base_ot_count: usize,
    /// Statistical security parameter of the 1-of-δ extension.
    pub stat_sec: usize,
    q: Modulus,
    p: Modulus,
    delta: Modulus,
}

impl Params {
    /// Creates a parameter set, validating all cross-parameter constraints.
    ///
    /// `δ` is derived as `q / p`, so `δ · p = q` holds by construction.
    pub fn new(
        n: usize,
        tau: usize,
        lg_q: u32,
        lg_p: u32,
        kappa: usize,
        num_rounds: usize,
    ) -> Result<Self, Error> {
        if n == 0 {
            return Err(Error::EmptyKeyDimension);
        }
        if tau == 0 {
            return Err(Error::NoSlots);
        }
        if num_rounds > tau {
            return Err(Error::RoundsExceedSlots { num_rounds, tau });
        }
        if lg_q <= lg_p {
            return Err(Error::ModulusOrder { lg_q, lg_p });
        }
        if lg_q > 16 {
            return Err(Error::ModulusTooWide { lg_q });
        }
        let lg_delta = lg_q - lg_p;
        if lg_delta > 7 {
            return Err(Error::DeltaTooWide { lg_delta });
        }
        Ok(Self {
            n,
            tau,
            kappa,
            num_rounds,
            base_ot_count: 128,
            stat_sec: 40,
            q: Modulus::new(lg_q),
            p: Modulus::new(lg_p),
            delta: Modulus::new(lg_delta),
        })
    }

    /// The large modulus `q`.
    #[inline]
    pub fn q(&self) -> Modulus {
        self.q
    }

    /// The small (rounding) modulus `p`.
    #[inline]
    pub fn p(&self) -> Modulus {
        self.p
    }

    /// The 1-of-δ choice modulus `δ = q / p`.
    #[inline]
    pub fn delta(&self) -> Modulus {
        self.delta
    }

    /// Returns a copy with a different number of online rounds.
    pub fn with_num_rounds(mut self, num_rounds: usize) -> Result<Self, Error> {
        if num_rounds > self.tau {
            return Err(Error::RoundsExceedSlots {
                num_rounds,
                tau: self.tau,
            });
        }
        self.num_rounds = num_rounds;
        Ok(self)
    }
}

impl Default for Params {
    /// The parameter set of the reference benchmark: `n = 482`, `τ = 2^16`,
    /// `q = 2^12`, `p = 2^8` (hence `δ = 2^4`), `κ = 6144`, 10 rounds.
    fn default() -> Self {
        Self::new(482, 1 << 16, 12, 8, 6144, 10).expect("default parameters are consistent")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let params = Params::default();
        assert_eq!(params.q().value(), 4096);
        assert_eq!(params.p().value(), 256);
        assert_eq!(params.delta().value(), 16);
        assert_eq!(
            params.delta().value() * params.p().value(),
            params.q().value()
        );
    }

    #[test]
    fn rejects_too_many_rounds() {
        assert_eq!(
            Params::new(4, 8, 4, 1, 2, 9),
            Err(Error::RoundsExceedSlots {
                num_rounds: 9,
                tau: 8
            })
        );
    }

    #[test]
    fn rejects_wide_delta() {
        // lg δ = 9 − 1 = 8 > 7.
        assert_eq!(
            Params::new(4, 8, 9, 1, 2, 1),
            Err(Error::DeltaTooWide { lg_delta: 8 })
        );
    }

    #[test]
    fn rejects_inverted_moduli() {
        assert!(matches!(
            Params::new(4, 8, 4, 4, 2, 1),
            Err(Error::ModulusOrder { .. })
        ));
    }
}
