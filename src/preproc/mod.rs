//! Input-independent preprocessing.
//!
//! One preprocessing produces the correlated randomness for up to `τ`
//! online evaluations, in two phases: [`phase_one`] runs one 1-of-2 random
//! OT per key bit per slot (with the receiver's choice bits tiled so a
//! single n-bit pattern repeats across all slots), [`phase_two`] runs one
//! 1-of-δ random OT per slot. Every phase function times itself and logs
//! the channel byte counters after its final flush; any extender error is
//! fatal to the session.

pub mod phase_one;
pub mod phase_two;
