//! An oblivious pseudorandom function from Learning with Rounding, built
//! on oblivious transfer.
//!
//! Two parties jointly evaluate `f_sk(a) = ⌊⟨sk, a⟩⌋ / δ mod p` on
//! `a = H(t, x)`: the [`session`] client learns the value without revealing
//! `(t, x)`, the server contributes the key `sk` without learning the input
//! or the output. The protocol splits into input-independent [`preproc`]
//! (two batches of random OTs through the extenders in [`ot`]) and a
//! three-message [`online`] round per evaluation that consumes one
//! preprocessing slot.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod aes_rng;
pub mod arith;
pub mod block;
pub mod channel;
pub mod online;
pub mod ot;
pub mod params;
pub mod preproc;
pub mod ro;
pub mod session;

mod crypto;
