//! End-to-end sessions at small parameters.
//!
//! `simulate` runs the real preprocessing (KEM base OTs, IKNP phase one,
//! KKRT phase two) over an in-process channel pair and verifies every
//! online evaluation against the reference evaluator.

use pool_oprf::params::Params;
use pool_oprf::session::simulate;

#[tokio::test]
async fn full_session_matches_reference() {
    let params = Params::new(8, 16, 4, 1, 4, 5).unwrap();
    let evaluations = simulate(&params).await.unwrap();
    assert_eq!(evaluations.len(), 5);
}

#[tokio::test]
async fn session_with_default_moduli() {
    // The paper's moduli (q = 2^12, p = 2^8, δ = 2^4) at a small dimension.
    let params = Params::new(16, 8, 12, 8, 2, 8).unwrap();
    let evaluations = simulate(&params).await.unwrap();
    assert_eq!(evaluations.len(), 8);
}

#[tokio::test]
async fn zero_rounds_session_is_a_noop() {
    let params = Params::new(8, 8, 4, 1, 2, 0).unwrap();
    let evaluations = simulate(&params).await.unwrap();
    assert!(evaluations.is_empty());
}

#[tokio::test]
async fn session_can_consume_every_slot() {
    let params = Params::new(4, 6, 4, 1, 2, 6).unwrap();
    let evaluations = simulate(&params).await.unwrap();
    assert_eq!(evaluations.len(), 6);
}

#[tokio::test]
async fn evaluations_are_fresh_per_round() {
    let params = Params::new(8, 4, 12, 8, 2, 4).unwrap();
    let evaluations = simulate(&params).await.unwrap();
    // Inputs are drawn fresh per round, so the (t, x) pairs must differ.
    for (i, a) in evaluations.iter().enumerate() {
        for b in &evaluations[i + 1..] {
            assert!((a.t, a.x) != (b.t, b.x));
        }
    }
}
