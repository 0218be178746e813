//! The online OPRF round: Request, BlindEval, Finalize.
//!
//! The engine is pure state over preprocessing material; moving the two
//! messages of a round between the parties is the session driver's job.
//! Each evaluation consumes the preprocessing slot selected by the round
//! counter, which advances exactly once per completed round; a failed round
//! aborts the session before the counter moves, and no slot is ever reused
//! (reusing one would leak the key through the one-time masks).
//!
//! All arithmetic is over `ℤ_q` on the 32-bit lane of the OT output blocks;
//! only the low `lg p` bits of the final value are meaningful.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::params::Params;
use crate::ro;

/// Errors of the online round engine.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// All `τ` preprocessing slots have been consumed.
    SlotsExhausted,
    /// A request was started before the previous round finished.
    RoundInProgress,
    /// A received request does not match the key dimension.
    WrongRequestLength {
        /// Expected vector length `n`.
        expected: usize,
        /// Received vector length.
        actual: usize,
    },
    /// A received response does not carry one value per choice in `[0, δ)`.
    WrongResponseLength {
        /// Expected vector length `δ`.
        expected: usize,
        /// Received vector length.
        actual: usize,
    },
    /// Preprocessing material does not match the parameters.
    MaterialSize {
        /// Which array is inconsistent.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
}

/// The blinded request of one round: `(e_0, e_1, b̄pr)`.
///
/// `e_0` is all zeros in this protocol version (the slot exists so the
/// message keeps its general shape; `a` itself is fresh per round).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRequest {
    /// First masked vector, `n` values in `ℤ_q`.
    pub e0: Vec<u16>,
    /// Second masked vector, `n` values in `ℤ_q`.
    pub e1: Vec<u16>,
    /// The shifted phase-two choice, in `[0, δ)`.
    pub bpr_bar: u8,
}

/// The blinded evaluation of one round: `δ` candidate values in `ℤ_p`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResponse {
    /// One candidate per shift `k ∈ [0, δ)`.
    pub y: Vec<u16>,
}

/// One completed evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Evaluation {
    /// First random-oracle seed.
    pub t: u64,
    /// Second random-oracle seed.
    pub x: u64,
    /// The OPRF value `⌊⟨sk, H(t, x)⟩⌋ / δ mod p`.
    pub z: u32,
}

/// Client-held values bridging `request` and `finalize` of one round.
#[derive(Debug)]
pub struct PendingEvaluation {
    t: u64,
    x: u64,
    c_sum: u32,
    slot: usize,
}

/// The Request/Finalize side of the online phase.
///
/// Owns the phase-one sender output `Sc`, the derived pattern `b̄`, and the
/// phase-two receiver outputs `(bpr, Rc_r)`.
pub struct OprfClient {
    params: Params,
    sc: Vec<[u32; 2]>,
    b_bar: Vec<bool>,
    bpr: Vec<u8>,
    rc_r: Vec<u32>,
    ctr: usize,
    in_flight: bool,
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::MaterialSize {
            what,
            expected,
            actual,
        })
    }
}

impl OprfClient {
    /// Builds the client from its preprocessing material. Only the low
    /// 32-bit lane of each OT block is retained.
    pub fn new(
        params: Params,
        sc: &[[Block; 2]],
        b_bar: Vec<bool>,
        bpr: Vec<u8>,
        rc_r: &[Block],
    ) -> Result<Self, Error> {
        check_len("Sc", params.n * params.tau, sc.len())?;
        check_len("b_bar", params.n, b_bar.len())?;
        check_len("bpr", params.tau, bpr.len())?;
        check_len("Rc_r", params.tau, rc_r.len())?;
        Ok(Self {
            params,
            sc: sc.iter().map(|p| [p[0].lane0(), p[1].lane0()]).collect(),
            b_bar,
            bpr,
            rc_r: rc_r.iter().map(|b| b.lane0()).collect(),
            ctr: 0,
            in_flight: false,
        })
    }

    /// Number of completed rounds; also the next slot to be consumed.
    pub fn rounds_completed(&self) -> usize {
        self.ctr
    }

    /// Starts round `ctr` for the input `(t, x)`.
    pub fn request(&mut self, t: u64, x: u64) -> Result<(EvalRequest, PendingEvaluation), Error> {
        if self.in_flight {
            return Err(Error::RoundInProgress);
        }
        let a = ro::expand(&self.params, t, x);
        let out = self.blind(t, x, &a)?;
        self.in_flight = true;
        Ok(out)
    }

    /// The blinding computation, on an explicit `a` vector.
    fn blind(&self, t: u64, x: u64, a: &[u32]) -> Result<(EvalRequest, PendingEvaluation), Error> {
        if self.ctr >= self.params.tau {
            return Err(Error::SlotsExhausted);
        }
        let n = self.params.n;
        let q = self.params.q();
        let delta = self.params.delta();
        let slot = self.ctr;
        let e0 = vec![0u16; n];
        let mut e1 = Vec::with_capacity(n);
        let mut c_sum: u32 = 0;
        for i in 0..n {
            let pair = &self.sc[slot * n + i];
            let b = usize::from(self.b_bar[i]);
            let c_i = q.sub(0, pair[b]);
            e1.push(q.reduce(a[i].wrapping_add(c_i).wrapping_add(pair[1 - b])) as u16);
            c_sum = c_sum.wrapping_add(c_i);
        }
        let c_sum = q.reduce(c_sum);
        let bpr_bar = delta.sub(delta.reduce(c_sum), self.bpr[slot] as u32) as u8;
        Ok((
            EvalRequest { e0, e1, bpr_bar },
            PendingEvaluation { t, x, c_sum, slot },
        ))
    }

    /// Finishes the round, unmasking the OPRF value from the response.
    pub fn finalize(
        &mut self,
        pending: PendingEvaluation,
        response: &EvalResponse,
    ) -> Result<Evaluation, Error> {
        let p = self.params.p();
        let delta = self.params.delta();
        if response.y.len() != delta.value() as usize {
            return Err(Error::WrongResponseLength {
                expected: delta.value() as usize,
                actual: response.y.len(),
            });
        }
        let k_star = delta.reduce(pending.c_sum) as usize;
        let y_final = (response.y[k_star] as u32).wrapping_sub(self.rc_r[pending.slot]);
        let carried = delta.div_floor(pending.c_sum - delta.reduce(pending.c_sum));
        let z = p.reduce(y_final.wrapping_sub(carried));
        self.ctr = pending.slot + 1;
        self.in_flight = false;
        Ok(Evaluation {
            t: pending.t,
            x: pending.x,
            z,
        })
    }
}

/// The BlindEval side of the online phase.
///
/// Owns the phase-one receiver output `Rs_r`, the key `sk`, and the
/// phase-two sender matrix `Ss`.
pub struct OprfServer {
    params: Params,
    sk: Vec<bool>,
    rs_r: Vec<u32>,
    ss: Vec<Vec<u32>>,
    ctr: usize,
}

impl OprfServer {
    /// Builds the server from its key and preprocessing material. Only the
    /// low 32-bit lane of each OT block is retained.
    pub fn new(
        params: Params,
        sk: Vec<bool>,
        rs_r: &[Block],
        ss: &[Vec<Block>],
    ) -> Result<Self, Error> {
        check_len("sk", params.n, sk.len())?;
        check_len("Rs_r", params.n * params.tau, rs_r.len())?;
        check_len("Ss", params.tau, ss.len())?;
        let delta = params.delta().value() as usize;
        let mut lanes = Vec::with_capacity(ss.len());
        for row in ss {
            check_len("Ss row", delta, row.len())?;
            lanes.push(row.iter().map(|b| b.lane0()).collect());
        }
        Ok(Self {
            params,
            sk,
            rs_r: rs_r.iter().map(|b| b.lane0()).collect(),
            ss: lanes,
            ctr: 0,
        })
    }

    /// Number of completed rounds; also the next slot to be consumed.
    pub fn rounds_completed(&self) -> usize {
        self.ctr
    }

    /// Evaluates the blinded request at slot `ctr`.
    pub fn blind_eval(&mut self, request: &EvalRequest) -> Result<EvalResponse, Error> {
        if self.ctr >= self.params.tau {
            return Err(Error::SlotsExhausted);
        }
        let n = self.params.n;
        if request.e0.len() != n || request.e1.len() != n {
            return Err(Error::WrongRequestLength {
                expected: n,
                actual: request.e0.len().max(request.e1.len()),
            });
        }
        let q = self.params.q();
        let p = self.params.p();
        let delta = self.params.delta();
        let slot = self.ctr;
        let mut atil_sum: u32 = 0;
        for i in 0..n {
            let rs = self.rs_r[slot * n + i];
            let atil = [
                q.sub(request.e0[i] as u32, rs),
                q.sub(request.e1[i] as u32, rs),
            ];
            atil_sum = atil_sum.wrapping_add(atil[usize::from(self.sk[i])]);
        }
        let atil_sum = q.reduce(atil_sum);
        let row = &self.ss[slot];
        let mut y = Vec::with_capacity(delta.value() as usize);
        for k in 0..delta.value() {
            let mask = row[delta.sub(k, request.bpr_bar as u32) as usize];
            y.push(p.reduce(delta.div_floor(q.sub(atil_sum, k)).wrapping_add(mask)) as u16);
        }
        self.ctr += 1;
        Ok(EvalResponse { y })
    }
}

/// Evaluates the PRF in the clear: `⌊Σ_{sk[i]=1} a[i]⌋ / δ mod p`, the inner
/// product taken over the integers.
pub fn evaluate_reference(params: &Params, sk: &[bool], a: &[u32]) -> u32 {
    let sum: u32 = sk
        .iter()
        .zip(a)
        .filter(|(s, _)| **s)
        .map(|(_, &v)| v)
        .sum();
    params.p().reduce(params.delta().div_floor(sum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    use crate::aes_rng::AesRng;

    struct Material {
        sc: Vec<[Block; 2]>,
        rs_r: Vec<Block>,
        b_bar: Vec<bool>,
        bpr: Vec<u8>,
        rc_r: Vec<Block>,
        ss: Vec<Vec<Block>>,
    }

    /// Synthetic OT-consistent preprocessing: random sender material with
    /// the receiver sides derived per the OT correctness invariants.
    fn material(params: &Params, sk: &[bool], rng: &mut AesRng) -> Material {
        let b_n: Vec<bool> = (0..params.n).map(|_| rng.gen()).collect();
        let sc: Vec<[Block; 2]> = (0..params.n * params.tau).map(|_| rng.gen()).collect();
        let rs_r: Vec<Block> = sc
            .iter()
            .enumerate()
            .map(|(k, pair)| pair[usize::from(b_n[k % params.n])])
            .collect();
        let delta = params.delta().value();
        let bpr: Vec<u8> = (0..params.tau)
            .map(|_| rng.gen::<u8>() & (delta as u8 - 1))
            .collect();
        let ss: Vec<Vec<Block>> = (0..params.tau)
            .map(|_| (0..delta).map(|_| rng.gen()).collect())
            .collect();
        let rc_r: Vec<Block> = bpr
            .iter()
            .enumerate()
            .map(|(i, &c)| ss[i][c as usize])
            .collect();
        let b_bar = b_n
            .iter()
            .zip(sk)
            .map(|(&b, &s)| b ^ s)
            .collect();
        Material {
            sc,
            rs_r,
            b_bar,
            bpr,
            rc_r,
            ss,
        }
    }

    fn run_round(params: &Params, sk: &[bool], a: &[u32], m: &Material) -> u32 {
        let mut client = OprfClient::new(
            *params,
            &m.sc,
            m.b_bar.clone(),
            m.bpr.clone(),
            &m.rc_r,
        )
        .unwrap();
        let mut server = OprfServer::new(*params, sk.to_vec(), &m.rs_r, &m.ss).unwrap();
        let (request, pending) = client.blind(0, 0, a).unwrap();
        let response = server.blind_eval(&request).unwrap();
        client.finalize(pending, &response).unwrap().z
    }

    #[test]
    fn scenario_small_q16() {
        // n = 4, q = 16, p = 2, δ = 8, sk = 1010, a = (3, 5, 7, 11):
        // z = ⌊3 + 7⌋ / 8 mod 2 = 1.
        let params = Params::new(4, 4, 4, 1, 2, 1).unwrap();
        let sk = [true, false, true, false];
        let a = [3, 5, 7, 11];
        let mut rng = AesRng::from_seed(Block::from(7u128));
        let m = material(&params, &sk, &mut rng);
        assert_eq!(run_round(&params, &sk, &a, &m), 1);
        assert_eq!(evaluate_reference(&params, &sk, &a), 1);
    }

    #[test]
    fn scenario_zero_key() {
        // sk = 0^n forces z = 0 for any a.
        let params = Params::new(4, 4, 4, 1, 2, 1).unwrap();
        let sk = [false; 4];
        let mut rng = AesRng::from_seed(Block::from(8u128));
        let m = material(&params, &sk, &mut rng);
        for a in [[0, 1, 2, 3], [15, 15, 15, 15], [9, 0, 4, 2]] {
            assert_eq!(run_round(&params, &sk, &a, &m), 0);
        }
    }

    #[test]
    fn scenario_q8_all_ones_key() {
        // n = 2, q = 8, p = 2, δ = 4, sk = 11, a = (6, 6): z = ⌊12⌋ / 4 mod 2 = 1.
        let params = Params::new(2, 2, 3, 1, 2, 1).unwrap();
        let sk = [true, true];
        let a = [6, 6];
        let mut rng = AesRng::from_seed(Block::from(9u128));
        let m = material(&params, &sk, &mut rng);
        assert_eq!(run_round(&params, &sk, &a, &m), 1);
    }

    #[test]
    fn matches_reference_on_random_inputs() {
        let params = Params::new(16, 8, 12, 8, 2, 8).unwrap();
        let mut rng = AesRng::from_seed(Block::from(10u128));
        let sk: Vec<bool> = (0..params.n).map(|_| rng.gen()).collect();
        let m = material(&params, &sk, &mut rng);
        let mut client =
            OprfClient::new(params, &m.sc, m.b_bar.clone(), m.bpr.clone(), &m.rc_r).unwrap();
        let mut server = OprfServer::new(params, sk.clone(), &m.rs_r, &m.ss).unwrap();
        for round in 0..params.num_rounds {
            let (t, x) = (rng.gen(), rng.gen());
            let (request, pending) = client.request(t, x).unwrap();
            let response = server.blind_eval(&request).unwrap();
            let eval = client.finalize(pending, &response).unwrap();
            let a = ro::expand(&params, t, x);
            assert_eq!(eval.z, evaluate_reference(&params, &sk, &a));
            assert_eq!(client.rounds_completed(), round + 1);
            assert_eq!(server.rounds_completed(), round + 1);
        }
    }

    #[test]
    fn replay_is_deterministic() {
        let params = Params::new(8, 2, 12, 8, 2, 2).unwrap();
        let mut rng = AesRng::from_seed(Block::from(11u128));
        let sk: Vec<bool> = (0..params.n).map(|_| rng.gen()).collect();
        let m = material(&params, &sk, &mut rng);
        let a = ro::expand(&params, 3, 4);
        let z0 = run_round(&params, &sk, &a, &m);
        let z1 = run_round(&params, &sk, &a, &m);
        assert_eq!(z0, z1);
    }

    #[test]
    fn refuses_round_past_last_slot() {
        let params = Params::new(4, 2, 4, 1, 2, 2).unwrap();
        let mut rng = AesRng::from_seed(Block::from(12u128));
        let sk: Vec<bool> = (0..params.n).map(|_| rng.gen()).collect();
        let m = material(&params, &sk, &mut rng);
        let mut client =
            OprfClient::new(params, &m.sc, m.b_bar.clone(), m.bpr.clone(), &m.rc_r).unwrap();
        let mut server = OprfServer::new(params, sk, &m.rs_r, &m.ss).unwrap();
        for _ in 0..params.tau {
            let (request, pending) = client.request(0, 0).unwrap();
            let response = server.blind_eval(&request).unwrap();
            client.finalize(pending, &response).unwrap();
        }
        assert!(matches!(client.request(0, 0), Err(Error::SlotsExhausted)));
        let (dummy_request, _) = {
            // Rebuild a fresh client on slot 0 to produce a shaped request.
            let mut c =
                OprfClient::new(params, &m.sc, m.b_bar.clone(), m.bpr.clone(), &m.rc_r).unwrap();
            c.request(0, 0).unwrap()
        };
        assert!(matches!(
            server.blind_eval(&dummy_request),
            Err(Error::SlotsExhausted)
        ));
    }

    #[test]
    fn rejects_interleaved_requests() {
        let params = Params::new(4, 2, 4, 1, 2, 2).unwrap();
        let mut rng = AesRng::from_seed(Block::from(13u128));
        let sk = [false, true, false, true];
        let m = material(&params, &sk, &mut rng);
        let mut client =
            OprfClient::new(params, &m.sc, m.b_bar.clone(), m.bpr.clone(), &m.rc_r).unwrap();
        client.request(0, 0).unwrap();
        assert!(matches!(client.request(1, 1), Err(Error::RoundInProgress)));
    }

    #[test]
    fn corrupted_mask_matrix_is_detected() {
        let params = Params::new(8, 4, 12, 8, 2, 1).unwrap();
        let mut rng = AesRng::from_seed(Block::from(14u128));
        let sk: Vec<bool> = (0..params.n).map(|_| rng.gen()).collect();
        let mut m = material(&params, &sk, &mut rng);
        // Flip the low lane bit of every entry in slot 0 of Ss.
        for entry in m.ss[0].iter_mut() {
            *entry ^= Block::from(1u128);
        }
        let a = ro::expand(&params, 5, 6);
        let z = run_round(&params, &sk, &a, &m);
        assert_ne!(z, evaluate_reference(&params, &sk, &a));
    }
}
