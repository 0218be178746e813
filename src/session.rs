//! Session driver: one complete client-server pair.
//!
//! The client role is the phase-one OT sender and phase-two receiver, and
//! runs Request/Finalize online; the server role is the phase-one receiver
//! and phase-two sender, samples the key and answers BlindEvals. After
//! preprocessing, the server derives `b̄ = b ⊕ sk` and sends it to the
//! client — an n-bit message that reveals neither the choice pattern nor
//! the key. Rounds are strictly sequential; there is no pipelining and no
//! retry, and any error aborts the session.

use rand::{CryptoRng, Rng};
use tokio::task;
use tracing::info;

use crate::aes_rng::AesRng;
use crate::channel::{self, recv_from, recv_vec_from, send_to, Channel, SimpleChannel};
use crate::online::{self, EvalRequest, EvalResponse, Evaluation, OprfClient, OprfServer};
use crate::params::Params;
use crate::preproc::{phase_one, phase_two};
use crate::ro;
use crate::{ot, params};

/// Errors aborting a session.
#[derive(Debug)]
pub enum Error {
    /// A message could not be sent or received.
    Channel(channel::Error),
    /// A preprocessing extender failed.
    Ot(ot::Error),
    /// The online engine refused a round.
    Online(online::Error),
    /// The parameters were rejected.
    Params(params::Error),
    /// Establishing the transport failed.
    Io(std::io::Error),
    /// The peer role terminated abnormally.
    RoleFailed,
    /// An evaluation disagrees with the reference evaluator. Indicates a
    /// bug or corrupted preprocessing material; fatal.
    EvaluationMismatch {
        /// The failing round.
        round: usize,
        /// Value from the reference evaluator.
        expected: u32,
        /// Value computed by the protocol.
        actual: u32,
    },
}

impl From<channel::Error> for Error {
    fn from(e: channel::Error) -> Self {
        Self::Channel(e)
    }
}

impl From<ot::Error> for Error {
    fn from(e: ot::Error) -> Self {
        Self::Ot(e)
    }
}

impl From<online::Error> for Error {
    fn from(e: online::Error) -> Self {
        Self::Online(e)
    }
}

impl From<params::Error> for Error {
    fn from(e: params::Error) -> Self {
        Self::Params(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Runs the client role: preprocessing, key setup, then `num_rounds`
/// evaluations with fresh `(t, x)` inputs drawn from `rng`.
pub async fn run_client<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<Evaluation>, Error> {
    let sc = phase_one::iknp_send(params, channel, rng).await?;
    let (bpr, rc_r) = phase_two::kkrt_receive(params, channel, rng).await?;
    let b_bar: Vec<bool> = recv_vec_from(channel, "key setup", params.n).await?;
    let mut client = OprfClient::new(*params, &sc, b_bar, bpr, &rc_r)?;
    drop(sc);
    let mut evaluations = Vec::with_capacity(params.num_rounds);
    for round in 0..params.num_rounds {
        let t = rng.gen();
        let x = rng.gen();
        let (request, pending) = client.request(t, x)?;
        send_to(channel, "request", &request).await?;
        let response: EvalResponse = recv_from(channel, "blind eval").await?;
        let evaluation = client.finalize(pending, &response)?;
        info!(round, z = evaluation.z, "finalized evaluation");
        evaluations.push(evaluation);
    }
    channel::flush(channel, "online").await?;
    Ok(evaluations)
}

/// Runs the server role: preprocessing, key sampling and setup, then
/// `num_rounds` blind evaluations. Returns the key so the driver can verify
/// the session against the reference evaluator.
pub async fn run_server<C: Channel, RNG: CryptoRng + Rng>(
    params: &Params,
    channel: &mut C,
    rng: &mut RNG,
) -> Result<Vec<bool>, Error> {
    let (b_n, rs_r) = phase_one::iknp_receive(params, channel, rng).await?;
    let ss = phase_two::kkrt_send(params, channel, rng).await?;
    let sk: Vec<bool> = (0..params.n).map(|_| rng.gen()).collect();
    let b_bar: Vec<bool> = b_n.iter().zip(&sk).map(|(&b, &s)| b ^ s).collect();
    send_to(channel, "key setup", &b_bar).await?;
    let mut server = OprfServer::new(*params, sk.clone(), &rs_r, &ss)?;
    drop(rs_r);
    drop(ss);
    for _ in 0..params.num_rounds {
        let request: EvalRequest = recv_from(channel, "request").await?;
        let response = server.blind_eval(&request)?;
        send_to(channel, "blind eval", &response).await?;
    }
    channel::flush(channel, "online").await?;
    Ok(sk)
}

/// Checks every evaluation against the reference evaluator.
pub fn verify_evaluations(
    params: &Params,
    sk: &[bool],
    evaluations: &[Evaluation],
) -> Result<(), Error> {
    for (round, evaluation) in evaluations.iter().enumerate() {
        let a = ro::expand(params, evaluation.t, evaluation.x);
        let expected = online::evaluate_reference(params, sk, &a);
        if expected != evaluation.z {
            return Err(Error::EvaluationMismatch {
                round,
                expected,
                actual: evaluation.z,
            });
        }
    }
    Ok(())
}

/// Runs a complete in-process session over a [`SimpleChannel`] pair: the
/// server role on a spawned task, the client role inline, then verifies
/// every evaluation against the reference evaluator.
pub async fn simulate(params: &Params) -> Result<Vec<Evaluation>, Error> {
    let (mut client_channel, mut server_channel) = SimpleChannel::pair();
    let server_params = *params;
    let server = task::spawn(async move {
        let mut rng = AesRng::new();
        run_server(&server_params, &mut server_channel, &mut rng).await
    });
    let mut rng = AesRng::new();
    let evaluations = match run_client(params, &mut client_channel, &mut rng).await {
        Ok(evaluations) => evaluations,
        Err(e) => {
            server.abort();
            return Err(e);
        }
    };
    let sk = server.await.map_err(|_| Error::RoleFailed)??;
    verify_evaluations(params, &sk, &evaluations)?;
    Ok(evaluations)
}
