//! Benchmark and demo executable.
//!
//! Takes no flags. Benchmarks the alternative preprocessing procedures over
//! a localhost TCP channel, then runs one complete session (tiled IKNP
//! phase one, KKRT phase two, and the online evaluations) and verifies
//! every result against the reference evaluator. Exits non-zero on any
//! failure.

use std::process::ExitCode;

use pool_oprf::aes_rng::AesRng;
use pool_oprf::channel::TcpChannel;
use pool_oprf::params::Params;
use pool_oprf::preproc::{phase_one, phase_two};
use pool_oprf::session::{self, Error};

const ADDR: &str = "127.0.0.1:1212";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("session failed: {e:?}");
            ExitCode::FAILURE
        }
    }
}

/// One TCP channel per role, connected over localhost.
async fn tcp_pair() -> Result<(TcpChannel, TcpChannel), Error> {
    let listener = tokio::net::TcpListener::bind(ADDR).await?;
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        Ok::<_, std::io::Error>(TcpChannel::from_stream(stream))
    });
    let connector = TcpChannel::connect(ADDR).await?;
    let accepted = accept.await.map_err(|_| Error::RoleFailed)??;
    Ok((accepted, connector))
}

macro_rules! bench_pair {
    ($params:expr, $recv:path, $send:path) => {{
        let params = $params;
        let (mut recv_channel, mut send_channel) = tcp_pair().await?;
        let receiver = tokio::spawn(async move {
            let mut rng = AesRng::new();
            $recv(&params, &mut recv_channel, &mut rng).await.map(|_| ())
        });
        let mut rng = AesRng::new();
        $send(&params, &mut send_channel, &mut rng).await?;
        receiver.await.map_err(|_| Error::RoleFailed)??;
    }};
}

async fn run() -> Result<(), Error> {
    let params = Params::default();

    println!("Benchmarking alternative preprocessing procedures...");
    println!("Client cost is phase one sender plus phase two receiver, and vice-versa for the server.");

    println!("\nPhase one with wide IKNP...");
    bench_pair!(params, phase_one::iknp_wide_receive, phase_one::iknp_wide_send);

    println!("\nPhase two with IKNP...");
    bench_pair!(params, phase_two::iknp_receive, phase_two::iknp_send);

    println!("\nPhase one with silent OT (n OTs, locally stretched)...");
    bench_pair!(
        params,
        phase_one::silent_stretched_receive,
        phase_one::silent_stretched_send
    );

    println!("\nPhase two with silent OT...");
    bench_pair!(params, phase_two::silent_receive, phase_two::silent_send);

    println!("\nPhase one with silent OT (n * kappa OTs)...");
    bench_pair!(
        params,
        phase_one::silent_full_receive,
        phase_one::silent_full_send
    );

    println!("\nPhase two with silent OT...");
    bench_pair!(params, phase_two::silent_receive, phase_two::silent_send);

    println!(
        "\n\nComputing preprocessing and {} evaluations of the OPRF...",
        params.num_rounds
    );
    let (mut server_channel, mut client_channel) = tcp_pair().await?;
    let server = tokio::spawn(async move {
        let mut rng = AesRng::new();
        session::run_server(&params, &mut server_channel, &mut rng).await
    });
    let mut rng = AesRng::new();
    let evaluations = session::run_client(&params, &mut client_channel, &mut rng).await?;
    let sk = server.await.map_err(|_| Error::RoleFailed)??;
    session::verify_evaluations(&params, &sk, &evaluations)?;
    for evaluation in &evaluations {
        println!("Result: {}", evaluation.z);
    }
    Ok(())
}
