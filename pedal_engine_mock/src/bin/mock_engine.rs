use clap::Parser;
use crossbeam_channel::bounded;
use pedal_engine_mock::{EngineLoop, EngineState, NetworkThread, DEFAULT_ADDR};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(10);

/// In-memory pedal engine speaking the client websocket protocol.
#[derive(Parser, Debug)]
#[command(name = "mock_engine")]
struct Args {
    #[arg(long, env = "PEDAL_ENGINE_ADDR", default_value = DEFAULT_ADDR)]
    addr: String,

    /// Write the bound address here once listening (handy with port 0).
    #[arg(long, value_name = "PATH")]
    addr_file: Option<PathBuf>,

    /// Exit after this many milliseconds.
    #[arg(long, value_name = "MS")]
    run_for_ms: Option<u64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let (in_tx, in_rx) = bounded(pedal_engine_mock::INBOUND_CAP);
    let (out_tx, out_rx) = bounded(pedal_engine_mock::OUTBOUND_CAP);
    let net = match NetworkThread::spawn_with_addr(&args.addr, in_tx, out_rx) {
        Ok(net) => net,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &args.addr_file {
        if let Err(e) = std::fs::write(path, net.listen_addr().to_string()) {
            error!("cannot write {}: {e}", path.display());
        }
    }
    println!("mock_engine listening on ws://{}", net.listen_addr());

    let mut engine = EngineLoop::new(in_rx, out_tx, EngineState::demo());
    let deadline = args
        .run_for_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    while deadline.map_or(true, |d| Instant::now() < d) {
        engine.tick();
        thread::sleep(TICK);
    }

    info!("shutting down");
    net.shutdown();
    ExitCode::SUCCESS
}
