//! `wandersim-server` entry point (C12): parses CLI args, wires logging,
//! starts the accept loop, and drains in-flight connections on Ctrl-C.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;

use wandersim::config::ServerArgs;
use wandersim::context::Config;
use wandersim::grid::WorldKind;
use wandersim::server::Server;
use wandersim::trajectory::MoveProbs;

/// The server boots with an empty placeholder simulation; the first
/// CREATE_SIM replaces it. `validate()` only requires nonzero dimensions
/// and a valid probability distribution, so a 1x1 wrap world is the
/// smallest config that satisfies it.
fn bootstrap_config(args: &ServerArgs) -> Config {
    Config {
        kind: WorldKind::Wrap,
        width: 1,
        height: 1,
        probs: MoveProbs { up: 0.25, down: 0.25, left: 0.25, right: 0.25 },
        k: 1,
        total_reps: 1,
        multi_user: false,
        obstacle_percent: 0,
        obstacle_seed: 0,
        workers: args.resolved_workers(),
        queue_capacity: args.queue_capacity,
    }
}

fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    wandersim::logging::init(args.verbose)?;

    let config = bootstrap_config(&args);
    let server = Server::new(config).map_err(|e| anyhow::anyhow!("failed to start: {e}"))?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("received interrupt, shutting down");
        stop_handler.store(true, Ordering::SeqCst);
    })?;

    let socket_path = PathBuf::from(&args.socket_path);
    server.run(&socket_path, stop)
}
