//! `wandersim-client` entry point (C12): a small non-interactive subcommand
//! surface standing in for the menu UI spec.md keeps out of scope, enough
//! to drive the protocol end-to-end.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use wandersim::client::Dispatcher;
use wandersim::client::NoopSink;
use wandersim::config::ClientArgs;
use wandersim::config::Command;
use wandersim::wire::types;
use wandersim::wire::CreateSimPayload;
use wandersim::wire::ErrorPayload;
use wandersim::wire::QueryStatusPayload;
use wandersim::wire::QuitPayload;
use wandersim::wire::RequestSnapshotPayload;
use wandersim::wire::StatusPayload;
use wandersim::wire::StopSimPayload;

const REPLY_TIMEOUT_MS: u64 = 5_000;
const SNAPSHOT_POLL_INTERVAL: Duration = Duration::from_millis(20);

fn main() -> anyhow::Result<()> {
    let args = ClientArgs::parse();
    wandersim::logging::init(args.verbose)?;

    let pid = std::process::id();
    let (dispatcher, welcome) = Dispatcher::connect(Path::new(&args.socket_path), pid, Arc::new(NoopSink))
        .map_err(|e| anyhow::anyhow!("connect failed: {e}"))?;
    log::info!(
        "connected: world {}x{}, mode {}, rep {}/{}",
        welcome.width,
        welcome.height,
        welcome.mode,
        welcome.current_rep,
        welcome.total_reps
    );

    run_command(&dispatcher, pid, &args.command)?;

    let quit = QuitPayload { pid, stop_if_owner: 0 };
    let _ = dispatcher.send_and_wait(types::QUIT, &quit.encode(), &[types::ACK], REPLY_TIMEOUT_MS);
    dispatcher.join_reader();
    Ok(())
}

fn run_command(dispatcher: &Dispatcher, pid: u32, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            let req = QueryStatusPayload { pid };
            let (hdr, payload) = dispatcher
                .send_and_wait(types::QUERY_STATUS, &req.encode(), &[types::STATUS, types::ERROR], REPLY_TIMEOUT_MS)
                .map_err(|e| anyhow::anyhow!("status request failed: {e}"))?;
            if hdr.msg_type == types::ERROR {
                return Err(anyhow::anyhow!("server error: {}", decode_error(&payload)));
            }
            let status = StatusPayload::decode(&payload)?;
            println!(
                "state={} mode={} rep={}/{} world={}x{} k={} owner={}",
                status.sim_state,
                status.mode,
                status.current_rep,
                status.total_reps,
                status.width,
                status.height,
                status.k,
                status.has_owner != 0,
            );
        }
        Command::Create {
            kind,
            width,
            height,
            up,
            down,
            left,
            right,
            k,
            reps,
            obstacle_percent,
            obstacle_seed,
            multi_user,
        } => {
            let req = CreateSimPayload {
                world_kind: kind.wire(),
                width: *width,
                height: *height,
                probs: [*up, *down, *left, *right],
                k: *k,
                total_reps: *reps,
                multi_user: *multi_user as u8,
                obstacle_percent: *obstacle_percent,
                obstacle_seed: *obstacle_seed,
            };
            expect_ack(dispatcher, types::CREATE_SIM, &req.encode())?;
            println!("simulation created");
        }
        Command::Start => {
            expect_ack(dispatcher, types::START_SIM, &[])?;
            println!("simulation started");
        }
        Command::Stop => {
            let req = StopSimPayload { pid };
            expect_ack(dispatcher, types::STOP_SIM, &req.encode())?;
            println!("stop requested");
        }
        Command::Snapshot => {
            let req = RequestSnapshotPayload { pid };
            expect_ack(dispatcher, types::REQUEST_SNAPSHOT, &req.encode())?;
            loop {
                if let Some(assembly) = dispatcher.snapshots().take_finished() {
                    println!(
                        "snapshot {}: {}x{} cells={} fields=0b{:04b}",
                        assembly.snapshot_id, assembly.width, assembly.height, assembly.cell_count, assembly.fields
                    );
                    break;
                }
                thread::sleep(SNAPSHOT_POLL_INTERVAL);
            }
        }
    }
    Ok(())
}

fn expect_ack(dispatcher: &Dispatcher, msg_type: u16, payload: &[u8]) -> anyhow::Result<()> {
    let (hdr, resp) = dispatcher
        .send_and_wait(msg_type, payload, &[types::ACK, types::ERROR], REPLY_TIMEOUT_MS)
        .map_err(|e| anyhow::anyhow!("request {msg_type} failed: {e}"))?;
    if hdr.msg_type == types::ERROR {
        return Err(anyhow::anyhow!("server error: {}", decode_error(&resp)));
    }
    Ok(())
}

fn decode_error(payload: &[u8]) -> String {
    ErrorPayload::decode(payload).map(|e| format!("[{}] {}", e.code, e.message)).unwrap_or_else(|_| "malformed error payload".into())
}
