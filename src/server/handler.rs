//! Per-connection request dispatch (spec.md §4.8, C8).
//!
//! One thread per client: a JOIN handshake followed by a blocking
//! request/reply loop. Unknown or mis-sized messages are drained (the
//! header's declared length is always consumed) and the connection
//! continues; only QUIT or a framing/I/O failure ends the loop.

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use crate::context::ClientHandle;
use crate::context::Config;
use crate::context::Mode;
use crate::context::Status;
use crate::error::ControlError;
use crate::grid::WorldKind;
use crate::server::listener::Server;
use crate::trajectory::MoveProbs;
use crate::wire;
use crate::wire::types;
use crate::wire::AckPayload;
use crate::wire::CreateSimPayload;
use crate::wire::ErrorPayload;
use crate::wire::JoinPayload;
use crate::wire::LoadResultsPayload;
use crate::wire::LoadWorldPayload;
use crate::wire::QueryStatusPayload;
use crate::wire::QuitPayload;
use crate::wire::RequestSnapshotPayload;
use crate::wire::RestartSimPayload;
use crate::wire::SaveResultsPayload;
use crate::wire::SetGlobalModePayload;
use crate::wire::StartSimPayload;
use crate::wire::StatusPayload;
use crate::wire::StopSimPayload;
use crate::wire::WelcomePayload;

type Writer = Arc<Mutex<UnixStream>>;

pub(crate) fn handle(server: &Arc<Server>, read_stream: UnixStream) {
    let write_stream = match read_stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("failed to clone connection for writing: {e}");
            return;
        }
    };
    let writer: Writer = Arc::new(Mutex::new(write_stream));
    let handle = server.next_handle();

    let Some(pid) = handshake(server, &read_stream, &writer, handle) else {
        return;
    };
    log::debug!("client {handle} (pid {pid}) joined");

    loop {
        let hdr = match wire::recv_hdr(&read_stream) {
            Ok(h) => h,
            Err(_) => break,
        };
        let payload = match wire::recv_payload(&read_stream, hdr.payload_len as usize) {
            Ok(p) => p,
            Err(_) => break,
        };
        if !dispatch(server, handle, pid, hdr.msg_type, &payload, &writer) {
            break;
        }
    }

    server.ctx.unregister_client(handle);
    server.broadcaster.unregister(handle);
    log::debug!("client {handle} (pid {pid}) disconnected");
}

/// Reads and validates the JOIN handshake, registers the client, and sends
/// WELCOME. Returns the client's self-reported pid on success; on any
/// failure the connection is left for the caller to drop.
fn handshake(server: &Arc<Server>, read_stream: &UnixStream, writer: &Writer, handle: ClientHandle) -> Option<u32> {
    let hdr = wire::recv_hdr(read_stream).ok()?;
    if hdr.msg_type != types::JOIN {
        log::warn!("client {handle} did not JOIN first (type {})", hdr.msg_type);
        return None;
    }
    let payload = wire::recv_payload(read_stream, hdr.payload_len as usize).ok()?;
    let join = JoinPayload::decode(&payload).ok()?;

    if server.ctx.register_client(handle, join.pid).is_none() {
        log::warn!("client registry full, rejecting pid {}", join.pid);
        return None;
    }
    server.broadcaster.register(handle, writer.clone());

    let welcome = welcome_payload(&server.ctx.status());
    let guard = writer.lock().unwrap();
    if wire::send(&guard, types::WELCOME, &welcome.encode()).is_err() {
        drop(guard);
        server.ctx.unregister_client(handle);
        server.broadcaster.unregister(handle);
        return None;
    }
    Some(join.pid)
}

/// Handles one request. Returns `false` only for QUIT, which ends the
/// connection loop.
fn dispatch(server: &Arc<Server>, handle: ClientHandle, pid: u32, msg_type: u16, payload: &[u8], writer: &Writer) -> bool {
    match msg_type {
        types::SET_GLOBAL_MODE => {
            if let Ok(p) = SetGlobalModePayload::decode(payload) {
                match Mode::from_wire(p.mode) {
                    Some(mode) => {
                        server.ctx.set_mode(mode);
                        server.broadcaster.mode_changed(mode, pid);
                        reply_ack(writer, msg_type);
                    }
                    None => reply_error(writer, ControlError::InvalidParameters),
                }
            }
            true
        }
        types::STOP_SIM => {
            if StopSimPayload::decode(payload).is_ok() {
                reply_result(writer, msg_type, server.ctx.stop_sim(handle));
            }
            true
        }
        types::QUERY_STATUS => {
            if QueryStatusPayload::decode(payload).is_ok() {
                let sp = status_payload(&server.ctx.status());
                let guard = writer.lock().unwrap();
                let _ = wire::send(&guard, types::STATUS, &sp.encode());
            }
            true
        }
        types::CREATE_SIM => {
            if let Ok(p) = CreateSimPayload::decode(payload) {
                match to_config(server, &p) {
                    Ok(config) => reply_result(writer, msg_type, server.ctx.create_sim(handle, config)),
                    Err(e) => reply_error(writer, e),
                }
            }
            true
        }
        types::LOAD_WORLD => {
            if let Ok(p) = LoadWorldPayload::decode(payload) {
                reply_result(writer, msg_type, server.ctx.load_world(handle, Path::new(&p.path)));
            }
            true
        }
        types::START_SIM => {
            if StartSimPayload::decode(payload).is_ok() {
                reply_result(writer, msg_type, server.ctx.start_sim(handle));
            }
            true
        }
        types::RESTART_SIM => {
            if let Ok(p) = RestartSimPayload::decode(payload) {
                reply_result(writer, msg_type, server.ctx.restart_sim(handle, p.total_reps));
            }
            true
        }
        types::REQUEST_SNAPSHOT => {
            if RequestSnapshotPayload::decode(payload).is_ok() {
                reply_ack(writer, msg_type);
                let (world, aggregate) = server.ctx.snapshot_handles();
                let guard = writer.lock().unwrap();
                if let Err(e) = server.streamer.stream_to(&guard, &world, &aggregate) {
                    log::warn!("snapshot stream to client {handle} failed: {e}");
                }
            }
            true
        }
        types::SAVE_RESULTS => {
            if let Ok(p) = SaveResultsPayload::decode(payload) {
                reply_result(writer, msg_type, server.ctx.save_results(handle, Path::new(&p.path)));
            }
            true
        }
        types::LOAD_RESULTS => {
            if let Ok(p) = LoadResultsPayload::decode(payload) {
                reply_result(writer, msg_type, server.ctx.load_results(handle, Path::new(&p.path)));
            }
            true
        }
        types::QUIT => {
            if let Ok(p) = QuitPayload::decode(payload) {
                if p.stop_if_owner != 0 {
                    let _ = server.ctx.stop_sim(handle);
                }
                reply_ack(writer, msg_type);
            }
            false
        }
        _ => true,
    }
}

fn to_config(server: &Server, p: &CreateSimPayload) -> Result<Config, ControlError> {
    let kind = WorldKind::from_wire(p.world_kind).ok_or(ControlError::InvalidParameters)?;
    Ok(Config {
        kind,
        width: p.width,
        height: p.height,
        probs: array_to_probs(p.probs),
        k: p.k,
        total_reps: p.total_reps,
        multi_user: p.multi_user != 0,
        obstacle_percent: p.obstacle_percent,
        obstacle_seed: p.obstacle_seed,
        workers: server.workers,
        queue_capacity: server.queue_capacity,
    })
}

fn array_to_probs(a: [f64; 4]) -> MoveProbs {
    MoveProbs { up: a[0], down: a[1], left: a[2], right: a[3] }
}

fn probs_to_array(p: MoveProbs) -> [f64; 4] {
    [p.up, p.down, p.left, p.right]
}

fn welcome_payload(status: &Status) -> WelcomePayload {
    WelcomePayload {
        world_kind: status.kind.wire(),
        width: status.width,
        height: status.height,
        probs: probs_to_array(status.probs),
        k: status.k,
        total_reps: status.total_reps,
        current_rep: status.current_rep,
        mode: status.mode.wire(),
        origin_x: status.origin.x,
        origin_y: status.origin.y,
    }
}

fn status_payload(status: &Status) -> StatusPayload {
    StatusPayload {
        sim_state: status.sim_state.wire(),
        mode: status.mode.wire(),
        current_rep: status.current_rep,
        world_kind: status.kind.wire(),
        width: status.width,
        height: status.height,
        probs: probs_to_array(status.probs),
        k: status.k,
        total_reps: status.total_reps,
        multi_user: status.multi_user as u8,
        has_owner: status.owner_pid.is_some() as u8,
        owner_pid: status.owner_pid.unwrap_or(0),
    }
}

fn reply_ack(writer: &Writer, request_type: u16) {
    let payload = AckPayload { request_type, status: 0 };
    let guard = writer.lock().unwrap();
    let _ = wire::send(&guard, types::ACK, &payload.encode());
}

fn reply_error(writer: &Writer, err: ControlError) {
    let payload = ErrorPayload { code: err.code(), message: err.to_string() };
    let guard = writer.lock().unwrap();
    let _ = wire::send(&guard, types::ERROR, &payload.encode());
}

fn reply_result(writer: &Writer, request_type: u16, result: Result<(), ControlError>) {
    match result {
        Ok(()) => reply_ack(writer, request_type),
        Err(e) => reply_error(writer, e),
    }
}
