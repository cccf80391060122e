//! Scenario 5 (snapshot mid-run) and the dispatcher single-reader
//! serialization invariant from spec.md §8.

mod common;

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use common::poll_until;
use common::RunningServer;

use wandersim::wire::types;
use wandersim::wire::CreateSimPayload;
use wandersim::wire::QueryStatusPayload;
use wandersim::wire::RequestSnapshotPayload;
use wandersim::wire::StatusPayload;
use wandersim::wire::StopSimPayload;

const TIMEOUT_MS: u64 = 5_000;

/// Scenario 5: request a snapshot while a batch is running; per-field
/// offset coverage must be gapless and non-overlapping end to end.
#[test]
fn scenario_snapshot_mid_run_has_exact_offset_coverage() {
    let server = RunningServer::start();
    let dispatcher = server.connect(6001);

    let create = CreateSimPayload {
        world_kind: wandersim::grid::WorldKind::Wrap.wire(),
        width: 5,
        height: 5,
        probs: [0.25, 0.25, 0.25, 0.25],
        k: 16,
        total_reps: 2_000,
        multi_user: 0,
        obstacle_percent: 0,
        obstacle_seed: 0,
    };
    dispatcher.send_and_wait(types::CREATE_SIM, &create.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    dispatcher.send_and_wait(types::START_SIM, &[], &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();

    let req = RequestSnapshotPayload { pid: 6001 };
    let (hdr, _) = dispatcher.send_and_wait(types::REQUEST_SNAPSHOT, &req.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ACK);

    let mut assembly = None;
    let arrived = poll_until(
        || {
            assembly = dispatcher.snapshots().take_finished();
            assembly.is_some()
        },
        Duration::from_secs(5),
    );
    assert!(arrived, "snapshot never finished streaming");
    let assembly = assembly.unwrap();

    let cell_count = assembly.cell_count as usize;
    let obstacles = assembly.obstacles.unwrap();
    let trials = assembly.trials.unwrap();
    let sum_steps = assembly.sum_steps.unwrap();
    let succ = assembly.succ_leq_k.unwrap();

    assert_eq!(obstacles.len(), cell_count);
    assert_eq!(trials.len(), cell_count * 4);
    assert_eq!(sum_steps.len(), cell_count * 8);
    assert_eq!(succ.len(), cell_count * 4);

    let stop = StopSimPayload { pid: 6001 };
    let _ = dispatcher.send_and_wait(types::STOP_SIM, &stop.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS);
}

/// Running two concurrent `send_and_wait` calls on one dispatcher must
/// serialize them, each receiving the response paired with its own request
/// rather than a stray response off the wire.
#[test]
fn dispatcher_serializes_concurrent_callers() {
    let server = RunningServer::start();
    let dispatcher = server.connect(7001);

    let requests = 20;
    let mut handles = Vec::new();
    for i in 0..requests {
        let d = dispatcher.clone();
        handles.push(thread::spawn(move || {
            let req = QueryStatusPayload { pid: 7001 };
            let (hdr, payload) = d
                .send_and_wait(types::QUERY_STATUS, &req.encode(), &[types::STATUS, types::ERROR], TIMEOUT_MS)
                .unwrap_or_else(|e| panic!("request {i} failed: {e}"));
            assert_eq!(hdr.msg_type, types::STATUS);
            StatusPayload::decode(&payload).unwrap()
        }));
    }

    let mut seen_states: HashMap<u8, usize> = HashMap::new();
    for h in handles {
        let status = h.join().expect("worker thread panicked");
        *seen_states.entry(status.sim_state).or_default() += 1;
    }
    assert_eq!(seen_states.values().sum::<usize>(), requests);
}
