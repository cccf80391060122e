//! End-to-end scenarios over a real listening `Server` and a real client
//! `Dispatcher` (spec.md §8, scenarios 1, 2, 3, 4, 6).

mod common;

use std::time::Duration;

use common::poll_until;
use common::RunningServer;
use pretty_assertions::assert_eq;

use wandersim::grid::World;
use wandersim::grid::WorldKind;
use wandersim::wire::types;
use wandersim::wire::CreateSimPayload;
use wandersim::wire::ErrorPayload;
use wandersim::wire::QueryStatusPayload;
use wandersim::wire::RequestSnapshotPayload;
use wandersim::wire::RestartSimPayload;
use wandersim::wire::SaveResultsPayload;
use wandersim::wire::StatusPayload;
use wandersim::wire::StopSimPayload;

const TIMEOUT_MS: u64 = 5_000;

fn le_u32_array(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect()
}

fn query_status(dispatcher: &wandersim::client::Dispatcher, pid: u32) -> StatusPayload {
    let req = QueryStatusPayload { pid };
    let (hdr, payload) = dispatcher
        .send_and_wait(types::QUERY_STATUS, &req.encode(), &[types::STATUS, types::ERROR], TIMEOUT_MS)
        .unwrap();
    assert_eq!(hdr.msg_type, types::STATUS, "unexpected error: {:?}", ErrorPayload::decode(&payload).ok());
    StatusPayload::decode(&payload).unwrap()
}

/// Scenario 1: small wrap world, deterministic probs, full run to FINISHED,
/// verified against the conservation invariant from spec.md §8.
#[test]
fn scenario_small_wrap_world_aggregate_matches_conservation_invariant() {
    let server = RunningServer::start();
    let dispatcher = server.connect(1002);

    let create = CreateSimPayload {
        world_kind: WorldKind::Wrap.wire(),
        width: 3,
        height: 3,
        probs: [0.25, 0.25, 0.25, 0.25],
        k: 16,
        total_reps: 10,
        multi_user: 0,
        obstacle_percent: 0,
        obstacle_seed: 0,
    };
    dispatcher.send_and_wait(types::CREATE_SIM, &create.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    dispatcher.send_and_wait(types::START_SIM, &[], &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();

    poll_until(|| query_status(&dispatcher, 1002).sim_state == wandersim::context::SimState::Finished.wire(), Duration::from_secs(5));

    let req = RequestSnapshotPayload { pid: 1002 };
    dispatcher.send_and_wait(types::REQUEST_SNAPSHOT, &req.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();

    let mut assembly = None;
    poll_until(
        || {
            assembly = dispatcher.snapshots().take_finished();
            assembly.is_some()
        },
        Duration::from_secs(2),
    );
    let assembly = assembly.expect("snapshot should have arrived");

    let trials = le_u32_array(assembly.trials.as_ref().unwrap());
    assert_eq!(trials.len(), 9);
    assert_eq!(trials.iter().sum::<u32>(), 10 * 9);
    assert_eq!(trials[0], 10, "origin starts at origin and succeeds immediately every rep");
}

/// Scenario 2: obstacle reachability after CREATE_SIM, verified by BFS on
/// the received obstacle bytes (mirrors `World::reachable_from_origin`'s
/// own guarantee, but driven entirely through the wire protocol here).
#[test]
fn scenario_obstacle_world_is_fully_reachable_after_create() {
    let server = RunningServer::start();
    let dispatcher = server.connect(2001);

    let create = CreateSimPayload {
        world_kind: WorldKind::Obstacles.wire(),
        width: 8,
        height: 8,
        probs: [0.25, 0.25, 0.25, 0.25],
        k: 16,
        total_reps: 1,
        multi_user: 0,
        obstacle_percent: 25,
        obstacle_seed: 12345,
    };
    let (hdr, _) = dispatcher.send_and_wait(types::CREATE_SIM, &create.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ACK);

    let req = RequestSnapshotPayload { pid: 2001 };
    dispatcher.send_and_wait(types::REQUEST_SNAPSHOT, &req.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();

    let mut assembly = None;
    poll_until(
        || {
            assembly = dispatcher.snapshots().take_finished();
            assembly.is_some()
        },
        Duration::from_secs(2),
    );
    let assembly = assembly.expect("snapshot should have arrived");
    let obstacle_bytes = assembly.obstacles.expect("obstacles field was requested");

    let mut world = World::init(WorldKind::Obstacles, 8, 8);
    world.obstacles_mut().copy_from_slice(&obstacle_bytes);
    let reachable = world.reachable_from_origin();
    for i in 0..world.cell_count() {
        assert!(
            world.is_obstacle_index(i) || reachable[i],
            "cell {i} is free but unreachable from origin after server-side repair"
        );
    }
}

/// Scenario 3: cooperative stop of a long-running batch.
#[test]
fn scenario_cooperative_stop_of_long_batch() {
    let server = RunningServer::start();
    let dispatcher = server.connect(3001);

    let create = CreateSimPayload {
        world_kind: WorldKind::Wrap.wire(),
        width: 2,
        height: 2,
        probs: [0.25, 0.25, 0.25, 0.25],
        k: 16,
        total_reps: 1_000_000,
        multi_user: 0,
        obstacle_percent: 0,
        obstacle_seed: 0,
    };
    dispatcher.send_and_wait(types::CREATE_SIM, &create.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    dispatcher.send_and_wait(types::START_SIM, &[], &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();

    std::thread::sleep(Duration::from_millis(100));

    let stop = StopSimPayload { pid: 3001 };
    let (hdr, _) = dispatcher.send_and_wait(types::STOP_SIM, &stop.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ACK);

    let finished = poll_until(|| query_status(&dispatcher, 3001).sim_state == wandersim::context::SimState::Finished.wire(), Duration::from_secs(10));
    assert!(finished, "stop did not bring the simulation to FINISHED in time");

    let status = query_status(&dispatcher, 3001);
    assert!(status.current_rep <= status.total_reps);
}

/// Scenario 4: ownership enforcement with two clients.
#[test]
fn scenario_owner_enforcement_with_two_clients() {
    let server = RunningServer::start();
    let owner = server.connect(4001);
    let other = server.connect(4002);

    let (hdr, payload) = other.send_and_wait(types::START_SIM, &[], &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ERROR);
    assert_eq!(ErrorPayload::decode(&payload).unwrap().code, 1);

    let (hdr, _) = owner.send_and_wait(types::START_SIM, &[], &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ACK);
}

/// Scenario 6: restart from loaded results, round-tripping through
/// SAVE_RESULTS/LOAD_RESULTS, observing the LOBBY/RUNNING/FINISHED sequence
/// via QUERY_STATUS.
#[test]
fn scenario_restart_from_loaded_results() {
    let server = RunningServer::start();
    let dispatcher = server.connect(5001);

    let create = CreateSimPayload {
        world_kind: WorldKind::Wrap.wire(),
        width: 3,
        height: 3,
        probs: [0.25, 0.25, 0.25, 0.25],
        k: 16,
        total_reps: 5,
        multi_user: 0,
        obstacle_percent: 0,
        obstacle_seed: 0,
    };
    dispatcher.send_and_wait(types::CREATE_SIM, &create.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    dispatcher.send_and_wait(types::START_SIM, &[], &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    poll_until(|| query_status(&dispatcher, 5001).sim_state == wandersim::context::SimState::Finished.wire(), Duration::from_secs(5));

    let tempdir = tempfile::tempdir().unwrap();
    let save_path = tempdir.path().join("first.wsim");
    let save = SaveResultsPayload { path: save_path.to_string_lossy().into_owned() };
    let (hdr, _) = dispatcher.send_and_wait(types::SAVE_RESULTS, &save.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ACK);

    let load = wandersim::wire::LoadResultsPayload { path: save_path.to_string_lossy().into_owned() };
    let (hdr, _) = dispatcher.send_and_wait(types::LOAD_RESULTS, &load.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ACK);
    assert_eq!(query_status(&dispatcher, 5001).sim_state, wandersim::context::SimState::Finished.wire());

    let restart = RestartSimPayload { total_reps: 50 };
    let (hdr, _) = dispatcher.send_and_wait(types::RESTART_SIM, &restart.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ACK);

    let finished = poll_until(
        || {
            let status = query_status(&dispatcher, 5001);
            status.sim_state == wandersim::context::SimState::Finished.wire() && status.total_reps == 50
        },
        Duration::from_secs(5),
    );
    assert!(finished, "restarted batch did not reach FINISHED in time");

    let save_path_2 = tempdir.path().join("second.wsim");
    let save2 = SaveResultsPayload { path: save_path_2.to_string_lossy().into_owned() };
    let (hdr, _) = dispatcher.send_and_wait(types::SAVE_RESULTS, &save2.encode(), &[types::ACK, types::ERROR], TIMEOUT_MS).unwrap();
    assert_eq!(hdr.msg_type, types::ACK);
}
