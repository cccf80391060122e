//! Server context & state machine (spec.md §4.6, C6).
//!
//! Two mutexes, never nested: `state` guards `(sim_state, current_rep, mode,
//! owner, config, world, aggregate)`; `clients` guards the connected-client
//! registry. Every public method takes the relevant lock internally and
//! releases it before doing anything that could block on a peer socket.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use crate::aggregate::Aggregate;
use crate::error::ControlError;
use crate::grid::Pos;
use crate::grid::World;
use crate::grid::WorldKind;
use crate::persistence;
use crate::simulation::Callbacks;
use crate::simulation::RunParams;
use crate::simulation::SimulationManager;
use crate::trajectory::MoveProbs;

/// Opaque per-connection identifier assigned by the server's accept loop.
/// Distinct from the PID a client self-reports in JOIN.
pub type ClientHandle = u64;

pub const CLIENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Lobby,
    Running,
    Finished,
}

impl SimState {
    pub fn wire(self) -> u8 {
        match self {
            SimState::Lobby => 1,
            SimState::Running => 2,
            SimState::Finished => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    Summary,
}

impl Mode {
    pub fn wire(self) -> u8 {
        match self {
            Mode::Interactive => 1,
            Mode::Summary => 2,
        }
    }

    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            1 => Some(Mode::Interactive),
            2 => Some(Mode::Summary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    DoneAll,
    Stopped,
}

impl EndReason {
    pub fn wire(self) -> u8 {
        match self {
            EndReason::DoneAll => 0,
            EndReason::Stopped => 1,
        }
    }
}

/// Reconfigurable simulation parameters. Mirrors CREATE_SIM's payload, with
/// `obstacle_percent`/`obstacle_seed` carried alongside it so OBSTACLES
/// worlds are reproducible (spec.md §8 scenario 2 exercises this).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub kind: WorldKind,
    pub width: u32,
    pub height: u32,
    pub probs: MoveProbs,
    pub k: u64,
    pub total_reps: u64,
    pub multi_user: bool,
    pub obstacle_percent: u32,
    pub obstacle_seed: u32,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Config {
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.width == 0 || self.height == 0 || self.k == 0 || self.total_reps == 0 {
            return Err(ControlError::InvalidParameters);
        }
        if !self.probs.is_valid() {
            return Err(ControlError::ProbabilitySum);
        }
        Ok(())
    }

    fn build_world(&self) -> World {
        let mut world = World::init(self.kind, self.width, self.height);
        if self.kind == WorldKind::Obstacles {
            world.generate_obstacles(self.obstacle_percent, self.obstacle_seed);
        }
        world
    }
}

/// A point-in-time readout of server state, used to build WELCOME and
/// STATUS payloads.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub sim_state: SimState,
    pub mode: Mode,
    pub current_rep: u64,
    pub kind: WorldKind,
    pub width: u32,
    pub height: u32,
    pub probs: MoveProbs,
    pub k: u64,
    pub total_reps: u64,
    pub multi_user: bool,
    pub owner_pid: Option<u32>,
    pub origin: Pos,
}

struct StateInner {
    sim_state: SimState,
    current_rep: u64,
    mode: Mode,
    owner: Option<ClientHandle>,
    config: Config,
    world: Arc<World>,
    aggregate: Arc<Aggregate>,
}

#[derive(Default)]
struct ClientRegistry {
    clients: HashMap<ClientHandle, u32>,
}

/// Callbacks the server side supplies so C6 can push notifications without
/// owning any socket itself.
pub trait Notifier: Send + Sync {
    fn progress(&self, current_rep: u64, total_reps: u64);
    fn end(&self, reason: EndReason);
}

pub struct Context {
    state: Mutex<StateInner>,
    clients: Mutex<ClientRegistry>,
    manager: SimulationManager,
    notifier: Arc<dyn Notifier>,
}

impl Context {
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Result<Arc<Self>, ControlError> {
        config.validate()?;
        let world = config.build_world();
        let aggregate = Aggregate::init(config.width, config.height);
        Ok(Arc::new(Self {
            state: Mutex::new(StateInner {
                sim_state: SimState::Lobby,
                current_rep: 0,
                mode: Mode::Interactive,
                owner: None,
                config,
                world: Arc::new(world),
                aggregate: Arc::new(aggregate),
            }),
            clients: Mutex::new(ClientRegistry::default()),
            manager: SimulationManager::new(),
            notifier,
        }))
    }

    fn can_control(owner: Option<ClientHandle>, handle: ClientHandle) -> bool {
        owner.is_none() || owner == Some(handle)
    }

    /// Registers a newly accepted connection. Returns `None` if the
    /// registry is already at `CLIENT_CAPACITY` (the caller should close
    /// the connection without a WELCOME). Returns `Some(is_owner)`
    /// otherwise; the first client to register becomes owner.
    pub fn register_client(&self, handle: ClientHandle, pid: u32) -> Option<bool> {
        {
            let mut clients = self.clients.lock().unwrap();
            if clients.clients.len() >= CLIENT_CAPACITY {
                return None;
            }
            clients.clients.insert(handle, pid);
        }
        let mut state = self.state.lock().unwrap();
        if state.owner.is_none() {
            state.owner = Some(handle);
            Some(true)
        } else {
            Some(false)
        }
    }

    /// Removes a disconnected client, clearing ownership if it held it.
    pub fn unregister_client(&self, handle: ClientHandle) {
        {
            let mut clients = self.clients.lock().unwrap();
            clients.clients.remove(&handle);
        }
        let mut state = self.state.lock().unwrap();
        if state.owner == Some(handle) {
            state.owner = None;
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().clients.len()
    }

    pub fn status(&self) -> Status {
        let state = self.state.lock().unwrap();
        let owner_pid = state.owner.and_then(|h| self.pid_of_locked(h));
        Status {
            sim_state: state.sim_state,
            mode: state.mode,
            current_rep: state.current_rep,
            kind: state.config.kind,
            width: state.config.width,
            height: state.config.height,
            probs: state.config.probs,
            k: state.config.k,
            total_reps: state.config.total_reps,
            multi_user: state.config.multi_user,
            owner_pid,
            origin: Pos::ORIGIN,
        }
    }

    fn pid_of_locked(&self, handle: ClientHandle) -> Option<u32> {
        self.clients.lock().unwrap().clients.get(&handle).copied()
    }

    /// The world and aggregate currently installed, for the snapshot
    /// streamer (C10) to read without touching the state mutex again.
    pub fn snapshot_handles(&self) -> (Arc<World>, Arc<Aggregate>) {
        let state = self.state.lock().unwrap();
        (state.world.clone(), state.aggregate.clone())
    }

    /// CREATE_SIM: reconfigures world/aggregate/config, returning to LOBBY.
    pub fn create_sim(&self, handle: ClientHandle, config: Config) -> Result<(), ControlError> {
        {
            let state = self.state.lock().unwrap();
            if !Self::can_control(state.owner, handle) {
                return Err(ControlError::PermissionDenied);
            }
            if state.sim_state == SimState::Running {
                return Err(ControlError::StateConflict);
            }
        }
        config.validate()?;
        let world = config.build_world();
        let aggregate = Aggregate::init(config.width, config.height);
        let mut state = self.state.lock().unwrap();
        if !Self::can_control(state.owner, handle) {
            return Err(ControlError::PermissionDenied);
        }
        if state.sim_state == SimState::Running {
            return Err(ControlError::StateConflict);
        }
        state.config = config;
        state.world = Arc::new(world);
        state.aggregate = Arc::new(aggregate);
        state.sim_state = SimState::Lobby;
        state.current_rep = 0;
        Ok(())
    }

    /// LOAD_WORLD: installs a new world, reinitializes the aggregate to
    /// match, drops to LOBBY. Config's `kind`/`width`/`height` follow the
    /// loaded world; other fields (probs, K, total_reps) are untouched.
    pub fn load_world(&self, handle: ClientHandle, path: &Path) -> Result<(), ControlError> {
        {
            let state = self.state.lock().unwrap();
            if !Self::can_control(state.owner, handle) {
                return Err(ControlError::PermissionDenied);
            }
            if state.sim_state == SimState::Running {
                return Err(ControlError::StateConflict);
            }
        }
        let loaded = persistence::load_world(path)?;
        let aggregate = Aggregate::init(loaded.width, loaded.height);
        let mut state = self.state.lock().unwrap();
        if !Self::can_control(state.owner, handle) {
            return Err(ControlError::PermissionDenied);
        }
        if state.sim_state == SimState::Running {
            return Err(ControlError::StateConflict);
        }
        state.config.kind = loaded.kind;
        state.config.width = loaded.width;
        state.config.height = loaded.height;
        state.world = Arc::new(loaded.world);
        state.aggregate = Arc::new(aggregate);
        state.sim_state = SimState::Lobby;
        state.current_rep = 0;
        Ok(())
    }

    /// START_SIM: begins a replication batch using the current config.
    /// `self` must be held behind an `Arc` because the manager's
    /// completion callbacks reach back into this context.
    pub fn start_sim(self: &Arc<Self>, handle: ClientHandle) -> Result<(), ControlError> {
        let (world, aggregate, params) = {
            let mut state = self.state.lock().unwrap();
            if !Self::can_control(state.owner, handle) {
                return Err(ControlError::PermissionDenied);
            }
            if state.sim_state == SimState::Running {
                return Err(ControlError::StateConflict);
            }
            state.sim_state = SimState::Running;
            state.current_rep = 0;
            let params = RunParams {
                probs: state.config.probs,
                k: state.config.k,
                total_reps: state.config.total_reps,
                workers: state.config.workers,
                queue_capacity: state.config.queue_capacity,
            };
            (state.world.clone(), state.aggregate.clone(), params)
        };
        let callbacks: Arc<dyn Callbacks> = Arc::new(ManagerCallbacks { ctx: self.clone() });
        self.manager.start(world, aggregate, params, callbacks);
        Ok(())
    }

    /// RESTART_SIM: only valid when not RUNNING; resets progress and reps,
    /// then behaves exactly like START_SIM.
    pub fn restart_sim(self: &Arc<Self>, handle: ClientHandle, new_reps: u64) -> Result<(), ControlError> {
        if new_reps == 0 {
            return Err(ControlError::InvalidParameters);
        }
        {
            let mut state = self.state.lock().unwrap();
            if !Self::can_control(state.owner, handle) {
                return Err(ControlError::PermissionDenied);
            }
            if state.sim_state == SimState::Running {
                return Err(ControlError::StateConflict);
            }
            state.config.total_reps = new_reps;
            state.current_rep = 0;
            state.sim_state = SimState::Lobby;
        }
        self.start_sim(handle)
    }

    /// STOP_SIM: cooperative; only meaningful while RUNNING.
    pub fn stop_sim(&self, handle: ClientHandle) -> Result<(), ControlError> {
        let state = self.state.lock().unwrap();
        if !Self::can_control(state.owner, handle) {
            return Err(ControlError::PermissionDenied);
        }
        if state.sim_state != SimState::Running {
            return Err(ControlError::StateConflict);
        }
        self.manager.request_stop();
        Ok(())
    }

    /// Any connected client may change the informational display mode;
    /// it never widens control capability (spec.md §9).
    pub fn set_mode(&self, mode: Mode) {
        self.state.lock().unwrap().mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().unwrap().mode
    }

    pub fn save_results(&self, handle: ClientHandle, path: &Path) -> Result<(), ControlError> {
        let state = self.state.lock().unwrap();
        if !Self::can_control(state.owner, handle) {
            return Err(ControlError::PermissionDenied);
        }
        if state.aggregate.is_empty() {
            return Err(ControlError::NothingToSave);
        }
        persistence::save_results(path, &state.config, &state.world, &state.aggregate)
    }

    /// LOAD_RESULTS: world, aggregate, and config are all replaced from
    /// the file; state becomes FINISHED.
    pub fn load_results(&self, handle: ClientHandle, path: &Path) -> Result<(), ControlError> {
        {
            let state = self.state.lock().unwrap();
            if !Self::can_control(state.owner, handle) {
                return Err(ControlError::PermissionDenied);
            }
        }
        let loaded = persistence::load_results(path)?;
        let mut state = self.state.lock().unwrap();
        if !Self::can_control(state.owner, handle) {
            return Err(ControlError::PermissionDenied);
        }
        state.config.kind = loaded.kind;
        state.config.width = loaded.width;
        state.config.height = loaded.height;
        state.config.probs = loaded.probs;
        state.config.k = loaded.k;
        state.config.total_reps = loaded.total_reps;
        state.world = Arc::new(loaded.world);
        state.aggregate = Arc::new(loaded.aggregate);
        state.sim_state = SimState::Finished;
        state.current_rep = loaded.total_reps;
        Ok(())
    }
}

struct ManagerCallbacks {
    ctx: Arc<Context>,
}

impl Callbacks for ManagerCallbacks {
    fn on_progress(&self, current_rep: u64, total_reps: u64) {
        {
            let mut state = self.ctx.state.lock().unwrap();
            state.current_rep = current_rep;
        }
        self.ctx.notifier.progress(current_rep, total_reps);
    }

    fn on_end(&self, stopped: bool) {
        {
            let mut state = self.ctx.state.lock().unwrap();
            state.sim_state = SimState::Finished;
        }
        let reason = if stopped { EndReason::Stopped } else { EndReason::DoneAll };
        self.ctx.notifier.end(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingNotifier {
        progress_calls: StdMutex<Vec<(u64, u64)>>,
        end_calls: StdMutex<Vec<EndReason>>,
    }

    impl Notifier for RecordingNotifier {
        fn progress(&self, current_rep: u64, total_reps: u64) {
            self.progress_calls.lock().unwrap().push((current_rep, total_reps));
        }
        fn end(&self, reason: EndReason) {
            self.end_calls.lock().unwrap().push(reason);
        }
    }

    fn uniform() -> MoveProbs {
        MoveProbs {
            up: 0.25,
            down: 0.25,
            left: 0.25,
            right: 0.25,
        }
    }

    fn test_config() -> Config {
        Config {
            kind: WorldKind::Wrap,
            width: 3,
            height: 3,
            probs: uniform(),
            k: 16,
            total_reps: 5,
            multi_user: false,
            obstacle_percent: 0,
            obstacle_seed: 0,
            workers: 2,
            queue_capacity: 16,
        }
    }

    #[test]
    fn first_client_becomes_owner() {
        let ctx = Context::new(test_config(), Arc::new(RecordingNotifier::default())).unwrap();
        assert_eq!(ctx.register_client(1, 111), Some(true));
        assert_eq!(ctx.register_client(2, 222), Some(false));
    }

    #[test]
    fn non_owner_start_is_rejected() {
        let ctx = Context::new(test_config(), Arc::new(RecordingNotifier::default())).unwrap();
        ctx.register_client(1, 111);
        ctx.register_client(2, 222);
        assert_eq!(ctx.start_sim(2), Err(ControlError::PermissionDenied));
    }

    #[test]
    fn owner_clears_on_disconnect_and_passes_to_next() {
        let ctx = Context::new(test_config(), Arc::new(RecordingNotifier::default())).unwrap();
        ctx.register_client(1, 111);
        ctx.unregister_client(1);
        assert_eq!(ctx.register_client(2, 222), Some(true));
    }

    #[test]
    fn start_sim_runs_to_finished_and_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = Context::new(test_config(), notifier.clone()).unwrap();
        ctx.register_client(1, 111);
        ctx.start_sim(1).unwrap();
        ctx.manager.join();
        assert_eq!(ctx.status().sim_state, SimState::Finished);
        assert_eq!(notifier.end_calls.lock().unwrap().len(), 1);
        assert_eq!(notifier.end_calls.lock().unwrap()[0], EndReason::DoneAll);
        assert_eq!(notifier.progress_calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn create_sim_while_running_is_state_conflict() {
        let mut config = test_config();
        config.total_reps = 1_000_000;
        let ctx = Context::new(config, Arc::new(RecordingNotifier::default())).unwrap();
        ctx.register_client(1, 111);
        ctx.start_sim(1).unwrap();
        let result = ctx.create_sim(1, test_config());
        assert_eq!(result, Err(ControlError::StateConflict));
        ctx.stop_sim(1).unwrap();
        ctx.manager.join();
    }
}
