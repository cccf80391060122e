//! Simulation manager (spec.md §4.5, C5).
//!
//! Owns the background thread that drives one replication batch: fan out
//! one job per non-blocked cell, wait for the pool to drain, advance
//! progress, and repeat. Knows nothing about the server's state machine or
//! client registry (that's C6/C8) — it only runs jobs and calls back.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use crate::aggregate::Aggregate;
use crate::grid::Pos;
use crate::grid::World;
use crate::pool::Job;
use crate::pool::Pool;
use crate::trajectory::MoveProbs;

/// The parameters a replication batch runs with. Copied out of `Context`'s
/// config at `start`/`restart` time so the manager doesn't need to reach
/// back into C6's state.
#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    pub probs: MoveProbs,
    pub k: u64,
    pub total_reps: u64,
    pub workers: usize,
    pub queue_capacity: usize,
}

/// Callbacks invoked from the manager's background thread. Implementations
/// must not block for long — in particular, the server wiring (C8) must
/// drop its own state mutex before calling into the notifier underneath
/// these, per spec.md §5's "no handler thread holds the state mutex while
/// performing socket I/O on a peer".
pub trait Callbacks: Send + Sync {
    fn on_progress(&self, current_rep: u64, total_reps: u64);
    fn on_end(&self, stopped: bool);
}

/// Owns the background replication thread. One `SimulationManager` per
/// server context; `start` spawns the thread, `request_stop` is safe from
/// any thread at any time.
pub struct SimulationManager {
    stop_requested: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Default for SimulationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationManager {
    pub fn new() -> Self {
        Self {
            stop_requested: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Cooperative, flag-based cancellation: safe to call from any thread.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Spawns the background thread that runs `params.total_reps`
    /// replications over `world`, updating `aggregate` and invoking
    /// `callbacks` on progress and completion.
    pub fn start(
        &self,
        world: Arc<World>,
        aggregate: Arc<Aggregate>,
        params: RunParams,
        callbacks: Arc<dyn Callbacks>,
    ) {
        self.stop_requested.store(false, Ordering::SeqCst);
        aggregate.clear();
        let stop_requested = self.stop_requested.clone();
        let handle = thread::Builder::new()
            .name("wandersim-simulation".to_string())
            .spawn(move || replicate(world, aggregate, params, callbacks, stop_requested))
            .expect("failed to spawn simulation manager thread");
        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Blocks until the background thread (if any) has finished. Safe to
    /// call even if no batch is running.
    pub fn join(&self) {
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn replicate(
    world: Arc<World>,
    aggregate: Arc<Aggregate>,
    params: RunParams,
    callbacks: Arc<dyn Callbacks>,
    stop_requested: Arc<AtomicBool>,
) {
    let pool = Pool::new(
        params.workers,
        params.queue_capacity,
        world.clone(),
        aggregate.clone(),
        params.probs,
        params.k,
    );

    let mut stopped = false;
    'reps: for rep in 1..=params.total_reps {
        if stop_requested.load(Ordering::SeqCst) {
            stopped = true;
            break;
        }
        for y in 0..world.height() {
            for x in 0..world.width() {
                if stop_requested.load(Ordering::SeqCst) {
                    stopped = true;
                    break 'reps;
                }
                let idx = world.index(x, y);
                if world.is_obstacle_index(idx) {
                    continue;
                }
                // submit only fails after a stop request, at which point
                // we're tearing down anyway.
                let _ = pool.submit(Job {
                    cell_index: idx,
                    start: Pos::new(x as i64, y as i64),
                });
            }
        }
        pool.wait_all();
        callbacks.on_progress(rep, params.total_reps);
    }
    // covers the early-break case: any jobs submitted before the stop was
    // observed still must complete (in-flight jobs always finish).
    pool.wait_all();
    drop(pool);
    callbacks.on_end(stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::WorldKind;
    use std::sync::atomic::AtomicU64;

    struct Recorder {
        last_rep: AtomicU64,
        ended: Mutex<Option<bool>>,
    }

    impl Callbacks for Recorder {
        fn on_progress(&self, current_rep: u64, _total_reps: u64) {
            self.last_rep.store(current_rep, Ordering::SeqCst);
        }
        fn on_end(&self, stopped: bool) {
            *self.ended.lock().unwrap() = Some(stopped);
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

    #[test]
    fn completes_all_reps_and_conserves_trials() {
        let world = Arc::new(World::init(WorldKind::Wrap, 3, 3));
        let aggregate = Arc::new(Aggregate::init(3, 3));
        let manager = SimulationManager::new();
        let recorder = Arc::new(Recorder {
            last_rep: AtomicU64::new(0),
            ended: Mutex::new(None),
        });
        let params = RunParams {
            probs: uniform(),
            k: 16,
            total_reps: 10,
            workers: 2,
            queue_capacity: 16,
        };
        manager.start(world.clone(), aggregate.clone(), params, recorder.clone());
        manager.join();

        assert_eq!(recorder.last_rep.load(Ordering::SeqCst), 10);
        assert_eq!(*recorder.ended.lock().unwrap(), Some(false));
        let total: u64 = aggregate.trials().iter().map(|&v| v as u64).sum();
        assert_eq!(total, 10 * world.cell_count() as u64);
        assert_eq!(aggregate.trials_at(0), 10);
    }

    #[test]
    fn stop_request_terminates_early() {
        let world = Arc::new(World::init(WorldKind::Wrap, 6, 6));
        let aggregate = Arc::new(Aggregate::init(6, 6));
        let manager = Arc::new(SimulationManager::new());
        let recorder = Arc::new(Recorder {
            last_rep: AtomicU64::new(0),
            ended: Mutex::new(None),
        });
        let params = RunParams {
            probs: uniform(),
            k: 50,
            total_reps: 1_000_000,
            workers: 4,
            queue_capacity: 16,
        };
        manager.start(world.clone(), aggregate.clone(), params, recorder.clone());
        thread::sleep(std::time::Duration::from_millis(50));
        manager.request_stop();
        manager.join();

        assert_eq!(*recorder.ended.lock().unwrap(), Some(true));
        let last_rep = recorder.last_rep.load(Ordering::SeqCst);
        assert!(last_rep <= params.total_reps);
        // aggregate must still satisfy successes <= trials for every cell
        let trials = aggregate.trials();
        let successes = aggregate.successes();
        for idx in 0..trials.len() {
            assert!(successes[idx] <= trials[idx]);
        }
    }
}
