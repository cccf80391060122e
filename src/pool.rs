//! Worker pool (spec.md §4.4, C4).
//!
//! Bounded FIFO job queue served by N worker threads. One mutex guards the
//! queue, the in-flight counter, and the stop flag; two condition
//! variables signal "queue non-empty" and "in-flight reached zero" — the
//! same "critical state + monitor" shape as a classic producer/consumer
//! barrier (see DESIGN.md).

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use crate::aggregate::Aggregate;
use crate::grid::Pos;
use crate::grid::World;
use crate::rng::Rng;
use crate::trajectory;
use crate::trajectory::MoveProbs;

const MIN_CAPACITY: usize = 16;

/// One trajectory to run: which cell it counts toward, and where it starts.
#[derive(Debug, Clone, Copy)]
pub struct Job {
    pub cell_index: usize,
    pub start: Pos,
}

struct Critical {
    queue: VecDeque<Job>,
    capacity: usize,
    in_flight: usize,
    stop: bool,
}

struct Shared {
    critical: Mutex<Critical>,
    non_empty: Condvar,
    drained: Condvar,
    world: Arc<World>,
    aggregate: Arc<Aggregate>,
    probs: MoveProbs,
    k: u64,
}

/// A running pool of N worker threads. Dropping it stops and joins the
/// workers, matching the teacher's `destroy()`-on-drop convention.
pub struct Pool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Pool {
    pub fn new(
        n_workers: usize,
        capacity: usize,
        world: Arc<World>,
        aggregate: Arc<Aggregate>,
        probs: MoveProbs,
        k: u64,
    ) -> Self {
        let n_workers = n_workers.max(1);
        let capacity = capacity.max(MIN_CAPACITY);
        let shared = Arc::new(Shared {
            critical: Mutex::new(Critical {
                queue: VecDeque::with_capacity(capacity),
                capacity,
                in_flight: 0,
                stop: false,
            }),
            non_empty: Condvar::new(),
            drained: Condvar::new(),
            world,
            aggregate,
            probs,
            k,
        });
        let workers = (0..n_workers)
            .map(|id| {
                let shared = shared.clone();
                thread::Builder::new()
                    .name(format!("wandersim-worker-{id}"))
                    .spawn(move || worker_loop(shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self { shared, workers }
    }

    /// Enqueues a job. Fails only once a stop has been requested.
    /// Backpressure when full is cooperative: release the lock, yield, and
    /// retry — the simulation manager is the only submitter and is allowed
    /// to block here.
    pub fn submit(&self, job: Job) -> Result<(), ()> {
        loop {
            let mut c = self.shared.critical.lock().unwrap();
            if c.stop {
                return Err(());
            }
            if c.queue.len() >= c.capacity {
                drop(c);
                thread::yield_now();
                continue;
            }
            c.queue.push_back(job);
            c.in_flight += 1;
            self.shared.non_empty.notify_one();
            return Ok(());
        }
    }

    /// Blocks until every submitted job has completed.
    pub fn wait_all(&self) {
        let mut c = self.shared.critical.lock().unwrap();
        while c.in_flight != 0 {
            c = self.shared.drained.wait(c).unwrap();
        }
    }

    /// Sets the stop flag and wakes any parked workers so they can exit.
    pub fn stop(&self) {
        let mut c = self.shared.critical.lock().unwrap();
        c.stop = true;
        self.shared.non_empty.notify_all();
    }

    pub fn in_flight(&self) -> usize {
        self.shared.critical.lock().unwrap().in_flight
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.stop();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let mut rng = Rng::from_entropy();
    loop {
        let job = {
            let mut c = shared.critical.lock().unwrap();
            loop {
                if c.stop {
                    return;
                }
                if let Some(job) = c.queue.pop_front() {
                    break job;
                }
                c = shared.non_empty.wait(c).unwrap();
            }
        };
        let outcome = trajectory::run(&shared.world, job.start, &shared.probs, shared.k, &mut rng);
        shared.aggregate.update(
            job.cell_index,
            outcome.steps,
            outcome.reached_origin,
            outcome.success_leq_k,
        );
        let mut c = shared.critical.lock().unwrap();
        c.in_flight -= 1;
        if c.in_flight == 0 {
            shared.drained.notify_all();
        }
    }
}
