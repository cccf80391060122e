//! Accept loop, client registry, and broadcast (spec.md §4.8, C8).
//!
//! One thread accepts connections and spawns one tracked handler thread per
//! client (spec.md §9 flags detached per-client threads as unable to drain
//! cleanly on shutdown — handles are joined here instead). Broadcast writes
//! (PROGRESS, END, GLOBAL_MODE_CHANGED) and a connection's own replies share
//! one `Mutex<UnixStream>` per client so two threads can never interleave
//! writes on the same socket.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::net::Shutdown;
use std::os::unix::net::UnixListener;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::context::ClientHandle;
use crate::context::Config;
use crate::context::Context;
use crate::context::EndReason;
use crate::context::Mode;
use crate::context::Notifier;
use crate::error::ControlError;
use crate::server::handler;
use crate::snapshot::SnapshotStreamer;
use crate::wire;
use crate::wire::types;
use crate::wire::EndPayload;
use crate::wire::GlobalModeChangedPayload;
use crate::wire::ProgressPayload;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Server {
    pub(crate) ctx: Arc<Context>,
    pub(crate) broadcaster: Arc<Broadcaster>,
    pub(crate) streamer: SnapshotStreamer,
    pub(crate) workers: usize,
    pub(crate) queue_capacity: usize,
    next_handle: AtomicU64,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Server {
    pub fn new(config: Config) -> Result<Arc<Self>, ControlError> {
        let workers = config.workers;
        let queue_capacity = config.queue_capacity;
        let broadcaster = Arc::new(Broadcaster::new());
        let ctx = Context::new(config, broadcaster.clone())?;
        Ok(Arc::new(Self {
            ctx,
            broadcaster,
            streamer: SnapshotStreamer::new(),
            workers,
            queue_capacity,
            next_handle: AtomicU64::new(1),
            handles: Mutex::new(Vec::new()),
        }))
    }

    pub(crate) fn next_handle(&self) -> ClientHandle {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    /// Binds `socket_path` (unlinking a stale socket left by a prior run),
    /// then accepts connections until `stop` is observed. Every handler
    /// thread is tracked and joined before this returns, so a caller can
    /// rely on "no more client I/O" once `run` gives control back.
    pub fn run(self: &Arc<Self>, socket_path: &Path, stop: Arc<AtomicBool>) -> anyhow::Result<()> {
        if socket_path.exists() {
            fs::remove_file(socket_path)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;
        log::info!("listening on {}", socket_path.display());

        while !stop.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    let server = self.clone();
                    let jh = thread::Builder::new()
                        .name("wandersim-conn".into())
                        .spawn(move || handler::handle(&server, stream))
                        .expect("spawn connection handler thread");
                    self.handles.lock().unwrap().push(jh);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => log::warn!("accept failed: {e}"),
            }
        }

        let _ = fs::remove_file(socket_path);
        self.shutdown();
        Ok(())
    }

    fn shutdown(&self) {
        self.broadcaster.shutdown_all();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for jh in handles {
            let _ = jh.join();
        }
    }
}

/// The set of connected clients' write halves, shared between per-connection
/// handler threads (for ACK/ERROR/snapshot replies) and the simulation
/// manager's completion callbacks (for PROGRESS/END).
pub(crate) struct Broadcaster {
    writers: Mutex<HashMap<ClientHandle, Arc<Mutex<UnixStream>>>>,
}

impl Broadcaster {
    fn new() -> Self {
        Self { writers: Mutex::new(HashMap::new()) }
    }

    pub(crate) fn register(&self, handle: ClientHandle, writer: Arc<Mutex<UnixStream>>) {
        self.writers.lock().unwrap().insert(handle, writer);
    }

    pub(crate) fn unregister(&self, handle: ClientHandle) {
        self.writers.lock().unwrap().remove(&handle);
    }

    pub(crate) fn mode_changed(&self, mode: Mode, changed_by_pid: u32) {
        let payload = GlobalModeChangedPayload { mode: mode.wire(), changed_by_pid };
        self.broadcast(types::GLOBAL_MODE_CHANGED, &payload.encode());
    }

    /// Iterates the client set under its lock and sends each message with
    /// the non-blocking best-effort variant (spec.md §4.8): a slow or
    /// broken client is skipped, never stalling the others or the caller.
    /// `try_lock` on the per-connection writer matters as much as the
    /// non-blocking send: a client mid-snapshot holds its writer mutex for
    /// the whole (blocking) stream, and this runs on the simulation
    /// manager's callback path, so blocking here would stall replication.
    fn broadcast(&self, msg_type: u16, payload: &[u8]) {
        let writers = self.writers.lock().unwrap();
        for writer in writers.values() {
            let guard = match writer.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    log::debug!("best-effort broadcast skipped: writer busy");
                    continue;
                }
            };
            if let Err(e) = wire::send_best_effort(&guard, msg_type, payload) {
                log::debug!("best-effort broadcast send skipped: {e}");
            }
        }
    }

    fn shutdown_all(&self) {
        let writers = self.writers.lock().unwrap();
        for writer in writers.values() {
            let guard = writer.lock().unwrap();
            let _ = guard.shutdown(Shutdown::Both);
        }
    }
}

impl Notifier for Broadcaster {
    fn progress(&self, current_rep: u64, total_reps: u64) {
        let payload = ProgressPayload { current_rep, total_reps };
        self.broadcast(types::PROGRESS, &payload.encode());
    }

    fn end(&self, reason: EndReason) {
        let payload = EndPayload { reason: reason.wire() };
        self.broadcast(types::END, &payload.encode());
    }
}
