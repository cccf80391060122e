//! Shared scaffolding for the end-to-end tests: spins up a real `Server`
//! over a `tempfile`-backed Unix socket path and a real client `Dispatcher`
//! against it, exercising the actual wire protocol rather than calling
//! `Context` methods directly.

use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use wandersim::client::Dispatcher;
use wandersim::client::NoopSink;
use wandersim::context::Config;
use wandersim::grid::WorldKind;
use wandersim::server::Server;
use wandersim::trajectory::MoveProbs;

pub fn uniform_probs() -> MoveProbs {
    MoveProbs { up: 0.25, down: 0.25, left: 0.25, right: 0.25 }
}

pub fn bootstrap_config() -> Config {
    Config {
        kind: WorldKind::Wrap,
        width: 1,
        height: 1,
        probs: uniform_probs(),
        k: 1,
        total_reps: 1,
        multi_user: false,
        obstacle_percent: 0,
        obstacle_seed: 0,
        workers: 2,
        queue_capacity: 64,
    }
}

pub struct RunningServer {
    pub socket_path: PathBuf,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    _tempdir: tempfile::TempDir,
}

impl RunningServer {
    pub fn start() -> Self {
        Self::start_with(bootstrap_config())
    }

    pub fn start_with(config: Config) -> Self {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let socket_path = tempdir.path().join("wandersim.sock");
        let server = Server::new(config).expect("server config should be valid");
        let stop = Arc::new(AtomicBool::new(false));

        let run_path = socket_path.clone();
        let run_stop = stop.clone();
        let handle = thread::spawn(move || {
            server.run(&run_path, run_stop).expect("server run loop");
        });

        wait_for_socket(&socket_path);

        Self { socket_path, stop, handle: Some(handle), _tempdir: tempdir }
    }

    pub fn connect(&self, pid: u32) -> Arc<Dispatcher> {
        let (dispatcher, _welcome) = Dispatcher::connect(&self.socket_path, pid, Arc::new(NoopSink)).expect("client connect");
        dispatcher
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn wait_for_socket(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if std::os::unix::net::UnixStream::connect(path).is_ok() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("server did not start listening on {}", path.display());
}

pub fn poll_until<F: FnMut() -> bool>(mut predicate: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
