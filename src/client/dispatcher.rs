//! Single-reader client dispatcher (spec.md §4.9, C9).
//!
//! The socket is a strictly serialized byte stream; correctness requires
//! exactly one reader. This dispatcher owns that reader thread and offers a
//! synchronous `send_and_wait` primitive over it; the foreground (menu)
//! thread never touches the read half directly.

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::client::snapshot_assembler::SnapshotAssembler;
use crate::wire;
use crate::wire::types;
use crate::wire::Header;
use crate::wire::JoinPayload;
use crate::wire::SnapshotBeginPayload;
use crate::wire::SnapshotChunkPayload;
use crate::wire::WelcomePayload;

/// Notifications the dispatcher consumes silently from the wire (spec.md
/// §4.9: "these must never interleave with the interactive prompt") but
/// still surfaces to an observer for the client UI, fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Progress { current_rep: u64, total_reps: u64 },
    End { reason: u8 },
    ModeChanged { mode: u8, changed_by_pid: u32 },
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: Notification);
}

/// Default sink for callers with no UI to drive.
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: Notification) {}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("timed out waiting for response")]
    Timeout,
    #[error("connection closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Default)]
struct Inner {
    waiting: bool,
    expected: Vec<u16>,
    response: Option<(Header, Vec<u8>)>,
    stopped: bool,
}

pub struct Dispatcher {
    write_stream: Mutex<UnixStream>,
    state: Mutex<Inner>,
    condvar: Condvar,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    assembler: Arc<SnapshotAssembler>,
}

impl Dispatcher {
    /// Connects, performs the JOIN/WELCOME handshake synchronously (no
    /// reader thread exists yet, so there is only one reader at this
    /// point), then spawns the dedicated reader thread.
    pub fn connect(socket_path: &Path, pid: u32, sink: Arc<dyn NotificationSink>) -> Result<(Arc<Self>, WelcomePayload), DispatchError> {
        let write_stream = UnixStream::connect(socket_path).map_err(|e| DispatchError::Io(e.to_string()))?;
        let read_stream = write_stream.try_clone().map_err(|e| DispatchError::Io(e.to_string()))?;

        let join = JoinPayload { pid };
        wire::send(&write_stream, types::JOIN, &join.encode()).map_err(|e| DispatchError::Io(e.to_string()))?;
        let hdr = wire::recv_hdr(&write_stream).map_err(|e| DispatchError::Io(e.to_string()))?;
        if hdr.msg_type != types::WELCOME {
            return Err(DispatchError::Io(format!("expected WELCOME, got type {}", hdr.msg_type)));
        }
        let payload = wire::recv_payload(&write_stream, hdr.payload_len as usize).map_err(|e| DispatchError::Io(e.to_string()))?;
        let welcome = WelcomePayload::decode(&payload).map_err(|e| DispatchError::Io(e.to_string()))?;

        let assembler = Arc::new(SnapshotAssembler::new());
        let dispatcher = Arc::new(Self {
            write_stream: Mutex::new(write_stream),
            state: Mutex::new(Inner::default()),
            condvar: Condvar::new(),
            reader_handle: Mutex::new(None),
            assembler: assembler.clone(),
        });

        let reader_dispatcher = dispatcher.clone();
        let jh = thread::Builder::new()
            .name("wandersim-dispatcher".into())
            .spawn(move || reader_dispatcher.reader_loop(read_stream, assembler, sink))
            .map_err(|e| DispatchError::Io(e.to_string()))?;
        *dispatcher.reader_handle.lock().unwrap() = Some(jh);

        Ok((dispatcher, welcome))
    }

    pub fn snapshots(&self) -> &SnapshotAssembler {
        &self.assembler
    }

    fn reader_loop(&self, read_stream: UnixStream, assembler: Arc<SnapshotAssembler>, sink: Arc<dyn NotificationSink>) {
        loop {
            let hdr = match wire::recv_hdr(&read_stream) {
                Ok(h) => h,
                Err(_) => return self.mark_stopped(),
            };
            let payload = match wire::recv_payload(&read_stream, hdr.payload_len as usize) {
                Ok(p) => p,
                Err(_) => return self.mark_stopped(),
            };

            match hdr.msg_type {
                types::PROGRESS => {
                    if let Ok(p) = crate::wire::ProgressPayload::decode(&payload) {
                        sink.notify(Notification::Progress {
                            current_rep: p.current_rep,
                            total_reps: p.total_reps,
                        });
                    }
                }
                types::END => {
                    if let Ok(p) = crate::wire::EndPayload::decode(&payload) {
                        sink.notify(Notification::End { reason: p.reason });
                    }
                }
                types::GLOBAL_MODE_CHANGED => {
                    if let Ok(p) = crate::wire::GlobalModeChangedPayload::decode(&payload) {
                        sink.notify(Notification::ModeChanged {
                            mode: p.mode,
                            changed_by_pid: p.changed_by_pid,
                        });
                    }
                }
                types::SNAPSHOT_BEGIN => {
                    if let Ok(b) = SnapshotBeginPayload::decode(&payload) {
                        assembler.begin(b);
                    }
                }
                types::SNAPSHOT_CHUNK => {
                    if let Ok(c) = SnapshotChunkPayload::decode(&payload) {
                        assembler.chunk(c);
                    }
                }
                types::SNAPSHOT_END => assembler.finish(),
                ty => self.latch_if_expected(ty, hdr, payload),
            }
        }
    }

    fn latch_if_expected(&self, ty: u16, hdr: Header, payload: Vec<u8>) {
        let mut inner = self.state.lock().unwrap();
        if inner.response.is_none() && inner.expected.contains(&ty) {
            inner.response = Some((hdr, payload));
            self.condvar.notify_all();
        }
    }

    fn mark_stopped(&self) {
        let mut inner = self.state.lock().unwrap();
        inner.stopped = true;
        self.condvar.notify_all();
    }

    /// Sends a request and blocks for a terminal response whose type is in
    /// `expected` (conventionally `{ACK, ERROR}` or `{STATUS, ERROR}`; the
    /// server never sends the same type for two overlapping requests on one
    /// connection, so type-only matching is sufficient). `timeout_ms == 0`
    /// waits indefinitely.
    pub fn send_and_wait(&self, msg_type: u16, payload: &[u8], expected: &[u16], timeout_ms: u64) -> Result<(Header, Vec<u8>), DispatchError> {
        debug_assert!(expected.len() <= 3, "expected[] is capped at 3 response types");

        let mut inner = self.state.lock().unwrap();
        inner = self.condvar.wait_while(inner, |i| i.waiting && !i.stopped).unwrap();
        if inner.stopped {
            return Err(DispatchError::Closed);
        }
        inner.waiting = true;
        inner.expected = expected.to_vec();
        inner.response = None;
        drop(inner);

        // send under the write lock only, never the state lock — the
        // reader thread holds no lock while blocked in `read`, so ordering
        // is preserved without risking a stalled writer under state.
        if let Err(e) = wire::send(&self.write_stream.lock().unwrap(), msg_type, payload) {
            let mut inner = self.state.lock().unwrap();
            inner.waiting = false;
            inner.expected.clear();
            self.condvar.notify_all();
            return Err(DispatchError::Io(e.to_string()));
        }

        let inner = self.state.lock().unwrap();
        let (mut inner, outcome) = if timeout_ms == 0 {
            let inner = self.condvar.wait_while(inner, |i| i.response.is_none() && !i.stopped).unwrap();
            let outcome = inner_outcome(&inner);
            (inner, outcome)
        } else {
            let (inner, timeout_result) = self
                .condvar
                .wait_timeout_while(inner, Duration::from_millis(timeout_ms), |i| i.response.is_none() && !i.stopped)
                .unwrap();
            let outcome = if timeout_result.timed_out() && inner.response.is_none() {
                Err(DispatchError::Timeout)
            } else {
                inner_outcome(&inner)
            };
            (inner, outcome)
        };

        inner.waiting = false;
        inner.expected.clear();
        let taken = inner.response.take();
        self.condvar.notify_all();
        drop(inner);

        match outcome {
            Ok(_) => Ok(taken.expect("outcome Ok implies a response was latched")),
            Err(e) => Err(e),
        }
    }

    /// Blocks until the reader thread exits (normally after the peer closes
    /// following QUIT). No-op if already joined.
    pub fn join_reader(&self) {
        if let Some(jh) = self.reader_handle.lock().unwrap().take() {
            let _ = jh.join();
        }
    }
}

fn inner_outcome(inner: &Inner) -> Result<(), DispatchError> {
    if inner.response.is_some() {
        Ok(())
    } else {
        Err(DispatchError::Closed)
    }
}
