//! Snapshot streamer, server side (spec.md §4.10, C10).
//!
//! Field-at-a-time chunked emission of `(world, aggregate)` to one client.
//! No atomicity across fields or even within a field's read — a concurrent
//! simulation may update the aggregate mid-stream; this is an accepted
//! trade-off (snapshots are a visualization aid, not a consistency-critical
//! replica).

use std::os::unix::net::UnixStream;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::aggregate::Aggregate;
use crate::aggregate::Field;
use crate::error::ProtocolError;
use crate::grid::World;
use crate::wire;
use crate::wire::snapshot_field_bits;
use crate::wire::types;
use crate::wire::SnapshotBeginPayload;
use crate::wire::SnapshotChunkPayload;

pub const MAX_CHUNK_PAYLOAD: usize = 4096;

/// Issues monotonically increasing snapshot ids across the server's
/// lifetime. One instance shared by all connection handlers.
#[derive(Default)]
pub struct SnapshotStreamer {
    next_id: AtomicU64,
}

impl SnapshotStreamer {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1) }
    }

    /// Streams a full snapshot of every field to `stream` using blocking
    /// writes. The caller is expected to drain promptly via its own
    /// dispatcher (spec.md §4.8: snapshot broadcast is sequential and
    /// blocking, unlike PROGRESS/END/GLOBAL_MODE_CHANGED).
    pub fn stream_to(&self, stream: &UnixStream, world: &World, aggregate: &Aggregate) -> Result<(), ProtocolError> {
        let snapshot_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let fields = snapshot_field_bits::OBSTACLES
            | snapshot_field_bits::TRIALS
            | snapshot_field_bits::SUM_STEPS
            | snapshot_field_bits::SUCC_LEQ_K;

        let begin = SnapshotBeginPayload {
            snapshot_id,
            width: world.width(),
            height: world.height(),
            world_kind: world.kind().wire(),
            cell_count: world.cell_count() as u64,
            fields,
        };
        wire::send(stream, types::SNAPSHOT_BEGIN, &begin.encode())?;

        stream_field(stream, snapshot_id, snapshot_field_bits::OBSTACLES, world.obstacles())?;
        stream_field(stream, snapshot_id, snapshot_field_bits::TRIALS, &aggregate.field_bytes(Field::Trials))?;
        stream_field(
            stream,
            snapshot_id,
            snapshot_field_bits::SUM_STEPS,
            &aggregate.field_bytes(Field::SumSteps),
        )?;
        stream_field(
            stream,
            snapshot_id,
            snapshot_field_bits::SUCC_LEQ_K,
            &aggregate.field_bytes(Field::SuccLeqK),
        )?;

        wire::send(stream, types::SNAPSHOT_END, &[])
    }
}

fn stream_field(stream: &UnixStream, snapshot_id: u64, field: u8, bytes: &[u8]) -> Result<(), ProtocolError> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        let end = (offset + MAX_CHUNK_PAYLOAD).min(bytes.len());
        let chunk = SnapshotChunkPayload {
            snapshot_id,
            field,
            offset_bytes: offset as u64,
            data: bytes[offset..end].to_vec(),
        };
        wire::send(stream, types::SNAPSHOT_CHUNK, &chunk.encode())?;
        offset = end;
    }
    // a zero-length field (e.g. an empty world, unreachable in practice
    // given W,H > 0) still needs to appear in the stream as "covered" —
    // emit one empty chunk so the offset range [0,0) is represented.
    if bytes.is_empty() {
        let chunk = SnapshotChunkPayload {
            snapshot_id,
            field,
            offset_bytes: 0,
            data: Vec::new(),
        };
        wire::send(stream, types::SNAPSHOT_CHUNK, &chunk.encode())?;
    }
    Ok(())
}
