//! Client-side snapshot assembler, the receiving half of C10 (spec.md §4.9).
//!
//! Frees the previous assembly on a new SNAPSHOT_BEGIN and allocates only
//! the fields the bitmask declares. Tolerates stale chunks (a lagging
//! `snapshot_id`) by silently dropping them instead of corrupting the
//! active assembly.

use std::sync::Mutex;

use crate::wire::snapshot_field_bits;
use crate::wire::SnapshotBeginPayload;
use crate::wire::SnapshotChunkPayload;

/// A snapshot under construction, or just-finalized and ready to be taken.
pub struct Assembly {
    pub snapshot_id: u64,
    pub width: u32,
    pub height: u32,
    pub world_kind: u8,
    pub cell_count: u64,
    pub fields: u8,
    pub obstacles: Option<Vec<u8>>,
    pub trials: Option<Vec<u8>>,
    pub sum_steps: Option<Vec<u8>>,
    pub succ_leq_k: Option<Vec<u8>>,
    finished: bool,
}

#[derive(Default)]
struct State {
    active: Option<Assembly>,
}

#[derive(Default)]
pub struct SnapshotAssembler {
    inner: Mutex<State>,
}

impl SnapshotAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin(&self, b: SnapshotBeginPayload) {
        let cell_count = b.cell_count as usize;
        let mut state = self.inner.lock().unwrap();
        state.active = Some(Assembly {
            snapshot_id: b.snapshot_id,
            width: b.width,
            height: b.height,
            world_kind: b.world_kind,
            cell_count: b.cell_count,
            fields: b.fields,
            obstacles: (b.fields & snapshot_field_bits::OBSTACLES != 0).then(|| vec![0u8; cell_count]),
            trials: (b.fields & snapshot_field_bits::TRIALS != 0).then(|| vec![0u8; cell_count * 4]),
            sum_steps: (b.fields & snapshot_field_bits::SUM_STEPS != 0).then(|| vec![0u8; cell_count * 8]),
            succ_leq_k: (b.fields & snapshot_field_bits::SUCC_LEQ_K != 0).then(|| vec![0u8; cell_count * 4]),
            finished: false,
        });
    }

    pub(crate) fn chunk(&self, c: SnapshotChunkPayload) {
        let mut state = self.inner.lock().unwrap();
        let Some(assembly) = state.active.as_mut() else { return };
        if assembly.snapshot_id != c.snapshot_id {
            return;
        }
        let buf = match c.field {
            snapshot_field_bits::OBSTACLES => assembly.obstacles.as_mut(),
            snapshot_field_bits::TRIALS => assembly.trials.as_mut(),
            snapshot_field_bits::SUM_STEPS => assembly.sum_steps.as_mut(),
            snapshot_field_bits::SUCC_LEQ_K => assembly.succ_leq_k.as_mut(),
            _ => None,
        };
        let Some(buf) = buf else { return };
        // overflow-safe bounds check (spec.md §9 open question): reject
        // rather than wrap on an adversarial offset near u64::MAX.
        let Some(end) = (c.offset_bytes as usize).checked_add(c.data.len()) else { return };
        if end > buf.len() {
            return;
        }
        buf[c.offset_bytes as usize..end].copy_from_slice(&c.data);
    }

    pub(crate) fn finish(&self) {
        if let Some(a) = self.inner.lock().unwrap().active.as_mut() {
            a.finished = true;
        }
    }

    /// Takes the most recently finalized assembly, leaving none active.
    /// Returns `None` while a snapshot is still streaming or none has
    /// arrived yet.
    pub fn take_finished(&self) -> Option<Assembly> {
        let mut state = self.inner.lock().unwrap();
        match &state.active {
            Some(a) if a.finished => state.active.take(),
            _ => None,
        }
    }
}
