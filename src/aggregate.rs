//! Aggregate store (spec.md §4.2, C2).

use std::sync::Mutex;

struct Counters {
    trials: Vec<u32>,
    sum_steps: Vec<u64>,
    successes: Vec<u32>,
}

/// Per-cell counters behind one mutex guarding all three arrays. Read
/// accessors hand back snapshotted copies — cheap enough at the sizes this
/// system targets, and it removes the torn-read caveat from everything but
/// the dedicated snapshot streamer (C10), which intentionally reads through
/// short-lived locks field-at-a-time instead of copying.
pub struct Aggregate {
    counters: Mutex<Counters>,
    len: usize,
}

impl Aggregate {
    pub fn init(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            counters: Mutex::new(Counters {
                trials: vec![0; len],
                sum_steps: vec![0; len],
                successes: vec![0; len],
            }),
            len,
        }
    }

    /// Rebuilds an aggregate from previously-saved per-cell arrays (C11).
    /// Bypasses `update`'s invariant checks since the caller (the
    /// persistence reader) is restoring, not producing, trial outcomes.
    pub fn from_raw(trials: Vec<u32>, sum_steps: Vec<u64>, successes: Vec<u32>) -> Self {
        let len = trials.len();
        Self {
            counters: Mutex::new(Counters {
                trials,
                sum_steps,
                successes,
            }),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&self) {
        let mut c = self.counters.lock().unwrap();
        c.trials.iter_mut().for_each(|v| *v = 0);
        c.sum_steps.iter_mut().for_each(|v| *v = 0);
        c.successes.iter_mut().for_each(|v| *v = 0);
    }

    /// Atomic under the internal mutex: `trials[idx]++`; `sum_steps[idx] +=
    /// steps` iff `reached_origin`; `successes[idx]++` iff
    /// `success_leq_k`.
    pub fn update(&self, idx: usize, steps: u64, reached_origin: bool, success_leq_k: bool) {
        let mut c = self.counters.lock().unwrap();
        c.trials[idx] += 1;
        if reached_origin {
            c.sum_steps[idx] += steps;
        }
        if success_leq_k {
            c.successes[idx] += 1;
        }
    }

    pub fn trials(&self) -> Vec<u32> {
        self.counters.lock().unwrap().trials.clone()
    }

    pub fn sum_steps(&self) -> Vec<u64> {
        self.counters.lock().unwrap().sum_steps.clone()
    }

    pub fn successes(&self) -> Vec<u32> {
        self.counters.lock().unwrap().successes.clone()
    }

    pub fn trials_at(&self, idx: usize) -> u32 {
        self.counters.lock().unwrap().trials[idx]
    }

    pub fn sum_steps_at(&self, idx: usize) -> u64 {
        self.counters.lock().unwrap().sum_steps[idx]
    }

    pub fn successes_at(&self, idx: usize) -> u32 {
        self.counters.lock().unwrap().successes[idx]
    }

    /// Read a byte range of one field's underlying representation, for the
    /// snapshot streamer (C10). `field` selects which array; the bytes are
    /// little-endian element-wise, matching the wire codec's convention.
    pub fn field_bytes(&self, field: Field) -> Vec<u8> {
        let c = self.counters.lock().unwrap();
        match field {
            Field::Trials => c.trials.iter().flat_map(|v| v.to_le_bytes()).collect(),
            Field::SumSteps => c.sum_steps.iter().flat_map(|v| v.to_le_bytes()).collect(),
            Field::SuccLeqK => c.successes.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }
}

/// The aggregate fields addressable by the snapshot protocol (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Trials,
    SumSteps,
    SuccLeqK,
}

impl Field {
    pub fn element_width(self) -> usize {
        match self {
            Field::Trials => 4,
            Field::SumSteps => 8,
            Field::SuccLeqK => 4,
        }
    }
}
