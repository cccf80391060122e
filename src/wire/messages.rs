//! Payload structs for the message catalogue (spec.md §4.7, §6). Each type
//! owns `encode`/`decode`; `decode` enforces the exact expected length so
//! C8's dispatch can reject mis-sized payloads per spec.md §4.8.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::error::ProtocolError;
use crate::wire::header::types;

const PATH_LEN: usize = 256;
const ERROR_MESSAGE_LEN: usize = 256;

fn expect_len(ty: u16, expected: usize, got: usize) -> Result<(), ProtocolError> {
    if expected != got {
        return Err(ProtocolError::PayloadLengthMismatch { ty, expected, got });
    }
    Ok(())
}

fn encode_path(path: &str) -> [u8; PATH_LEN] {
    let mut buf = [0u8; PATH_LEN];
    let bytes = path.as_bytes();
    let n = bytes.len().min(PATH_LEN - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn decode_path(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn encode_error_message(msg: &str) -> [u8; ERROR_MESSAGE_LEN] {
    let mut buf = [0u8; ERROR_MESSAGE_LEN];
    let bytes = msg.as_bytes();
    let n = bytes.len().min(ERROR_MESSAGE_LEN - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

/// JOIN (type 1, C→S).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPayload {
    pub pid: u32,
}

impl JoinPayload {
    pub const LEN: usize = 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u32(&mut buf, self.pid);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::JOIN, Self::LEN, buf.len())?;
        Ok(Self { pid: LittleEndian::read_u32(buf) })
    }
}

/// WELCOME (type 2, S→C).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelcomePayload {
    pub world_kind: u8,
    pub width: u32,
    pub height: u32,
    pub probs: [f64; 4],
    pub k: u64,
    pub total_reps: u64,
    pub current_rep: u64,
    pub mode: u8,
    pub origin_x: i64,
    pub origin_y: i64,
}

impl WelcomePayload {
    pub const LEN: usize = 1 + 4 + 4 + 8 * 4 + 8 + 8 + 8 + 1 + 8 + 8;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        let mut off = 0;
        buf[off] = self.world_kind;
        off += 1;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.width);
        off += 4;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.height);
        off += 4;
        for p in self.probs {
            LittleEndian::write_f64(&mut buf[off..off + 8], p);
            off += 8;
        }
        LittleEndian::write_u64(&mut buf[off..off + 8], self.k);
        off += 8;
        LittleEndian::write_u64(&mut buf[off..off + 8], self.total_reps);
        off += 8;
        LittleEndian::write_u64(&mut buf[off..off + 8], self.current_rep);
        off += 8;
        buf[off] = self.mode;
        off += 1;
        LittleEndian::write_i64(&mut buf[off..off + 8], self.origin_x);
        off += 8;
        LittleEndian::write_i64(&mut buf[off..off + 8], self.origin_y);
        off += 8;
        debug_assert_eq!(off, Self::LEN);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::WELCOME, Self::LEN, buf.len())?;
        let mut off = 0;
        let world_kind = buf[off];
        off += 1;
        let width = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let height = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let mut probs = [0f64; 4];
        for p in probs.iter_mut() {
            *p = LittleEndian::read_f64(&buf[off..off + 8]);
            off += 8;
        }
        let k = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let total_reps = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let current_rep = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let mode = buf[off];
        off += 1;
        let origin_x = LittleEndian::read_i64(&buf[off..off + 8]);
        off += 8;
        let origin_y = LittleEndian::read_i64(&buf[off..off + 8]);
        off += 8;
        debug_assert_eq!(off, Self::LEN);
        Ok(Self {
            world_kind,
            width,
            height,
            probs,
            k,
            total_reps,
            current_rep,
            mode,
            origin_x,
            origin_y,
        })
    }
}

/// SET_GLOBAL_MODE (type 3, C→S).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetGlobalModePayload {
    pub mode: u8,
}

impl SetGlobalModePayload {
    pub const LEN: usize = 1;

    pub fn encode(&self) -> Vec<u8> {
        vec![self.mode]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::SET_GLOBAL_MODE, Self::LEN, buf.len())?;
        Ok(Self { mode: buf[0] })
    }
}

/// GLOBAL_MODE_CHANGED (type 4, S→all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalModeChangedPayload {
    pub mode: u8,
    pub changed_by_pid: u32,
}

impl GlobalModeChangedPayload {
    pub const LEN: usize = 1 + 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        buf[0] = self.mode;
        LittleEndian::write_u32(&mut buf[1..5], self.changed_by_pid);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::GLOBAL_MODE_CHANGED, Self::LEN, buf.len())?;
        Ok(Self {
            mode: buf[0],
            changed_by_pid: LittleEndian::read_u32(&buf[1..5]),
        })
    }
}

/// PROGRESS (type 5, S→all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPayload {
    pub current_rep: u64,
    pub total_reps: u64,
}

impl ProgressPayload {
    pub const LEN: usize = 8 + 8;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u64(&mut buf[0..8], self.current_rep);
        LittleEndian::write_u64(&mut buf[8..16], self.total_reps);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::PROGRESS, Self::LEN, buf.len())?;
        Ok(Self {
            current_rep: LittleEndian::read_u64(&buf[0..8]),
            total_reps: LittleEndian::read_u64(&buf[8..16]),
        })
    }
}

/// SNAPSHOT_BEGIN (type 6, S→C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotBeginPayload {
    pub snapshot_id: u64,
    pub width: u32,
    pub height: u32,
    pub world_kind: u8,
    pub cell_count: u64,
    pub fields: u8,
}

impl SnapshotBeginPayload {
    pub const LEN: usize = 8 + 4 + 4 + 1 + 8 + 1;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        let mut off = 0;
        LittleEndian::write_u64(&mut buf[off..off + 8], self.snapshot_id);
        off += 8;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.width);
        off += 4;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.height);
        off += 4;
        buf[off] = self.world_kind;
        off += 1;
        LittleEndian::write_u64(&mut buf[off..off + 8], self.cell_count);
        off += 8;
        buf[off] = self.fields;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::SNAPSHOT_BEGIN, Self::LEN, buf.len())?;
        let mut off = 0;
        let snapshot_id = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let width = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let height = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let world_kind = buf[off];
        off += 1;
        let cell_count = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let fields = buf[off];
        Ok(Self {
            snapshot_id,
            width,
            height,
            world_kind,
            cell_count,
            fields,
        })
    }
}

/// Field bit positions within `SnapshotBeginPayload::fields` (spec.md §6).
pub mod snapshot_field_bits {
    pub const OBSTACLES: u8 = 1 << 0;
    pub const TRIALS: u8 = 1 << 1;
    pub const SUM_STEPS: u8 = 1 << 2;
    pub const SUCC_LEQ_K: u8 = 1 << 3;
}

/// SNAPSHOT_CHUNK (type 7, S→C). Fixed header plus up to
/// `MAX_CHUNK_PAYLOAD` data bytes (spec.md §4.10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotChunkPayload {
    pub snapshot_id: u64,
    pub field: u8,
    pub offset_bytes: u64,
    pub data: Vec<u8>,
}

impl SnapshotChunkPayload {
    pub const FIXED_LEN: usize = 8 + 1 + 8 + 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::FIXED_LEN + self.data.len());
        let mut hdr = [0u8; Self::FIXED_LEN];
        LittleEndian::write_u64(&mut hdr[0..8], self.snapshot_id);
        hdr[8] = self.field;
        LittleEndian::write_u64(&mut hdr[9..17], self.offset_bytes);
        LittleEndian::write_u32(&mut hdr[17..21], self.data.len() as u32);
        buf.extend_from_slice(&hdr);
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < Self::FIXED_LEN {
            return Err(ProtocolError::PayloadLengthMismatch {
                ty: types::SNAPSHOT_CHUNK,
                expected: Self::FIXED_LEN,
                got: buf.len(),
            });
        }
        let snapshot_id = LittleEndian::read_u64(&buf[0..8]);
        let field = buf[8];
        let offset_bytes = LittleEndian::read_u64(&buf[9..17]);
        let data_len = LittleEndian::read_u32(&buf[17..21]) as usize;
        expect_len(types::SNAPSHOT_CHUNK, Self::FIXED_LEN + data_len, buf.len())?;
        Ok(Self {
            snapshot_id,
            field,
            offset_bytes,
            data: buf[Self::FIXED_LEN..].to_vec(),
        })
    }
}

/// STOP_SIM (type 9, C→S).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSimPayload {
    pub pid: u32,
}

impl StopSimPayload {
    pub const LEN: usize = 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u32(&mut buf, self.pid);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::STOP_SIM, Self::LEN, buf.len())?;
        Ok(Self { pid: LittleEndian::read_u32(buf) })
    }
}

/// END (type 10, S→all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndPayload {
    pub reason: u8,
}

impl EndPayload {
    pub const LEN: usize = 1;

    pub fn encode(&self) -> Vec<u8> {
        vec![self.reason]
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::END, Self::LEN, buf.len())?;
        Ok(Self { reason: buf[0] })
    }
}

/// QUERY_STATUS (type 11, C→S).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryStatusPayload {
    pub pid: u32,
}

impl QueryStatusPayload {
    pub const LEN: usize = 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u32(&mut buf, self.pid);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::QUERY_STATUS, Self::LEN, buf.len())?;
        Ok(Self { pid: LittleEndian::read_u32(buf) })
    }
}

/// STATUS (type 12, S→C).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusPayload {
    pub sim_state: u8,
    pub mode: u8,
    pub current_rep: u64,
    pub world_kind: u8,
    pub width: u32,
    pub height: u32,
    pub probs: [f64; 4],
    pub k: u64,
    pub total_reps: u64,
    pub multi_user: u8,
    pub has_owner: u8,
    pub owner_pid: u32,
}

impl StatusPayload {
    pub const LEN: usize = 1 + 1 + 8 + 1 + 4 + 4 + 8 * 4 + 8 + 8 + 1 + 1 + 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        let mut off = 0;
        buf[off] = self.sim_state;
        off += 1;
        buf[off] = self.mode;
        off += 1;
        LittleEndian::write_u64(&mut buf[off..off + 8], self.current_rep);
        off += 8;
        buf[off] = self.world_kind;
        off += 1;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.width);
        off += 4;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.height);
        off += 4;
        for p in self.probs {
            LittleEndian::write_f64(&mut buf[off..off + 8], p);
            off += 8;
        }
        LittleEndian::write_u64(&mut buf[off..off + 8], self.k);
        off += 8;
        LittleEndian::write_u64(&mut buf[off..off + 8], self.total_reps);
        off += 8;
        buf[off] = self.multi_user;
        off += 1;
        buf[off] = self.has_owner;
        off += 1;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.owner_pid);
        off += 4;
        debug_assert_eq!(off, Self::LEN);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::STATUS, Self::LEN, buf.len())?;
        let mut off = 0;
        let sim_state = buf[off];
        off += 1;
        let mode = buf[off];
        off += 1;
        let current_rep = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let world_kind = buf[off];
        off += 1;
        let width = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let height = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let mut probs = [0f64; 4];
        for p in probs.iter_mut() {
            *p = LittleEndian::read_f64(&buf[off..off + 8]);
            off += 8;
        }
        let k = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let total_reps = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let multi_user = buf[off];
        off += 1;
        let has_owner = buf[off];
        off += 1;
        let owner_pid = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        debug_assert_eq!(off, Self::LEN);
        Ok(Self {
            sim_state,
            mode,
            current_rep,
            world_kind,
            width,
            height,
            probs,
            k,
            total_reps,
            multi_user,
            has_owner,
            owner_pid,
        })
    }
}

/// CREATE_SIM (type 13, C→S). Carries `obstacle_percent`/`obstacle_seed`
/// alongside the fields named in spec.md §6's summary table — see
/// DESIGN.md's open-question note on CREATE_SIM's payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateSimPayload {
    pub world_kind: u8,
    pub width: u32,
    pub height: u32,
    pub probs: [f64; 4],
    pub k: u64,
    pub total_reps: u64,
    pub multi_user: u8,
    pub obstacle_percent: u32,
    pub obstacle_seed: u32,
}

impl CreateSimPayload {
    pub const LEN: usize = 1 + 4 + 4 + 8 * 4 + 8 + 8 + 1 + 4 + 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        let mut off = 0;
        buf[off] = self.world_kind;
        off += 1;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.width);
        off += 4;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.height);
        off += 4;
        for p in self.probs {
            LittleEndian::write_f64(&mut buf[off..off + 8], p);
            off += 8;
        }
        LittleEndian::write_u64(&mut buf[off..off + 8], self.k);
        off += 8;
        LittleEndian::write_u64(&mut buf[off..off + 8], self.total_reps);
        off += 8;
        buf[off] = self.multi_user;
        off += 1;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.obstacle_percent);
        off += 4;
        LittleEndian::write_u32(&mut buf[off..off + 4], self.obstacle_seed);
        off += 4;
        debug_assert_eq!(off, Self::LEN);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::CREATE_SIM, Self::LEN, buf.len())?;
        let mut off = 0;
        let world_kind = buf[off];
        off += 1;
        let width = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let height = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let mut probs = [0f64; 4];
        for p in probs.iter_mut() {
            *p = LittleEndian::read_f64(&buf[off..off + 8]);
            off += 8;
        }
        let k = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let total_reps = LittleEndian::read_u64(&buf[off..off + 8]);
        off += 8;
        let multi_user = buf[off];
        off += 1;
        let obstacle_percent = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        let obstacle_seed = LittleEndian::read_u32(&buf[off..off + 4]);
        off += 4;
        debug_assert_eq!(off, Self::LEN);
        Ok(Self {
            world_kind,
            width,
            height,
            probs,
            k,
            total_reps,
            multi_user,
            obstacle_percent,
            obstacle_seed,
        })
    }
}

/// LOAD_WORLD (type 14, C→S).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWorldPayload {
    pub path: String,
    pub multi_user: u8,
}

impl LoadWorldPayload {
    pub const LEN: usize = PATH_LEN + 1;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        buf[..PATH_LEN].copy_from_slice(&encode_path(&self.path));
        buf[PATH_LEN] = self.multi_user;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::LOAD_WORLD, Self::LEN, buf.len())?;
        Ok(Self {
            path: decode_path(&buf[..PATH_LEN]),
            multi_user: buf[PATH_LEN],
        })
    }
}

/// START_SIM (type 15, C→S): empty payload.
pub struct StartSimPayload;

impl StartSimPayload {
    pub const LEN: usize = 0;

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::START_SIM, Self::LEN, buf.len())?;
        Ok(Self)
    }
}

/// REQUEST_SNAPSHOT (type 16, C→S).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSnapshotPayload {
    pub pid: u32,
}

impl RequestSnapshotPayload {
    pub const LEN: usize = 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u32(&mut buf, self.pid);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::REQUEST_SNAPSHOT, Self::LEN, buf.len())?;
        Ok(Self { pid: LittleEndian::read_u32(buf) })
    }
}

/// RESTART_SIM (type 17, C→S).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartSimPayload {
    pub total_reps: u64,
}

impl RestartSimPayload {
    pub const LEN: usize = 8;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u64(&mut buf, self.total_reps);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::RESTART_SIM, Self::LEN, buf.len())?;
        Ok(Self { total_reps: LittleEndian::read_u64(buf) })
    }
}

/// LOAD_RESULTS (type 18, C→S).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResultsPayload {
    pub path: String,
}

impl LoadResultsPayload {
    pub const LEN: usize = PATH_LEN;

    pub fn encode(&self) -> Vec<u8> {
        encode_path(&self.path).to_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::LOAD_RESULTS, Self::LEN, buf.len())?;
        Ok(Self { path: decode_path(buf) })
    }
}

/// SAVE_RESULTS (type 19, C→S).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResultsPayload {
    pub path: String,
}

impl SaveResultsPayload {
    pub const LEN: usize = PATH_LEN;

    pub fn encode(&self) -> Vec<u8> {
        encode_path(&self.path).to_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::SAVE_RESULTS, Self::LEN, buf.len())?;
        Ok(Self { path: decode_path(buf) })
    }
}

/// QUIT (type 20, C→S).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitPayload {
    pub pid: u32,
    pub stop_if_owner: u8,
}

impl QuitPayload {
    pub const LEN: usize = 4 + 1;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u32(&mut buf[0..4], self.pid);
        buf[4] = self.stop_if_owner;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::QUIT, Self::LEN, buf.len())?;
        Ok(Self {
            pid: LittleEndian::read_u32(&buf[0..4]),
            stop_if_owner: buf[4],
        })
    }
}

/// ACK (type 21, S→C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPayload {
    pub request_type: u16,
    pub status: u32,
}

impl AckPayload {
    pub const LEN: usize = 2 + 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u16(&mut buf[0..2], self.request_type);
        LittleEndian::write_u32(&mut buf[2..6], self.status);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::ACK, Self::LEN, buf.len())?;
        Ok(Self {
            request_type: LittleEndian::read_u16(&buf[0..2]),
            status: LittleEndian::read_u32(&buf[2..6]),
        })
    }
}

/// ERROR (type 255, S→C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: u32,
    pub message: String,
}

impl ErrorPayload {
    pub const LEN: usize = 4 + ERROR_MESSAGE_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        LittleEndian::write_u32(&mut buf[0..4], self.code);
        buf[4..].copy_from_slice(&encode_error_message(&self.message));
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(types::ERROR, Self::LEN, buf.len())?;
        Ok(Self {
            code: LittleEndian::read_u32(&buf[0..4]),
            message: decode_path(&buf[4..]),
        })
    }
}
