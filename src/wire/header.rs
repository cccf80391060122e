//! Frame header (spec.md §4.7, §6): 8 bytes, little-endian, no padding.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: u16,
    pub payload_len: u32,
}

impl Header {
    pub fn new(msg_type: u16, payload_len: u32) -> Self {
        Self { msg_type, payload_len }
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        LittleEndian::write_u16(&mut buf[0..2], self.msg_type);
        LittleEndian::write_u16(&mut buf[2..4], 0);
        LittleEndian::write_u32(&mut buf[4..8], self.payload_len);
        buf
    }

    pub fn from_bytes(buf: [u8; HEADER_LEN]) -> Self {
        Self {
            msg_type: LittleEndian::read_u16(&buf[0..2]),
            payload_len: LittleEndian::read_u32(&buf[4..8]),
        }
    }
}

/// Type codes, spec.md §6's message catalogue table.
pub mod types {
    pub const JOIN: u16 = 1;
    pub const WELCOME: u16 = 2;
    pub const SET_GLOBAL_MODE: u16 = 3;
    pub const GLOBAL_MODE_CHANGED: u16 = 4;
    pub const PROGRESS: u16 = 5;
    pub const SNAPSHOT_BEGIN: u16 = 6;
    pub const SNAPSHOT_CHUNK: u16 = 7;
    pub const SNAPSHOT_END: u16 = 8;
    pub const STOP_SIM: u16 = 9;
    pub const END: u16 = 10;
    pub const QUERY_STATUS: u16 = 11;
    pub const STATUS: u16 = 12;
    pub const CREATE_SIM: u16 = 13;
    pub const LOAD_WORLD: u16 = 14;
    pub const START_SIM: u16 = 15;
    pub const REQUEST_SNAPSHOT: u16 = 16;
    pub const RESTART_SIM: u16 = 17;
    pub const LOAD_RESULTS: u16 = 18;
    pub const SAVE_RESULTS: u16 = 19;
    pub const QUIT: u16 = 20;
    pub const ACK: u16 = 21;
    pub const ERROR: u16 = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let h = Header::new(types::SNAPSHOT_CHUNK, 4096);
        assert_eq!(Header::from_bytes(h.to_bytes()), h);
    }

    #[test]
    fn reserved_field_is_always_zero_on_the_wire() {
        let bytes = Header::new(types::ACK, 6).to_bytes();
        assert_eq!(&bytes[2..4], &[0, 0]);
    }
}
