//! Shared error types for the wire protocol and the control plane.

use std::io;

/// Failures in the framing layer itself: a malformed header, a payload that
/// doesn't match its declared length, or the peer going away mid-message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("connection closed while reading header")]
    HeaderClosed,
    #[error("connection closed while reading payload")]
    PayloadClosed,
    #[error("payload length {got} does not match expected {expected} for message type {ty}")]
    PayloadLengthMismatch { ty: u16, expected: usize, got: usize },
    #[error("unexpected message type {0}")]
    UnexpectedType(u16),
    #[error("would block")]
    WouldBlock,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The §7 error taxonomy, carried in ERROR payloads by numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("state conflict")]
    StateConflict,
    #[error("invalid parameters")]
    InvalidParameters,
    #[error("probability sum out of range")]
    ProbabilitySum,
    #[error("world init failure")]
    WorldInit,
    #[error("aggregate init failure")]
    AggregateInit,
    #[error("server handles not wired")]
    HandlesNotWired,
    #[error("load_world failure")]
    LoadWorld,
    #[error("manager not wired")]
    ManagerNotWired,
    #[error("start/restart failure")]
    StartFailure,
    #[error("snapshot unavailable")]
    SnapshotUnavailable,
    #[error("snapshot send failed")]
    SnapshotSendFailed,
    #[error("nothing to save")]
    NothingToSave,
    #[error("save failure")]
    SaveFailure,
    #[error("load failure")]
    LoadFailure,
}

impl ControlError {
    /// The numeric code carried on the wire, per spec.md §7.
    pub fn code(self) -> u32 {
        match self {
            ControlError::PermissionDenied => 1,
            ControlError::StateConflict => 2,
            ControlError::InvalidParameters => 3,
            ControlError::ProbabilitySum => 4,
            ControlError::WorldInit => 5,
            ControlError::AggregateInit => 6,
            ControlError::HandlesNotWired => 7,
            ControlError::LoadWorld => 8,
            ControlError::ManagerNotWired => 9,
            ControlError::StartFailure => 10,
            ControlError::SnapshotUnavailable => 11,
            ControlError::SnapshotSendFailed => 12,
            ControlError::NothingToSave => 13,
            ControlError::SaveFailure => 14,
            ControlError::LoadFailure => 15,
        }
    }
}
