//! Protocol error type

use thiserror::Error;

use crate::wire::MESSAGE_SIZE;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message kind {0}")]
    UnknownKind(u32),

    #[error("text length {0} out of range")]
    InvalidTextLength(i32),

    #[error("invalid window type {0}")]
    InvalidWindowType(i32),

    #[error("invalid cursor {0}")]
    InvalidCursor(u8),

    #[error("invalid mouse button {0}")]
    InvalidMouseButton(u8),

    #[error("record is {0} bytes, expected {MESSAGE_SIZE}")]
    BadSize(usize),

    #[error("payload read past the end of the record")]
    PayloadOverrun,

    #[error("connection I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the stream itself can no longer be trusted.
    ///
    /// Everything except I/O and framing errors concerns a single record and
    /// leaves the connection usable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Io(_) | ProtocolError::BadSize(_))
    }
}
