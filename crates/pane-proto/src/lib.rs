//! Pane window server protocol
//!
//! Fixed-size message records exchanged between the `pane` window server and
//! its clients over a local stream socket. Each direction has its own kind
//! table; both share the [`wire::RawMessage`] layout.

pub mod client;
pub mod error;
pub mod geometry;
pub mod server;
pub mod types;
pub mod wire;

use std::io;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub use client::{ClientMessage, ClientMessageKind, CreateWindowParams};
pub use error::ProtocolError;
pub use geometry::{Point, Rect, Size};
pub use server::{KeyEventInfo, MouseEventInfo, ServerMessage, ServerMessageKind, WindowStateInfo};
pub use types::*;
pub use wire::{MESSAGE_SIZE, RawMessage};

/// Well-known socket path of the window server
pub fn socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
    PathBuf::from(runtime_dir).join("pane.sock")
}

// ============================================================================
// Record framing
// ============================================================================

/// Read one whole record.
///
/// Returns `Ok(None)` when the peer closed the stream on a record boundary.
/// A stream that ends inside a record is an `UnexpectedEof` error.
pub async fn read_record<R>(reader: &mut R) -> Result<Option<RawMessage>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; MESSAGE_SIZE];
    let mut filled = 0;
    while filled < MESSAGE_SIZE {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream closed after {filled} of {MESSAGE_SIZE} bytes"),
            )
            .into());
        }
        filled += n;
    }
    RawMessage::from_bytes(&buf).map(Some)
}

pub async fn write_record<W>(writer: &mut W, record: &RawMessage) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(record.as_bytes()).await?;
    Ok(())
}
