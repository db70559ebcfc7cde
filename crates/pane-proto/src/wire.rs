//! Fixed-size wire record shared by both message directions.
//!
//! Every message on a connection is exactly one [`RawMessage`]. The layout is
//! C-compatible so peers written against the same header can exchange records
//! without a serialization framework:
//!
//! ```text
//! kind: u32 | window_id: i32 | text_length: i32 | text: [u8; 256] | value: i32 | payload: [u8; 64]
//! ```
//!
//! Multi-byte fields use native endianness; both peers live on one machine.

use std::mem;

use bytemuck::{Pod, Zeroable};

use crate::error::ProtocolError;
use crate::geometry::{Point, Rect, Size};

/// Capacity of the text field in bytes
pub const TEXT_CAPACITY: usize = 256;

/// Longest text an encoder will store; one byte stays reserved
pub const MAX_TEXT_LENGTH: usize = TEXT_CAPACITY - 1;

/// Size of the per-kind payload area
pub const PAYLOAD_SIZE: usize = 64;

/// Size of one record on the wire
pub const MESSAGE_SIZE: usize = mem::size_of::<RawMessage>();

/// The wire record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RawMessage {
    pub kind: u32,
    pub window_id: i32,
    /// Authoritative length of `text`; bytes past it are undefined
    pub text_length: i32,
    pub text: [u8; TEXT_CAPACITY],
    pub value: i32,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl RawMessage {
    pub fn new(kind: u32) -> Self {
        Self {
            kind,
            window_id: -1,
            ..Self::zeroed()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != MESSAGE_SIZE {
            return Err(ProtocolError::BadSize(bytes.len()));
        }
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Store `text`, truncated to at most [`MAX_TEXT_LENGTH`] bytes on a
    /// character boundary.
    pub fn set_text(&mut self, text: &str) {
        let len = truncated_len(text, MAX_TEXT_LENGTH);
        self.text = [0; TEXT_CAPACITY];
        self.text[..len].copy_from_slice(&text.as_bytes()[..len]);
        self.text_length = len as i32;
    }

    /// Read the text field, never looking past `text_length`.
    pub fn text(&self) -> Result<String, ProtocolError> {
        let len = usize::try_from(self.text_length)
            .ok()
            .filter(|len| *len <= MAX_TEXT_LENGTH)
            .ok_or(ProtocolError::InvalidTextLength(self.text_length))?;
        Ok(String::from_utf8_lossy(&self.text[..len]).into_owned())
    }

    pub fn writer(&mut self) -> PayloadWriter<'_> {
        PayloadWriter {
            buf: &mut self.payload,
            pos: 0,
        }
    }

    pub fn reader(&self) -> PayloadReader<'_> {
        PayloadReader {
            buf: &self.payload,
            pos: 0,
        }
    }
}

/// Largest prefix of `text` that fits in `max` bytes without splitting a character
pub fn truncated_len(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    let mut len = max;
    while !text.is_char_boundary(len) {
        len -= 1;
    }
    len
}

/// Sequential writer over the payload area.
pub struct PayloadWriter<'a> {
    buf: &'a mut [u8; PAYLOAD_SIZE],
    pos: usize,
}

impl PayloadWriter<'_> {
    fn put(&mut self, bytes: &[u8]) -> &mut Self {
        let end = self.pos + bytes.len();
        // Payload layouts are fixed at compile time; overflowing one is a bug.
        assert!(end <= PAYLOAD_SIZE, "payload layout exceeds {PAYLOAD_SIZE} bytes");
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.put(&value.to_ne_bytes())
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.put(&value.to_ne_bytes())
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.put(&value.to_ne_bytes())
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.put(&[value])
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(value as u8)
    }

    pub fn point(&mut self, point: Point) -> &mut Self {
        self.i32(point.x).i32(point.y)
    }

    pub fn size(&mut self, size: Size) -> &mut Self {
        self.i32(size.width).i32(size.height)
    }

    pub fn rect(&mut self, rect: Rect) -> &mut Self {
        self.point(rect.location).size(rect.size)
    }

    /// Fixed-capacity text slot: `N` bytes followed by an `i32` length.
    pub fn short_text<const N: usize>(&mut self, text: &str) -> &mut Self {
        let len = truncated_len(text, N);
        let mut slot = [0u8; N];
        slot[..len].copy_from_slice(&text.as_bytes()[..len]);
        self.put(&slot).i32(len as i32)
    }
}

/// Sequential reader over the payload area.
pub struct PayloadReader<'a> {
    buf: &'a [u8; PAYLOAD_SIZE],
    pos: usize,
}

impl PayloadReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let end = self.pos + N;
        if end > PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadOverrun);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    pub fn i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_ne_bytes(self.take()?))
    }

    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_ne_bytes(self.take()?))
    }

    pub fn f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_ne_bytes(self.take()?))
    }

    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.u8()? != 0)
    }

    pub fn point(&mut self) -> Result<Point, ProtocolError> {
        Ok(Point::new(self.i32()?, self.i32()?))
    }

    pub fn size(&mut self) -> Result<Size, ProtocolError> {
        Ok(Size::new(self.i32()?, self.i32()?))
    }

    pub fn rect(&mut self) -> Result<Rect, ProtocolError> {
        Ok(Rect::from_parts(self.point()?, self.size()?))
    }

    pub fn short_text<const N: usize>(&mut self) -> Result<String, ProtocolError> {
        let slot = self.take::<N>()?;
        let len = self.i32()?;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= N)
            .ok_or(ProtocolError::InvalidTextLength(len))?;
        Ok(String::from_utf8_lossy(&slot[..len]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(MESSAGE_SIZE, 4 + 4 + 4 + TEXT_CAPACITY + 4 + PAYLOAD_SIZE);
    }

    #[test]
    fn test_long_text_is_truncated_to_255() {
        let title = "x".repeat(300);
        let mut msg = RawMessage::new(1);
        msg.set_text(&title);
        assert_eq!(msg.text_length, 255);

        let decoded = RawMessage::from_bytes(msg.as_bytes()).unwrap();
        assert_eq!(decoded.text().unwrap(), "x".repeat(255));
    }

    #[test]
    fn test_text_ignores_bytes_past_length() {
        let mut msg = RawMessage::new(1);
        msg.set_text("hello");
        msg.text[5..].fill(b'!');
        assert_eq!(msg.text().unwrap(), "hello");
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        // 'é' is two bytes; 128 of them is 256 bytes
        let text = "é".repeat(128);
        let mut msg = RawMessage::new(1);
        msg.set_text(&text);
        assert_eq!(msg.text_length, 254);
        assert_eq!(msg.text().unwrap().chars().count(), 127);
    }

    #[test]
    fn test_text_length_out_of_range_is_rejected() {
        let mut msg = RawMessage::new(1);
        msg.text_length = 256;
        assert!(matches!(msg.text(), Err(ProtocolError::InvalidTextLength(256))));
        msg.text_length = -1;
        assert!(matches!(msg.text(), Err(ProtocolError::InvalidTextLength(-1))));
    }

    #[test]
    fn test_wrong_record_size_is_rejected() {
        assert!(matches!(
            RawMessage::from_bytes(&[0u8; 12]),
            Err(ProtocolError::BadSize(12))
        ));
    }
}
