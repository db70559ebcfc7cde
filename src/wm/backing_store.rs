//! Window backing stores
//!
//! A backing store is a view of a client-written shared buffer. It is never
//! mutated: replacing it creates a new one and retires the old.

use std::sync::Arc;

use pane_proto::{BackingStoreInfo, SharedBufferId, Size};
use thiserror::Error;

use crate::compositor::painter::PixelBuffer;
use crate::shm::SharedBuffer;

pub const BITS_PER_PIXEL: u32 = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackingStoreError {
    #[error("unsupported pixel depth {0}, only 32 bpp is accepted")]
    UnsupportedDepth(u32),

    #[error("pitch {pitch} is too small for width {width}")]
    PitchTooSmall { pitch: u32, width: i32 },

    #[error("buffer holds {available} bytes, store needs {required}")]
    BufferTooSmall { required: usize, available: usize },

    #[error("invalid store size {0:?}")]
    InvalidSize(Size),
}

#[derive(Debug)]
pub struct BackingStore {
    info: BackingStoreInfo,
    buffer: Arc<SharedBuffer>,
    server_allocated: bool,
}

impl BackingStore {
    /// Validate `info` against `buffer` and wrap them.
    ///
    /// `server_allocated` stores were created for the window by the server;
    /// the pool releases their buffer once the store is retired.
    pub fn attach(
        info: BackingStoreInfo,
        buffer: Arc<SharedBuffer>,
        server_allocated: bool,
    ) -> Result<Self, BackingStoreError> {
        if info.bits_per_pixel != BITS_PER_PIXEL {
            return Err(BackingStoreError::UnsupportedDepth(info.bits_per_pixel));
        }
        if info.size.width < 0 || info.size.height < 0 {
            return Err(BackingStoreError::InvalidSize(info.size));
        }
        if (info.pitch as i64) < info.size.width as i64 * 4 {
            return Err(BackingStoreError::PitchTooSmall {
                pitch: info.pitch,
                width: info.size.width,
            });
        }
        let required = info.required_bytes();
        if required > buffer.size() {
            return Err(BackingStoreError::BufferTooSmall {
                required,
                available: buffer.size(),
            });
        }
        Ok(Self {
            info: BackingStoreInfo {
                shared_buffer_id: buffer.id(),
                ..info
            },
            buffer,
            server_allocated,
        })
    }

    pub fn info(&self) -> BackingStoreInfo {
        self.info
    }

    pub fn shared_buffer_id(&self) -> SharedBufferId {
        self.info.shared_buffer_id
    }

    pub fn size(&self) -> Size {
        self.info.size
    }

    pub fn is_server_allocated(&self) -> bool {
        self.server_allocated
    }

    pub fn pixels(&self) -> PixelBuffer<'_> {
        PixelBuffer {
            bytes: self.buffer.bytes(),
            size: self.info.size,
            pitch: self.info.pitch as usize,
            has_alpha: self.info.has_alpha_channel,
        }
    }
}
