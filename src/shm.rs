//! Shared pixel buffers
//!
//! Every buffer is a file named `pane-shbuf-<id>` in the server's buffer
//! directory, mapped with `memmap2`. Clients map the same file by id. The pool
//! holds one reference per live buffer; backing stores hold their own. The
//! file is unlinked when the last reference drops.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use memmap2::MmapMut;
use pane_proto::{ClientId, SharedBufferId};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("shared buffer size must be positive")]
    ZeroSize,

    #[error("shared buffer of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("no shared buffer with id {0}")]
    NotFound(SharedBufferId),

    #[error("shared buffer {0} belongs to another client")]
    NotOwner(SharedBufferId),

    #[error("shared buffer I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// A mapped shared buffer
pub struct SharedBuffer {
    id: SharedBufferId,
    path: PathBuf,
    map: MmapMut,
}

impl SharedBuffer {
    pub fn id(&self) -> SharedBufferId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Current contents. Clients may be writing concurrently; readers accept
    /// torn frames.
    pub fn bytes(&self) -> &[u8] {
        &self.map
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("id", &self.id)
            .field("size", &self.size())
            .finish()
    }
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        debug!("Unlinking shared buffer {}", self.id);
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to unlink shared buffer {:?}: {}", self.path, e);
        }
    }
}

struct PoolEntry {
    buffer: Arc<SharedBuffer>,
    owner: ClientId,
}

/// Allocates shared buffers and tracks which client owns each one
pub struct SharedBufferPool {
    dir: PathBuf,
    max_size: usize,
    next_id: SharedBufferId,
    buffers: HashMap<SharedBufferId, PoolEntry>,
}

impl SharedBufferPool {
    pub fn new(dir: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_size,
            next_id: 1,
            buffers: HashMap::new(),
        }
    }

    /// Where clients map the buffer with `id`
    pub fn shared_buffer_path(&self, id: SharedBufferId) -> PathBuf {
        self.dir.join(format!("pane-shbuf-{id}"))
    }

    /// Allocate a zero-filled buffer of `size` bytes owned by `owner`
    pub fn create(&mut self, size: usize, owner: ClientId) -> Result<Arc<SharedBuffer>, ShmError> {
        let buffer = Arc::new(self.allocate(size)?);
        self.buffers.insert(
            buffer.id,
            PoolEntry {
                buffer: buffer.clone(),
                owner,
            },
        );
        Ok(buffer)
    }

    /// Allocate a buffer holding a copy of `contents`
    pub fn create_with_contents(
        &mut self,
        contents: &[u8],
        owner: ClientId,
    ) -> Result<Arc<SharedBuffer>, ShmError> {
        let mut buffer = self.allocate(contents.len().max(1))?;
        buffer.map[..contents.len()].copy_from_slice(contents);
        let buffer = Arc::new(buffer);
        self.buffers.insert(
            buffer.id,
            PoolEntry {
                buffer: buffer.clone(),
                owner,
            },
        );
        Ok(buffer)
    }

    fn allocate(&mut self, size: usize) -> Result<SharedBuffer, ShmError> {
        if size == 0 {
            return Err(ShmError::ZeroSize);
        }
        if size > self.max_size {
            return Err(ShmError::TooLarge {
                size,
                max: self.max_size,
            });
        }

        let id = self.next_id;
        let path = self.shared_buffer_path(id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.set_len(size as u64)?;
        // SAFETY: the file is private to this pool and sized above; clients
        // only ever write pixel data into it.
        let map = match unsafe { MmapMut::map_mut(&file) } {
            Ok(map) => map,
            Err(e) => {
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
        };
        self.next_id += 1;

        debug!("Created shared buffer {} ({} bytes) at {:?}", id, size, path);
        Ok(SharedBuffer { id, path, map })
    }

    pub fn get(&self, id: SharedBufferId) -> Option<Arc<SharedBuffer>> {
        self.buffers.get(&id).map(|entry| entry.buffer.clone())
    }

    /// Look up a buffer `client` is allowed to attach or read
    pub fn get_for_client(
        &self,
        id: SharedBufferId,
        client: ClientId,
    ) -> Result<Arc<SharedBuffer>, ShmError> {
        let entry = self.buffers.get(&id).ok_or(ShmError::NotFound(id))?;
        if entry.owner != client {
            return Err(ShmError::NotOwner(id));
        }
        Ok(entry.buffer.clone())
    }

    /// Drop the pool's reference to `id`
    pub fn release(&mut self, id: SharedBufferId) -> bool {
        self.buffers.remove(&id).is_some()
    }

    /// Drop every buffer owned by a disconnected client
    pub fn release_client(&mut self, client: ClientId) {
        self.buffers.retain(|_, entry| entry.owner != client);
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
