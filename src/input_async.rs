//! Async pointer device stream
//!
//! Polls the device fd with mio on a blocking task and wakes the run loop
//! through a `Notify` when bytes are readable.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Notify, oneshot};

use crate::input::{MotionPacket, PACKET_SIZE, PacketQueue, Ps2Decoder};

pub struct InputEventStream {
    device: File,
    decoder: Ps2Decoder,
    queue: PacketQueue,
    notify: Arc<Notify>,
    _task_guard: oneshot::Receiver<()>,
}

impl InputEventStream {
    /// Open `path` non-blocking and start polling it
    pub fn open(path: &Path) -> Result<Self> {
        let device = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .with_context(|| format!("Failed to open pointer device {:?}", path))?;
        let fd = device.as_raw_fd();
        let notify = Arc::new(Notify::new());
        let task_notify = notify.clone();

        let (guard, task_guard) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        let mut events = mio::Events::with_capacity(1);

        poll.registry()
            .register(
                &mut mio::unix::SourceFd(&fd),
                mio::Token(0),
                mio::Interest::READABLE,
            )
            .context("Failed to register pointer device with mio")?;

        let timeout = Duration::from_millis(100);
        tokio::task::spawn_blocking(move || loop {
            if guard.is_closed() {
                tracing::info!("Pointer device polling thread shutting down");
                return;
            }

            if let Err(err) = poll.poll(&mut events, Some(timeout)) {
                tracing::warn!("Pointer device poll failed: {:?}", err);
                continue;
            }

            events
                .iter()
                .filter(|event| event.token() == mio::Token(0))
                .for_each(|_| task_notify.notify_one());
        });

        // Bytes may already be pending before the first edge
        notify.notify_one();

        Ok(Self {
            device,
            decoder: Ps2Decoder::new(),
            queue: PacketQueue::new(),
            notify,
            _task_guard: task_guard,
        })
    }

    /// Wait until the device fd becomes readable
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }

    /// Non-blocking: drain the device and return every complete packet
    pub fn poll_packets(&mut self) -> Result<Vec<MotionPacket>> {
        let mut buf = [0u8; 256];
        loop {
            match self.device.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.decoder.feed(&buf[..n], &mut self.queue),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Failed to read pointer device"),
            }
        }

        let mut packets = Vec::with_capacity(self.queue.len());
        let mut out = [0u8; PACKET_SIZE * 16];
        while self.queue.can_read() {
            let n = self.queue.read(&mut out);
            packets.extend(
                out[..n]
                    .chunks_exact(PACKET_SIZE)
                    .map(bytemuck::pod_read_unaligned::<MotionPacket>),
            );
        }
        Ok(packets)
    }
}
