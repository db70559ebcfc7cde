//! Client connections over the window server's Unix socket
//!
//! Every connection gets a reader task that decodes fixed-size records into
//! requests and a writer task that encodes queued notifications. The run loop
//! only ever sees `ServerEvent`s.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pane_proto::{ClientId, ClientMessage, ProtocolError, ServerMessage, WindowId, read_record, write_record};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Per-connection sender for server→client messages
pub type ClientSender = mpsc::Sender<ServerMessage>;

/// Messages a connection may have queued before it counts as stalled
pub const CLIENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        client: ClientId,
        sender: ClientSender,
    },
    /// A request record. Decoding failures carry the raw kind and window
    /// so the request can be rejected with an `Error` response.
    Message {
        client: ClientId,
        kind: u32,
        window_id: WindowId,
        message: Result<ClientMessage, ProtocolError>,
    },
    Disconnected {
        client: ClientId,
    },
}

/// Listening socket, not yet accepting
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Bind `path`, replacing a stale socket left by an earlier run
    pub fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind {}", path.display()))?;
        info!("IPC server listening on {:?}", path);
        Ok(Self {
            listener,
            path: path.to_owned(),
        })
    }

    /// Start accepting connections (spawns a background task)
    pub fn start(self) -> IpcHandle {
        let (event_tx, event_rx) = mpsc::channel(256);
        let listener = self.listener;

        tokio::spawn(async move {
            let mut next_client_id: ClientId = 1;
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let client = next_client_id;
                        next_client_id += 1;
                        info!("Client {} connected", client);
                        if !spawn_client(client, stream, event_tx.clone()).await {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            debug!("Acceptor task ended");
        });

        IpcHandle {
            events: event_rx,
            path: self.path,
        }
    }
}

/// Handle for the run loop; removes the socket when dropped
pub struct IpcHandle {
    pub events: mpsc::Receiver<ServerEvent>,
    path: PathBuf,
}

impl Drop for IpcHandle {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove socket {:?}: {}", self.path, e);
        }
    }
}

/// Register a connection and spawn its tasks. Returns false once the run
/// loop has gone away.
async fn spawn_client(client: ClientId, stream: UnixStream, events: mpsc::Sender<ServerEvent>) -> bool {
    let (mut reader, mut writer) = stream.into_split();
    let (sender, mut outgoing) = mpsc::channel::<ServerMessage>(CLIENT_QUEUE_CAPACITY);

    if events.send(ServerEvent::Connected { client, sender }).await.is_err() {
        return false;
    }

    // Reader task (client → server)
    tokio::spawn(async move {
        loop {
            let raw = match read_record(&mut reader).await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    warn!("Client {}: {}", client, e);
                    break;
                }
            };
            let message = ClientMessage::decode(&raw);
            if let Ok(message) = &message {
                debug!("Client {} sent {:?}", client, message.kind());
            }
            let event = ServerEvent::Message {
                client,
                kind: raw.kind,
                window_id: raw.window_id,
                message,
            };
            if events.send(event).await.is_err() {
                return;
            }
        }
        info!("Client {} disconnected", client);
        let _ = events.send(ServerEvent::Disconnected { client }).await;
    });

    // Writer task (server → client); ends when the run loop drops the sender
    tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            if let Err(e) = write_record(&mut writer, &message.encode()).await {
                debug!("Client {} write failed: {}", client, e);
                break;
            }
        }
        debug!("Writer task for client {} ended", client);
    });

    true
}
