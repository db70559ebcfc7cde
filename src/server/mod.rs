//! Server Module
//!
//! `ServerContext` owns all window server state and turns client requests
//! into window manager operations and replies.

pub mod ipc;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pane_proto::{
    BackingStoreInfo, ClientId, ClientMessage, ProtocolError, Rect, ServerMessage, Size, WindowId,
};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::compositor::Compositor;
use crate::config::Config;
use crate::input::MotionPacket;
use crate::shm::{SharedBufferPool, ShmError};
use crate::wm::WindowManager;
use crate::wm::backing_store::{BITS_PER_PIXEL, BackingStore, BackingStoreError};
use crate::wm::menu::{MenuError, MenuItem};
use crate::wm::window::WindowKey;
use ipc::{ClientSender, ServerEvent};

/// Why a request was rejected; sent back in an `Error` response
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("no window with id {0}")]
    NoSuchWindow(WindowId),

    #[error(transparent)]
    Menu(#[from] MenuError),

    #[error(transparent)]
    SharedBuffer(#[from] ShmError),

    #[error(transparent)]
    BackingStore(#[from] BackingStoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Bound on window coordinates and extents; frame geometry and painting
/// stay well inside `i32` for any rect within it.
const MAX_COORDINATE: i32 = 1 << 15;

fn check_window_rect(rect: Rect) -> Result<(), RequestError> {
    if rect.width() < 0 || rect.height() < 0 {
        return Err(RequestError::InvalidArgument(format!(
            "negative window size {}x{}",
            rect.width(),
            rect.height()
        )));
    }
    let in_range = |value: i32| (-MAX_COORDINATE..=MAX_COORDINATE).contains(&value);
    if !(in_range(rect.x()) && in_range(rect.y()) && in_range(rect.width()) && in_range(rect.height())) {
        return Err(RequestError::InvalidArgument(format!(
            "window rect {:?} is outside +/-{}",
            rect, MAX_COORDINATE
        )));
    }
    Ok(())
}

pub struct ServerContext {
    wm: WindowManager,
    compositor: Compositor,
    pool: SharedBufferPool,
    clipboard: Vec<u8>,
    clients: BTreeMap<ClientId, ClientSender>,
    /// Server-originated notifications queued behind the current reply
    notifications: Vec<(ClientId, ServerMessage)>,
    /// Connections dropped for not draining their queue, cleaned up after
    /// the current step
    stalled: Vec<ClientId>,
    server_pid: i32,
}

impl ServerContext {
    pub fn new(config: &Config, buffer_dir: PathBuf) -> Result<Self> {
        let screen = Size::new(config.screen.width, config.screen.height);
        if screen.is_empty() {
            anyhow::bail!("Invalid screen size {}x{}", screen.width, screen.height);
        }
        std::fs::create_dir_all(&buffer_dir)
            .with_context(|| format!("Failed to create buffer directory {}", buffer_dir.display()))?;

        let mut wm = WindowManager::new(screen, config);
        let compositor = Compositor::new(&mut wm, config).context("Failed to initialize compositor")?;
        let pool = SharedBufferPool::new(buffer_dir, config.server.max_shared_buffer_size);
        Ok(Self {
            wm,
            compositor,
            pool,
            clipboard: Vec::new(),
            clients: BTreeMap::new(),
            notifications: Vec::new(),
            stalled: Vec::new(),
            server_pid: std::process::id() as i32,
        })
    }

    pub fn wm(&self) -> &WindowManager {
        &self.wm
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { client, sender } => self.client_connected(client, sender),
            ServerEvent::Message { client, kind, .. } if !self.clients.contains_key(&client) => {
                trace!("Ignoring request {} from dropped client {}", kind, client);
            }
            ServerEvent::Message {
                client,
                kind,
                window_id,
                message,
            } => match message {
                Ok(message) => self.handle_request(client, message),
                Err(e) => {
                    warn!("Client {} sent an undecodable request: {}", client, e);
                    self.deliver_pending();
                    self.send(
                        client,
                        ServerMessage::Error {
                            window_id,
                            request: kind,
                            reason: e.to_string(),
                        },
                    );
                    self.drop_stalled_clients();
                }
            },
            ServerEvent::Disconnected { client } => self.client_disconnected(client),
        }
    }

    pub fn client_connected(&mut self, client: ClientId, sender: ClientSender) {
        self.clients.insert(client, sender);
    }

    /// Tear down everything a lost connection owned
    pub fn client_disconnected(&mut self, client: ClientId) {
        info!("Cleaning up after client {}", client);
        self.clients.remove(&client);
        self.wm.destroy_client(client);
        self.pool.release_client(client);
        self.notifications.retain(|(recipient, _)| *recipient != client);
    }

    /// Answer one request. Replies are sent ahead of the notifications the
    /// request caused.
    pub fn handle_request(&mut self, client: ClientId, message: ClientMessage) {
        self.deliver_pending();
        let kind = message.kind();
        let window_id = message.window_id().unwrap_or(-1);
        trace!("Client {} request {:?}", client, kind);

        match self.dispatch(client, message) {
            Ok(Some(reply)) => self.send(client, reply),
            Ok(None) => {}
            Err(e) => {
                warn!("Rejecting {:?} from client {}: {}", kind, client, e);
                self.send(
                    client,
                    ServerMessage::Error {
                        window_id,
                        request: kind as u32,
                        reason: e.to_string(),
                    },
                );
            }
        }
        self.deliver_pending();
        self.drop_stalled_clients();
    }

    /// Apply pointer packets in order, compositing after each so damage
    /// never spans two input events
    pub fn process_motion_packets(&mut self, packets: &[MotionPacket]) {
        for packet in packets {
            self.wm.process_motion_packet(packet);
            self.flush();
        }
    }

    /// Compose damaged regions, release retired buffers and deliver queued
    /// notifications
    pub fn flush(&mut self) {
        for store in self.compositor.compose(&mut self.wm) {
            if store.is_server_allocated() {
                trace!("Releasing server buffer {}", store.shared_buffer_id());
                self.pool.release(store.shared_buffer_id());
            }
        }
        self.deliver_pending();
        self.drop_stalled_clients();
    }

    fn send(&mut self, client: ClientId, message: ServerMessage) {
        let Some(sender) = self.clients.get(&client) else {
            return;
        };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Client {} stopped reading its messages, disconnecting", client);
                self.clients.remove(&client);
                self.stalled.push(client);
            }
            Err(TrySendError::Closed(_)) => debug!("Client {} is gone, dropping message", client),
        }
    }

    fn drop_stalled_clients(&mut self) {
        while let Some(client) = self.stalled.pop() {
            self.client_disconnected(client);
        }
    }

    fn deliver_pending(&mut self) {
        let mut pending = self.wm.take_outbox();
        pending.append(&mut self.notifications);
        for (client, message) in pending {
            self.send(client, message);
        }
    }

    fn window_key(&self, client: ClientId, window_id: WindowId) -> Result<WindowKey, RequestError> {
        let key = WindowKey::new(client, window_id);
        match self.wm.window(key) {
            Some(_) => Ok(key),
            None => Err(RequestError::NoSuchWindow(window_id)),
        }
    }

    fn dispatch(&mut self, client: ClientId, message: ClientMessage) -> Result<Option<ServerMessage>, RequestError> {
        let reply = match message {
            ClientMessage::Greeting { client_pid } => {
                debug!("Greeting from client {} (pid {})", client, client_pid);
                ServerMessage::Greeting {
                    client_id: client,
                    server_pid: self.server_pid,
                    screen_rect: self.wm.screen_rect(),
                }
            }

            // ---- menus ----
            ClientMessage::CreateMenubar => ServerMessage::DidCreateMenubar {
                menubar_id: self.wm.menus_mut().create_menubar(client),
            },
            ClientMessage::DestroyMenubar { menubar_id } => {
                self.wm.invalidate_menubar();
                self.wm.menus_mut().destroy_menubar(client, menubar_id)?;
                ServerMessage::DidDestroyMenubar { menubar_id }
            }
            ClientMessage::CreateMenu { name } => ServerMessage::DidCreateMenu {
                menu_id: self.wm.menus_mut().create_menu(client, &name),
            },
            ClientMessage::DestroyMenu { menu_id } => {
                self.wm.invalidate_menubar();
                self.wm.menus_mut().destroy_menu(client, menu_id)?;
                self.wm.invalidate_menubar();
                ServerMessage::DidDestroyMenu { menu_id }
            }
            ClientMessage::AddMenuToMenubar { menubar_id, menu_id } => {
                self.wm.menus_mut().add_menu_to_menubar(client, menubar_id, menu_id)?;
                self.wm.invalidate_menubar();
                ServerMessage::DidAddMenuToMenubar { menubar_id, menu_id }
            }
            ClientMessage::SetApplicationMenubar { menubar_id } => {
                self.wm.invalidate_menubar();
                self.wm.menus_mut().set_application_menubar(client, menubar_id)?;
                self.wm.invalidate_menubar();
                ServerMessage::DidSetApplicationMenubar { menubar_id }
            }
            ClientMessage::AddMenuItem {
                menu_id,
                identifier,
                text,
                shortcut,
            } => {
                let item = MenuItem::Action {
                    identifier,
                    text,
                    shortcut,
                };
                self.wm.menus_mut().add_item(client, menu_id, item)?;
                ServerMessage::DidAddMenuItem { menu_id, identifier }
            }
            ClientMessage::AddMenuSeparator { menu_id } => {
                self.wm.menus_mut().add_item(client, menu_id, MenuItem::Separator)?;
                ServerMessage::DidAddMenuSeparator { menu_id }
            }

            // ---- windows ----
            ClientMessage::CreateWindow(params) => {
                check_window_rect(params.rect)?;
                ServerMessage::DidCreateWindow {
                    window_id: self.wm.create_window(client, &params),
                }
            }
            ClientMessage::DestroyWindow { window_id } => {
                let key = self.window_key(client, window_id)?;
                self.wm.destroy_window(key);
                ServerMessage::DidDestroyWindow { window_id }
            }
            ClientMessage::SetWindowTitle { window_id, title } => {
                let key = self.window_key(client, window_id)?;
                self.wm.set_window_title(key, &title);
                return Ok(None);
            }
            ClientMessage::GetWindowTitle { window_id } => {
                let key = self.window_key(client, window_id)?;
                let title = self.wm.window(key).map(|w| w.title().to_owned()).unwrap_or_default();
                ServerMessage::DidGetWindowTitle { window_id, title }
            }
            ClientMessage::SetWindowRect { window_id, rect } => {
                let key = self.window_key(client, window_id)?;
                check_window_rect(rect)?;
                self.wm.set_window_rect(key, rect);
                return Ok(None);
            }
            ClientMessage::GetWindowRect { window_id } => {
                let key = self.window_key(client, window_id)?;
                let rect = self.wm.window(key).map(|w| w.rect()).unwrap_or_default();
                ServerMessage::DidGetWindowRect { window_id, rect }
            }
            ClientMessage::InvalidateRect { window_id, rect } => {
                let key = self.window_key(client, window_id)?;
                self.wm.invalidate_window_content(key, rect);
                return Ok(None);
            }
            ClientMessage::DidFinishPainting { window_id, rect } => {
                let key = self.window_key(client, window_id)?;
                self.wm.did_finish_painting(key, rect);
                return Ok(None);
            }
            ClientMessage::GetWindowBackingStore { window_id } => {
                let key = self.window_key(client, window_id)?;
                let backing = self.allocate_backing_store(client, key)?;
                ServerMessage::DidGetWindowBackingStore { window_id, backing }
            }
            ClientMessage::SetWindowBackingStore {
                window_id,
                backing,
                flush_immediately,
            } => {
                let key = self.window_key(client, window_id)?;
                let buffer = self.pool.get_for_client(backing.shared_buffer_id, client)?;
                let store = BackingStore::attach(backing, buffer, false)?;
                self.wm.set_backing_store(key, store, flush_immediately);
                ServerMessage::DidSetWindowBackingStore {
                    window_id,
                    shared_buffer_id: backing.shared_buffer_id,
                }
            }
            ClientMessage::SetGlobalCursorTracking { window_id, enabled } => {
                let key = self.window_key(client, window_id)?;
                if let Some(window) = self.wm.window_mut(key) {
                    window.global_cursor_tracking = enabled;
                }
                return Ok(None);
            }
            ClientMessage::SetWindowOpacity { window_id, opacity } => {
                let key = self.window_key(client, window_id)?;
                self.wm.set_window_opacity(key, opacity);
                return Ok(None);
            }
            ClientMessage::SetWindowOverrideCursor { window_id, cursor } => {
                let key = self.window_key(client, window_id)?;
                if let Some(window) = self.wm.window_mut(key) {
                    window.override_cursor = cursor;
                }
                return Ok(None);
            }

            // ---- clipboard ----
            ClientMessage::GetClipboardContents => {
                if self.clipboard.is_empty() {
                    ServerMessage::DidGetClipboardContents {
                        shared_buffer_id: -1,
                        contents_size: 0,
                    }
                } else {
                    let buffer = self.pool.create_with_contents(&self.clipboard, client)?;
                    ServerMessage::DidGetClipboardContents {
                        shared_buffer_id: buffer.id(),
                        contents_size: self.clipboard.len() as i32,
                    }
                }
            }
            ClientMessage::SetClipboardContents {
                shared_buffer_id,
                contents_size,
            } => {
                let size = usize::try_from(contents_size).map_err(|_| {
                    RequestError::InvalidArgument(format!("negative clipboard size {contents_size}"))
                })?;
                if size == 0 {
                    self.clipboard.clear();
                } else {
                    let buffer = self.pool.get_for_client(shared_buffer_id, client)?;
                    if size > buffer.size() {
                        return Err(RequestError::InvalidArgument(format!(
                            "clipboard size {} exceeds shared buffer {} of {} bytes",
                            size,
                            shared_buffer_id,
                            buffer.size()
                        )));
                    }
                    self.clipboard = buffer.bytes()[..size].to_vec();
                }
                debug!("Clipboard set by client {} ({} bytes)", client, size);
                let changed = ServerMessage::ClipboardContentsChanged { contents_size };
                let recipients: Vec<ClientId> = self.clients.keys().copied().collect();
                for recipient in recipients {
                    self.notifications.push((recipient, changed.clone()));
                }
                ServerMessage::DidSetClipboardContents {
                    shared_buffer_id,
                    contents_size,
                }
            }

            // ---- wallpaper ----
            ClientMessage::SetWallpaper { path } => {
                let success = match self.compositor.set_wallpaper(Path::new(&path)) {
                    Ok(()) => {
                        self.wm.invalidate_screen();
                        true
                    }
                    Err(e) => {
                        warn!("Failed to set wallpaper: {:#}", e);
                        false
                    }
                };
                ServerMessage::DidSetWallpaper { success }
            }
            ClientMessage::GetWallpaper => ServerMessage::DidGetWallpaper {
                path: self
                    .compositor
                    .wallpaper_path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
            },

            // ---- taskbar and switcher ----
            ClientMessage::WmSetActiveWindow { client_id, window_id } => {
                let key = self.window_key(client_id, window_id)?;
                self.wm.set_minimized(key, false);
                self.wm.move_to_front_and_make_active(key);
                return Ok(None);
            }
            ClientMessage::WmSetHighlightWindow { client_id, window_id } => {
                let key = (window_id >= 0).then(|| WindowKey::new(client_id, window_id));
                self.wm.set_highlight_window(key);
                return Ok(None);
            }

            // ---- shared buffers ----
            ClientMessage::CreateSharedBuffer { size } => {
                let len = usize::try_from(size)
                    .map_err(|_| RequestError::InvalidArgument(format!("negative buffer size {size}")))?;
                let buffer = self.pool.create(len, client)?;
                ServerMessage::DidCreateSharedBuffer {
                    shared_buffer_id: buffer.id(),
                    size,
                }
            }
            ClientMessage::ReleaseSharedBuffer { shared_buffer_id } => {
                self.pool.get_for_client(shared_buffer_id, client)?;
                self.pool.release(shared_buffer_id);
                ServerMessage::DidReleaseSharedBuffer { shared_buffer_id }
            }
        };
        Ok(Some(reply))
    }

    /// Allocate a server-owned store sized to the window
    fn allocate_backing_store(&mut self, client: ClientId, key: WindowKey) -> Result<BackingStoreInfo, RequestError> {
        let (size, has_alpha_channel) = self
            .wm
            .window(key)
            .map(|window| (window.size(), window.has_alpha_channel))
            .ok_or(RequestError::NoSuchWindow(key.window_id))?;
        let too_large = || {
            RequestError::InvalidArgument(format!(
                "backing store of {}x{} does not fit in memory",
                size.width, size.height
            ))
        };
        let pitch = u32::try_from(size.width)
            .ok()
            .and_then(|width| width.checked_mul(BITS_PER_PIXEL / 8))
            .ok_or_else(too_large)?;
        let len = usize::try_from(size.height)
            .ok()
            .and_then(|height| (pitch as usize).checked_mul(height))
            .ok_or_else(too_large)?;
        let buffer = self.pool.create(len, client)?;
        let info = BackingStoreInfo {
            size,
            bits_per_pixel: BITS_PER_PIXEL,
            pitch,
            shared_buffer_id: buffer.id(),
            has_alpha_channel,
        };
        let store = BackingStore::attach(info, buffer, true)?;
        let info = store.info();
        self.wm.set_backing_store(key, store, false);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pane_proto::{ClientMessageKind, CreateWindowParams, Point};
    use tokio::sync::mpsc;

    struct Harness {
        _dir: tempfile::TempDir,
        server: ServerContext,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.screen.width = 320;
        config.screen.height = 240;
        config.compositor.draw_cursor = false;
        let server = ServerContext::new(&config, dir.path().join("buffers")).unwrap();
        Harness { _dir: dir, server }
    }

    fn connect(server: &mut ServerContext, client: ClientId) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(ipc::CLIENT_QUEUE_CAPACITY);
        server.client_connected(client, tx);
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn create_window(
        server: &mut ServerContext,
        rx: &mut mpsc::Receiver<ServerMessage>,
        client: ClientId,
    ) -> WindowId {
        server.handle_request(
            client,
            ClientMessage::CreateWindow(CreateWindowParams::normal(Rect::new(20, 40, 40, 30), "w")),
        );
        match rx.try_recv() {
            Ok(ServerMessage::DidCreateWindow { window_id }) => window_id,
            other => panic!("expected DidCreateWindow, got {other:?}"),
        }
    }

    #[test]
    fn test_greeting_reports_client_and_screen() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 5);
        h.server.handle_request(5, ClientMessage::Greeting { client_pid: 42 });
        match &drain(&mut rx)[..] {
            [ServerMessage::Greeting { client_id, screen_rect, .. }] => {
                assert_eq!(*client_id, 5);
                assert_eq!(*screen_rect, Rect::new(0, 0, 320, 240));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_create_window_reply_precedes_notifications() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        h.server.handle_request(
            1,
            ClientMessage::CreateWindow(CreateWindowParams::normal(Rect::new(20, 40, 40, 30), "w")),
        );
        let messages = drain(&mut rx);
        assert_eq!(messages[0], ServerMessage::DidCreateWindow { window_id: 1 });
        assert!(messages[1..].iter().any(|m| matches!(m, ServerMessage::Paint { window_id: 1, .. })));
    }

    #[test]
    fn test_unknown_window_is_rejected_with_error() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        h.server.handle_request(1, ClientMessage::GetWindowRect { window_id: 77 });
        match &drain(&mut rx)[..] {
            [ServerMessage::Error { window_id, request, .. }] => {
                assert_eq!(*window_id, 77);
                assert_eq!(*request, ClientMessageKind::GetWindowRect as u32);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_window_rect_is_rejected_with_error() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        for rect in [
            Rect::new(i32::MIN + 1, 40, 100, 100),
            Rect::new(10, i32::MAX - 50, 100, 100),
            Rect::new(10, 30, 1 << 30, 1),
        ] {
            h.server.handle_request(
                1,
                ClientMessage::CreateWindow(CreateWindowParams::normal(rect, "w")),
            );
            match &drain(&mut rx)[..] {
                [ServerMessage::Error { request, .. }] => {
                    assert_eq!(*request, ClientMessageKind::CreateWindow as u32);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(h.server.wm().window_count(), 0);

        let window_id = create_window(&mut h.server, &mut rx, 1);
        drain(&mut rx);
        h.server.handle_request(
            1,
            ClientMessage::SetWindowRect {
                window_id,
                rect: Rect::new(i32::MAX - 10, 0, 50, 50),
            },
        );
        assert!(matches!(drain(&mut rx)[..], [ServerMessage::Error { .. }]));
        let key = WindowKey::new(1, window_id);
        assert_eq!(h.server.wm().window(key).unwrap().rect(), Rect::new(20, 40, 40, 30));
    }

    #[test]
    fn test_oversized_backing_store_is_rejected_with_error() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        h.server.handle_request(
            1,
            ClientMessage::CreateWindow(CreateWindowParams::normal(
                Rect::new(0, 30, MAX_COORDINATE, MAX_COORDINATE),
                "huge",
            )),
        );
        let Some(ServerMessage::DidCreateWindow { window_id }) = drain(&mut rx).into_iter().next() else {
            panic!("expected the window to be created");
        };

        h.server.handle_request(1, ClientMessage::GetWindowBackingStore { window_id });
        match &drain(&mut rx)[..] {
            [ServerMessage::Error { request, .. }] => {
                assert_eq!(*request, ClientMessageKind::GetWindowBackingStore as u32);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(h.server.pool.is_empty());
        h.server.flush();
    }

    #[test]
    fn test_windows_of_other_clients_are_not_addressable() {
        let mut h = harness();
        let mut rx1 = connect(&mut h.server, 1);
        let mut rx2 = connect(&mut h.server, 2);
        let window_id = create_window(&mut h.server, &mut rx1, 1);
        h.server.handle_request(2, ClientMessage::DestroyWindow { window_id });
        assert!(matches!(drain(&mut rx2)[..], [ServerMessage::Error { .. }]));
        assert_eq!(h.server.wm().window_count(), 1);
    }

    #[test]
    fn test_undecodable_request_gets_error_with_raw_kind() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        h.server.handle_event(ServerEvent::Message {
            client: 1,
            kind: 500,
            window_id: 3,
            message: Err(ProtocolError::UnknownKind(500)),
        });
        assert!(matches!(
            drain(&mut rx)[..],
            [ServerMessage::Error { window_id: 3, request: 500, .. }]
        ));
    }

    #[test]
    fn test_server_allocated_store_is_released_after_replacement() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        let window_id = create_window(&mut h.server, &mut rx, 1);
        drain(&mut rx);

        h.server.handle_request(1, ClientMessage::GetWindowBackingStore { window_id });
        let first = match &drain(&mut rx)[..] {
            [ServerMessage::DidGetWindowBackingStore { backing, .. }] => *backing,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(first.pitch, 40 * 4);
        assert_eq!(first.size, Size::new(40, 30));
        let first_path = h.server.pool.shared_buffer_path(first.shared_buffer_id);
        assert!(first_path.exists());

        h.server.handle_request(1, ClientMessage::GetWindowBackingStore { window_id });
        h.server.flush();
        assert!(h.server.pool.get(first.shared_buffer_id).is_none());
        assert!(!first_path.exists());
    }

    #[test]
    fn test_client_backing_store_must_fit_buffer() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        let window_id = create_window(&mut h.server, &mut rx, 1);
        h.server.handle_request(1, ClientMessage::CreateSharedBuffer { size: 100 });
        let id = drain(&mut rx)
            .into_iter()
            .find_map(|m| match m {
                ServerMessage::DidCreateSharedBuffer { shared_buffer_id, .. } => Some(shared_buffer_id),
                _ => None,
            })
            .unwrap();

        let backing = BackingStoreInfo {
            size: Size::new(40, 30),
            bits_per_pixel: 32,
            pitch: 160,
            shared_buffer_id: id,
            has_alpha_channel: false,
        };
        h.server.handle_request(
            1,
            ClientMessage::SetWindowBackingStore {
                window_id,
                backing,
                flush_immediately: true,
            },
        );
        assert!(matches!(drain(&mut rx)[..], [ServerMessage::Error { .. }]));
    }

    #[test]
    fn test_clipboard_round_trip_through_shared_buffers() {
        let mut h = harness();
        let mut rx1 = connect(&mut h.server, 1);
        let mut rx2 = connect(&mut h.server, 2);

        h.server.handle_request(1, ClientMessage::CreateSharedBuffer { size: 16 });
        let ServerMessage::DidCreateSharedBuffer { shared_buffer_id, .. } = drain(&mut rx1)[0] else {
            panic!("expected a buffer");
        };
        let path = h.server.pool.shared_buffer_path(shared_buffer_id);
        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();
        let mut map = unsafe { memmap2::MmapMut::map_mut(&file) }.unwrap();
        map[..5].copy_from_slice(b"hello");
        drop(map);

        h.server.handle_request(
            1,
            ClientMessage::SetClipboardContents {
                shared_buffer_id,
                contents_size: 5,
            },
        );
        let messages = drain(&mut rx1);
        assert!(matches!(messages[0], ServerMessage::DidSetClipboardContents { contents_size: 5, .. }));
        assert_eq!(messages[1], ServerMessage::ClipboardContentsChanged { contents_size: 5 });
        assert_eq!(
            drain(&mut rx2),
            vec![ServerMessage::ClipboardContentsChanged { contents_size: 5 }]
        );

        h.server.handle_request(2, ClientMessage::GetClipboardContents);
        let ServerMessage::DidGetClipboardContents {
            shared_buffer_id,
            contents_size,
        } = drain(&mut rx2)[0]
        else {
            panic!("expected clipboard contents");
        };
        assert_eq!(contents_size, 5);
        let bytes = std::fs::read(h.server.pool.shared_buffer_path(shared_buffer_id)).unwrap();
        assert_eq!(&bytes[..5], b"hello");
    }

    #[test]
    fn test_clipboard_size_beyond_buffer_is_rejected() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        h.server.handle_request(1, ClientMessage::CreateSharedBuffer { size: 4 });
        drain(&mut rx);
        h.server.handle_request(
            1,
            ClientMessage::SetClipboardContents {
                shared_buffer_id: 1,
                contents_size: 8,
            },
        );
        assert!(matches!(drain(&mut rx)[..], [ServerMessage::Error { .. }]));
    }

    #[test]
    fn test_disconnect_drops_windows_and_buffers() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        create_window(&mut h.server, &mut rx, 1);
        h.server.handle_request(1, ClientMessage::CreateSharedBuffer { size: 64 });
        assert_eq!(h.server.pool.len(), 1);

        h.server.handle_event(ServerEvent::Disconnected { client: 1 });
        assert_eq!(h.server.wm().window_count(), 0);
        assert!(h.server.pool.is_empty());
        assert_eq!(h.server.client_count(), 0);
    }

    #[test]
    fn test_client_that_stops_reading_is_disconnected() {
        let mut h = harness();
        let (tx, _rx) = mpsc::channel(2);
        h.server.client_connected(1, tx);
        h.server.handle_request(1, ClientMessage::GetWallpaper);
        h.server.handle_request(1, ClientMessage::GetWallpaper);
        assert_eq!(h.server.client_count(), 1);

        // The reply no longer fits, so the connection is dropped with its window
        let create = || ClientMessage::CreateWindow(CreateWindowParams::normal(Rect::new(20, 40, 40, 30), "w"));
        h.server.handle_request(1, create());
        assert_eq!(h.server.client_count(), 0);
        assert_eq!(h.server.wm().window_count(), 0);

        // Requests still in flight from that connection are ignored
        h.server.handle_event(ServerEvent::Message {
            client: 1,
            kind: ClientMessageKind::CreateWindow as u32,
            window_id: -1,
            message: Ok(create()),
        });
        assert_eq!(h.server.wm().window_count(), 0);
    }

    #[test]
    fn test_taskbar_activation_restores_minimized_window() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        let window_id = create_window(&mut h.server, &mut rx, 1);
        let key = WindowKey::new(1, window_id);
        h.server.wm.set_minimized(key, true);

        h.server.handle_request(
            9,
            ClientMessage::WmSetActiveWindow {
                client_id: 1,
                window_id,
            },
        );
        assert!(!h.server.wm().window(key).unwrap().minimized);
        assert_eq!(h.server.wm().active_window(), Some(key));
    }

    #[test]
    fn test_each_motion_packet_is_composited_before_the_next() {
        let mut h = harness();
        h.server.flush();
        let before = h.server.compositor().frames();
        let start = h.server.wm().cursor_position();

        let step = MotionPacket { dx: 5, dy: 0, buttons: 0 };
        h.server.process_motion_packets(&[step, step]);
        assert_eq!(h.server.compositor().frames(), before + 2);
        assert_eq!(h.server.wm().cursor_position(), Point::new(start.x + 10, start.y));
        assert!(h.server.wm().damage().is_empty());
    }

    #[test]
    fn test_menu_item_activation_reaches_owner() {
        let mut h = harness();
        let mut rx = connect(&mut h.server, 1);
        create_window(&mut h.server, &mut rx, 1);
        h.server.handle_request(1, ClientMessage::CreateMenubar);
        h.server.handle_request(1, ClientMessage::CreateMenu { name: "File".into() });
        h.server.handle_request(
            1,
            ClientMessage::AddMenuItem {
                menu_id: 1,
                identifier: 3,
                text: "New".into(),
                shortcut: String::new(),
            },
        );
        h.server.handle_request(1, ClientMessage::AddMenuToMenubar { menubar_id: 1, menu_id: 1 });
        h.server.handle_request(1, ClientMessage::SetApplicationMenubar { menubar_id: 1 });
        assert!(!drain(&mut rx).iter().any(|m| matches!(m, ServerMessage::Error { .. })));

        use crate::wm::events::{MouseEvent, MouseEventKind};
        use pane_proto::{MouseButton, MouseButtons};
        let click = |kind, x, y| MouseEvent::new(kind, Point::new(x, y), MouseButton::Left, MouseButtons::empty());
        h.server.wm.process_mouse_event(click(MouseEventKind::Down, 8, 5));
        h.server.wm.process_mouse_event(click(MouseEventKind::Down, 8, 24));
        h.server.flush();
        assert!(drain(&mut rx).contains(&ServerMessage::MenuItemActivated { menu_id: 1, identifier: 3 }));
    }
}
