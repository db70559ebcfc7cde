//! Server → client responses and notifications

use crate::error::ProtocolError;
use crate::geometry::{Point, Rect, Size};
use crate::types::{
    BackingStoreInfo, ClientId, KeyModifiers, MenuId, MenubarId, MouseButton, MouseButtons,
    SharedBufferId, WindowId, WindowType,
};
use crate::wire::{PayloadReader, RawMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ServerMessageKind {
    Invalid = 0,
    Error,
    Paint,
    MouseMove,
    MouseDown,
    MouseUp,
    WindowEntered,
    WindowLeft,
    KeyDown,
    KeyUp,
    WindowActivated,
    WindowDeactivated,
    WindowResized,
    WindowCloseRequest,
    MenuItemActivated,
    DidCreateMenubar,
    DidDestroyMenubar,
    DidCreateMenu,
    DidDestroyMenu,
    DidAddMenuToMenubar,
    DidSetApplicationMenubar,
    DidAddMenuItem,
    DidAddMenuSeparator,
    DidCreateWindow,
    DidDestroyWindow,
    DidGetWindowTitle,
    DidGetWindowRect,
    DidGetWindowBackingStore,
    Greeting,
    DidGetClipboardContents,
    DidSetClipboardContents,
    DidSetWindowBackingStore,
    DidSetWallpaper,
    DidGetWallpaper,
    ScreenRectChanged,
    WmWindowRemoved,
    WmWindowStateChanged,
    ClipboardContentsChanged,
    DidCreateSharedBuffer,
    DidReleaseSharedBuffer,
}

impl ServerMessageKind {
    const ALL: [Self; 40] = [
        Self::Invalid,
        Self::Error,
        Self::Paint,
        Self::MouseMove,
        Self::MouseDown,
        Self::MouseUp,
        Self::WindowEntered,
        Self::WindowLeft,
        Self::KeyDown,
        Self::KeyUp,
        Self::WindowActivated,
        Self::WindowDeactivated,
        Self::WindowResized,
        Self::WindowCloseRequest,
        Self::MenuItemActivated,
        Self::DidCreateMenubar,
        Self::DidDestroyMenubar,
        Self::DidCreateMenu,
        Self::DidDestroyMenu,
        Self::DidAddMenuToMenubar,
        Self::DidSetApplicationMenubar,
        Self::DidAddMenuItem,
        Self::DidAddMenuSeparator,
        Self::DidCreateWindow,
        Self::DidDestroyWindow,
        Self::DidGetWindowTitle,
        Self::DidGetWindowRect,
        Self::DidGetWindowBackingStore,
        Self::Greeting,
        Self::DidGetClipboardContents,
        Self::DidSetClipboardContents,
        Self::DidSetWindowBackingStore,
        Self::DidSetWallpaper,
        Self::DidGetWallpaper,
        Self::ScreenRectChanged,
        Self::WmWindowRemoved,
        Self::WmWindowStateChanged,
        Self::ClipboardContentsChanged,
        Self::DidCreateSharedBuffer,
        Self::DidReleaseSharedBuffer,
    ];
}

impl TryFrom<u32> for ServerMessageKind {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, ProtocolError> {
        Self::ALL
            .get(value as usize)
            .copied()
            .filter(|kind| *kind != Self::Invalid)
            .ok_or(ProtocolError::UnknownKind(value))
    }
}

/// Pointer event payload; `position` is window-local
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEventInfo {
    pub position: Point,
    pub button: MouseButton,
    pub buttons: MouseButtons,
    pub modifiers: KeyModifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEventInfo {
    pub character: u8,
    pub key: u8,
    pub modifiers: KeyModifiers,
}

/// Window summary sent to taskbars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowStateInfo {
    pub client_id: ClientId,
    pub window_id: WindowId,
    pub rect: Rect,
    pub is_active: bool,
    pub is_minimized: bool,
    pub window_type: WindowType,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Failure response; `request` is the rejected request's kind
    Error { window_id: WindowId, request: u32, reason: String },
    Paint { window_id: WindowId, rect: Rect, window_size: Size },
    MouseMove { window_id: WindowId, mouse: MouseEventInfo },
    MouseDown { window_id: WindowId, mouse: MouseEventInfo },
    MouseUp { window_id: WindowId, mouse: MouseEventInfo },
    WindowEntered { window_id: WindowId },
    WindowLeft { window_id: WindowId },
    KeyDown { window_id: WindowId, key: KeyEventInfo },
    KeyUp { window_id: WindowId, key: KeyEventInfo },
    WindowActivated { window_id: WindowId },
    WindowDeactivated { window_id: WindowId },
    WindowResized { window_id: WindowId, rect: Rect, old_rect: Rect },
    WindowCloseRequest { window_id: WindowId },
    MenuItemActivated { menu_id: MenuId, identifier: u32 },
    DidCreateMenubar { menubar_id: MenubarId },
    DidDestroyMenubar { menubar_id: MenubarId },
    DidCreateMenu { menu_id: MenuId },
    DidDestroyMenu { menu_id: MenuId },
    DidAddMenuToMenubar { menubar_id: MenubarId, menu_id: MenuId },
    DidSetApplicationMenubar { menubar_id: MenubarId },
    DidAddMenuItem { menu_id: MenuId, identifier: u32 },
    DidAddMenuSeparator { menu_id: MenuId },
    DidCreateWindow { window_id: WindowId },
    DidDestroyWindow { window_id: WindowId },
    DidGetWindowTitle { window_id: WindowId, title: String },
    DidGetWindowRect { window_id: WindowId, rect: Rect },
    DidGetWindowBackingStore { window_id: WindowId, backing: BackingStoreInfo },
    Greeting { client_id: ClientId, server_pid: i32, screen_rect: Rect },
    DidGetClipboardContents { shared_buffer_id: SharedBufferId, contents_size: i32 },
    DidSetClipboardContents { shared_buffer_id: SharedBufferId, contents_size: i32 },
    DidSetWindowBackingStore { window_id: WindowId, shared_buffer_id: SharedBufferId },
    DidSetWallpaper { success: bool },
    DidGetWallpaper { path: String },
    ScreenRectChanged { rect: Rect },
    WmWindowRemoved { client_id: ClientId, window_id: WindowId },
    WmWindowStateChanged(WindowStateInfo),
    /// Clipboard changed; fetch the new contents with a clipboard request
    ClipboardContentsChanged { contents_size: i32 },
    DidCreateSharedBuffer { shared_buffer_id: SharedBufferId, size: i32 },
    DidReleaseSharedBuffer { shared_buffer_id: SharedBufferId },
}

impl ServerMessage {
    pub fn kind(&self) -> ServerMessageKind {
        use ServerMessageKind as K;
        match self {
            Self::Error { .. } => K::Error,
            Self::Paint { .. } => K::Paint,
            Self::MouseMove { .. } => K::MouseMove,
            Self::MouseDown { .. } => K::MouseDown,
            Self::MouseUp { .. } => K::MouseUp,
            Self::WindowEntered { .. } => K::WindowEntered,
            Self::WindowLeft { .. } => K::WindowLeft,
            Self::KeyDown { .. } => K::KeyDown,
            Self::KeyUp { .. } => K::KeyUp,
            Self::WindowActivated { .. } => K::WindowActivated,
            Self::WindowDeactivated { .. } => K::WindowDeactivated,
            Self::WindowResized { .. } => K::WindowResized,
            Self::WindowCloseRequest { .. } => K::WindowCloseRequest,
            Self::MenuItemActivated { .. } => K::MenuItemActivated,
            Self::DidCreateMenubar { .. } => K::DidCreateMenubar,
            Self::DidDestroyMenubar { .. } => K::DidDestroyMenubar,
            Self::DidCreateMenu { .. } => K::DidCreateMenu,
            Self::DidDestroyMenu { .. } => K::DidDestroyMenu,
            Self::DidAddMenuToMenubar { .. } => K::DidAddMenuToMenubar,
            Self::DidSetApplicationMenubar { .. } => K::DidSetApplicationMenubar,
            Self::DidAddMenuItem { .. } => K::DidAddMenuItem,
            Self::DidAddMenuSeparator { .. } => K::DidAddMenuSeparator,
            Self::DidCreateWindow { .. } => K::DidCreateWindow,
            Self::DidDestroyWindow { .. } => K::DidDestroyWindow,
            Self::DidGetWindowTitle { .. } => K::DidGetWindowTitle,
            Self::DidGetWindowRect { .. } => K::DidGetWindowRect,
            Self::DidGetWindowBackingStore { .. } => K::DidGetWindowBackingStore,
            Self::Greeting { .. } => K::Greeting,
            Self::DidGetClipboardContents { .. } => K::DidGetClipboardContents,
            Self::DidSetClipboardContents { .. } => K::DidSetClipboardContents,
            Self::DidSetWindowBackingStore { .. } => K::DidSetWindowBackingStore,
            Self::DidSetWallpaper { .. } => K::DidSetWallpaper,
            Self::DidGetWallpaper { .. } => K::DidGetWallpaper,
            Self::ScreenRectChanged { .. } => K::ScreenRectChanged,
            Self::WmWindowRemoved { .. } => K::WmWindowRemoved,
            Self::WmWindowStateChanged(_) => K::WmWindowStateChanged,
            Self::ClipboardContentsChanged { .. } => K::ClipboardContentsChanged,
            Self::DidCreateSharedBuffer { .. } => K::DidCreateSharedBuffer,
            Self::DidReleaseSharedBuffer { .. } => K::DidReleaseSharedBuffer,
        }
    }

    /// Window the message is about, written to the record's `window_id` field
    pub fn window_id(&self) -> Option<WindowId> {
        match self {
            Self::Error { window_id, .. }
            | Self::Paint { window_id, .. }
            | Self::MouseMove { window_id, .. }
            | Self::MouseDown { window_id, .. }
            | Self::MouseUp { window_id, .. }
            | Self::WindowEntered { window_id }
            | Self::WindowLeft { window_id }
            | Self::KeyDown { window_id, .. }
            | Self::KeyUp { window_id, .. }
            | Self::WindowActivated { window_id }
            | Self::WindowDeactivated { window_id }
            | Self::WindowResized { window_id, .. }
            | Self::WindowCloseRequest { window_id }
            | Self::DidCreateWindow { window_id }
            | Self::DidDestroyWindow { window_id }
            | Self::DidGetWindowTitle { window_id, .. }
            | Self::DidGetWindowRect { window_id, .. }
            | Self::DidGetWindowBackingStore { window_id, .. }
            | Self::DidSetWindowBackingStore { window_id, .. } => Some(*window_id),
            _ => None,
        }
    }

    pub fn encode(&self) -> RawMessage {
        let mut raw = RawMessage::new(self.kind() as u32);
        if let Some(window_id) = self.window_id() {
            raw.window_id = window_id;
        }
        match self {
            Self::Error { request, reason, .. } => {
                raw.value = *request as i32;
                raw.set_text(reason);
            }
            Self::Paint { rect, window_size, .. } => {
                raw.writer().rect(*rect).size(*window_size);
            }
            Self::MouseMove { mouse, .. }
            | Self::MouseDown { mouse, .. }
            | Self::MouseUp { mouse, .. } => {
                raw.writer()
                    .point(mouse.position)
                    .u8(mouse.button as u8)
                    .u32(mouse.buttons.bits())
                    .u8(mouse.modifiers.bits());
            }
            Self::KeyDown { key, .. } | Self::KeyUp { key, .. } => {
                raw.writer()
                    .u8(key.character)
                    .u8(key.key)
                    .u8(key.modifiers.bits());
            }
            Self::WindowResized { rect, old_rect, .. } => {
                raw.writer().rect(*rect).rect(*old_rect);
            }
            Self::MenuItemActivated { menu_id, identifier }
            | Self::DidAddMenuItem { menu_id, identifier } => {
                raw.writer().i32(0).i32(*menu_id).u32(*identifier);
            }
            Self::DidCreateMenubar { menubar_id }
            | Self::DidDestroyMenubar { menubar_id }
            | Self::DidSetApplicationMenubar { menubar_id } => {
                raw.writer().i32(*menubar_id);
            }
            Self::DidCreateMenu { menu_id }
            | Self::DidDestroyMenu { menu_id }
            | Self::DidAddMenuSeparator { menu_id } => {
                raw.writer().i32(0).i32(*menu_id);
            }
            Self::DidAddMenuToMenubar { menubar_id, menu_id } => {
                raw.writer().i32(*menubar_id).i32(*menu_id);
            }
            Self::DidGetWindowTitle { title, .. } => raw.set_text(title),
            Self::DidGetWindowRect { rect, .. } => {
                raw.writer().rect(*rect);
            }
            Self::DidGetWindowBackingStore { backing, .. } => {
                raw.writer()
                    .size(backing.size)
                    .u32(backing.bits_per_pixel)
                    .u32(backing.pitch)
                    .i32(backing.shared_buffer_id)
                    .bool(backing.has_alpha_channel);
            }
            Self::Greeting { client_id, server_pid, screen_rect } => {
                raw.value = *client_id;
                raw.writer().i32(*server_pid).rect(*screen_rect);
            }
            Self::DidGetClipboardContents { shared_buffer_id, contents_size }
            | Self::DidSetClipboardContents { shared_buffer_id, contents_size } => {
                raw.writer().i32(*shared_buffer_id).i32(*contents_size);
            }
            Self::ClipboardContentsChanged { contents_size } => raw.value = *contents_size,
            Self::DidCreateSharedBuffer { shared_buffer_id, size } => {
                raw.value = *shared_buffer_id;
                raw.writer().i32(*size);
            }
            Self::DidReleaseSharedBuffer { shared_buffer_id } => raw.value = *shared_buffer_id,
            Self::DidSetWindowBackingStore { shared_buffer_id, .. } => {
                raw.writer()
                    .size(Size::default())
                    .u32(0)
                    .u32(0)
                    .i32(*shared_buffer_id);
            }
            Self::DidSetWallpaper { success } => raw.value = *success as i32,
            Self::DidGetWallpaper { path } => raw.set_text(path),
            Self::ScreenRectChanged { rect } => {
                raw.writer().rect(*rect);
            }
            Self::WmWindowRemoved { client_id, window_id } => {
                raw.writer().i32(*client_id).i32(*window_id);
            }
            Self::WmWindowStateChanged(state) => {
                raw.set_text(&state.title);
                raw.writer()
                    .i32(state.client_id)
                    .i32(state.window_id)
                    .rect(state.rect)
                    .bool(state.is_active)
                    .bool(state.is_minimized)
                    .i32(state.window_type as i32);
            }
            Self::WindowEntered { .. }
            | Self::WindowLeft { .. }
            | Self::WindowActivated { .. }
            | Self::WindowDeactivated { .. }
            | Self::WindowCloseRequest { .. }
            | Self::DidCreateWindow { .. }
            | Self::DidDestroyWindow { .. } => {}
        }
        raw
    }

    pub fn decode(raw: &RawMessage) -> Result<Self, ProtocolError> {
        use ServerMessageKind as K;
        let kind = K::try_from(raw.kind)?;
        let window_id = raw.window_id;
        let mut r = raw.reader();

        let msg = match kind {
            K::Invalid => return Err(ProtocolError::UnknownKind(raw.kind)),
            K::Error => Self::Error {
                window_id,
                request: raw.value as u32,
                reason: raw.text()?,
            },
            K::Paint => Self::Paint {
                window_id,
                rect: r.rect()?,
                window_size: r.size()?,
            },
            K::MouseMove => Self::MouseMove { window_id, mouse: read_mouse(&mut r)? },
            K::MouseDown => Self::MouseDown { window_id, mouse: read_mouse(&mut r)? },
            K::MouseUp => Self::MouseUp { window_id, mouse: read_mouse(&mut r)? },
            K::WindowEntered => Self::WindowEntered { window_id },
            K::WindowLeft => Self::WindowLeft { window_id },
            K::KeyDown => Self::KeyDown { window_id, key: read_key(&mut r)? },
            K::KeyUp => Self::KeyUp { window_id, key: read_key(&mut r)? },
            K::WindowActivated => Self::WindowActivated { window_id },
            K::WindowDeactivated => Self::WindowDeactivated { window_id },
            K::WindowResized => Self::WindowResized {
                window_id,
                rect: r.rect()?,
                old_rect: r.rect()?,
            },
            K::WindowCloseRequest => Self::WindowCloseRequest { window_id },
            K::MenuItemActivated | K::DidAddMenuItem => {
                r.i32()?;
                let menu_id = r.i32()?;
                let identifier = r.u32()?;
                if kind == K::MenuItemActivated {
                    Self::MenuItemActivated { menu_id, identifier }
                } else {
                    Self::DidAddMenuItem { menu_id, identifier }
                }
            }
            K::DidCreateMenubar => Self::DidCreateMenubar { menubar_id: r.i32()? },
            K::DidDestroyMenubar => Self::DidDestroyMenubar { menubar_id: r.i32()? },
            K::DidSetApplicationMenubar => Self::DidSetApplicationMenubar { menubar_id: r.i32()? },
            K::DidCreateMenu | K::DidDestroyMenu | K::DidAddMenuSeparator => {
                r.i32()?;
                let menu_id = r.i32()?;
                match kind {
                    K::DidCreateMenu => Self::DidCreateMenu { menu_id },
                    K::DidDestroyMenu => Self::DidDestroyMenu { menu_id },
                    _ => Self::DidAddMenuSeparator { menu_id },
                }
            }
            K::DidAddMenuToMenubar => Self::DidAddMenuToMenubar {
                menubar_id: r.i32()?,
                menu_id: r.i32()?,
            },
            K::DidCreateWindow => Self::DidCreateWindow { window_id },
            K::DidDestroyWindow => Self::DidDestroyWindow { window_id },
            K::DidGetWindowTitle => Self::DidGetWindowTitle { window_id, title: raw.text()? },
            K::DidGetWindowRect => Self::DidGetWindowRect { window_id, rect: r.rect()? },
            K::DidGetWindowBackingStore => Self::DidGetWindowBackingStore {
                window_id,
                backing: BackingStoreInfo {
                    size: r.size()?,
                    bits_per_pixel: r.u32()?,
                    pitch: r.u32()?,
                    shared_buffer_id: r.i32()?,
                    has_alpha_channel: r.bool()?,
                },
            },
            K::Greeting => Self::Greeting {
                client_id: raw.value,
                server_pid: r.i32()?,
                screen_rect: r.rect()?,
            },
            K::DidGetClipboardContents => Self::DidGetClipboardContents {
                shared_buffer_id: r.i32()?,
                contents_size: r.i32()?,
            },
            K::DidSetClipboardContents => Self::DidSetClipboardContents {
                shared_buffer_id: r.i32()?,
                contents_size: r.i32()?,
            },
            K::ClipboardContentsChanged => Self::ClipboardContentsChanged {
                contents_size: raw.value,
            },
            K::DidCreateSharedBuffer => Self::DidCreateSharedBuffer {
                shared_buffer_id: raw.value,
                size: r.i32()?,
            },
            K::DidReleaseSharedBuffer => Self::DidReleaseSharedBuffer {
                shared_buffer_id: raw.value,
            },
            K::DidSetWindowBackingStore => {
                r.size()?;
                r.u32()?;
                r.u32()?;
                Self::DidSetWindowBackingStore {
                    window_id,
                    shared_buffer_id: r.i32()?,
                }
            }
            K::DidSetWallpaper => Self::DidSetWallpaper { success: raw.value != 0 },
            K::DidGetWallpaper => Self::DidGetWallpaper { path: raw.text()? },
            K::ScreenRectChanged => Self::ScreenRectChanged { rect: r.rect()? },
            K::WmWindowRemoved => Self::WmWindowRemoved {
                client_id: r.i32()?,
                window_id: r.i32()?,
            },
            K::WmWindowStateChanged => Self::WmWindowStateChanged(WindowStateInfo {
                client_id: r.i32()?,
                window_id: r.i32()?,
                rect: r.rect()?,
                is_active: r.bool()?,
                is_minimized: r.bool()?,
                window_type: WindowType::try_from(r.i32()?)?,
                title: raw.text()?,
            }),
        };
        Ok(msg)
    }
}

fn read_mouse(r: &mut PayloadReader<'_>) -> Result<MouseEventInfo, ProtocolError> {
    Ok(MouseEventInfo {
        position: r.point()?,
        button: MouseButton::try_from(r.u8()?)?,
        buttons: MouseButtons::from_bits_truncate(r.u32()?),
        modifiers: KeyModifiers::from_bits_truncate(r.u8()?),
    })
}

fn read_key(r: &mut PayloadReader<'_>) -> Result<KeyEventInfo, ProtocolError> {
    Ok(KeyEventInfo {
        character: r.u8()?,
        key: r.u8()?,
        modifiers: KeyModifiers::from_bits_truncate(r.u8()?),
    })
}
