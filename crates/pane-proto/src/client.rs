//! Client → server requests

use crate::error::ProtocolError;
use crate::geometry::{Rect, Size};
use crate::types::{
    BackingStoreInfo, ClientId, MenuId, MenubarId, SharedBufferId, StandardCursor, WindowId,
    WindowType,
};
use crate::wire::RawMessage;

/// Capacity of the shortcut label carried by `AddMenuItem`
pub const SHORTCUT_TEXT_CAPACITY: usize = 32;

/// Wire discriminants, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ClientMessageKind {
    Invalid = 0,
    CreateMenubar,
    DestroyMenubar,
    CreateMenu,
    DestroyMenu,
    AddMenuToMenubar,
    SetApplicationMenubar,
    AddMenuItem,
    AddMenuSeparator,
    CreateWindow,
    DestroyWindow,
    SetWindowTitle,
    GetWindowTitle,
    SetWindowRect,
    GetWindowRect,
    InvalidateRect,
    DidFinishPainting,
    GetWindowBackingStore,
    SetGlobalCursorTracking,
    SetWindowOpacity,
    SetWindowBackingStore,
    GetClipboardContents,
    SetClipboardContents,
    Greeting,
    SetWallpaper,
    GetWallpaper,
    SetWindowOverrideCursor,
    WmSetActiveWindow,
    WmSetHighlightWindow,
    CreateSharedBuffer,
    ReleaseSharedBuffer,
}

impl ClientMessageKind {
    const ALL: [Self; 31] = [
        Self::Invalid,
        Self::CreateMenubar,
        Self::DestroyMenubar,
        Self::CreateMenu,
        Self::DestroyMenu,
        Self::AddMenuToMenubar,
        Self::SetApplicationMenubar,
        Self::AddMenuItem,
        Self::AddMenuSeparator,
        Self::CreateWindow,
        Self::DestroyWindow,
        Self::SetWindowTitle,
        Self::GetWindowTitle,
        Self::SetWindowRect,
        Self::GetWindowRect,
        Self::InvalidateRect,
        Self::DidFinishPainting,
        Self::GetWindowBackingStore,
        Self::SetGlobalCursorTracking,
        Self::SetWindowOpacity,
        Self::SetWindowBackingStore,
        Self::GetClipboardContents,
        Self::SetClipboardContents,
        Self::Greeting,
        Self::SetWallpaper,
        Self::GetWallpaper,
        Self::SetWindowOverrideCursor,
        Self::WmSetActiveWindow,
        Self::WmSetHighlightWindow,
        Self::CreateSharedBuffer,
        Self::ReleaseSharedBuffer,
    ];
}

impl TryFrom<u32> for ClientMessageKind {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .filter(|kind| *kind != Self::Invalid)
            .ok_or(ProtocolError::UnknownKind(value))
    }
}

/// Parameters of a create-window request
#[derive(Debug, Clone, PartialEq)]
pub struct CreateWindowParams {
    pub rect: Rect,
    pub window_type: WindowType,
    pub title: String,
    pub has_alpha_channel: bool,
    pub modal: bool,
    pub resizable: bool,
    pub opacity: f32,
    pub base_size: Size,
    pub size_increment: Size,
}

impl CreateWindowParams {
    pub fn normal(rect: Rect, title: impl Into<String>) -> Self {
        Self {
            rect,
            window_type: WindowType::Normal,
            title: title.into(),
            has_alpha_channel: false,
            modal: false,
            resizable: true,
            opacity: 1.0,
            base_size: Size::default(),
            size_increment: Size::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    CreateMenubar,
    DestroyMenubar { menubar_id: MenubarId },
    CreateMenu { name: String },
    DestroyMenu { menu_id: MenuId },
    AddMenuToMenubar { menubar_id: MenubarId, menu_id: MenuId },
    SetApplicationMenubar { menubar_id: MenubarId },
    AddMenuItem { menu_id: MenuId, identifier: u32, text: String, shortcut: String },
    AddMenuSeparator { menu_id: MenuId },
    CreateWindow(CreateWindowParams),
    DestroyWindow { window_id: WindowId },
    SetWindowTitle { window_id: WindowId, title: String },
    GetWindowTitle { window_id: WindowId },
    SetWindowRect { window_id: WindowId, rect: Rect },
    GetWindowRect { window_id: WindowId },
    InvalidateRect { window_id: WindowId, rect: Rect },
    DidFinishPainting { window_id: WindowId, rect: Rect },
    GetWindowBackingStore { window_id: WindowId },
    SetGlobalCursorTracking { window_id: WindowId, enabled: bool },
    SetWindowOpacity { window_id: WindowId, opacity: f32 },
    SetWindowBackingStore { window_id: WindowId, backing: BackingStoreInfo, flush_immediately: bool },
    GetClipboardContents,
    SetClipboardContents { shared_buffer_id: SharedBufferId, contents_size: i32 },
    Greeting { client_pid: i32 },
    SetWallpaper { path: String },
    GetWallpaper,
    SetWindowOverrideCursor { window_id: WindowId, cursor: StandardCursor },
    WmSetActiveWindow { client_id: ClientId, window_id: WindowId },
    /// Highlight a window from a taskbar or switcher; a negative id clears it
    WmSetHighlightWindow { client_id: ClientId, window_id: WindowId },
    /// Allocate a shared buffer the client can map and hand back by id
    CreateSharedBuffer { size: i32 },
    ReleaseSharedBuffer { shared_buffer_id: SharedBufferId },
}

impl ClientMessage {
    pub fn kind(&self) -> ClientMessageKind {
        use ClientMessageKind as K;
        match self {
            Self::CreateMenubar => K::CreateMenubar,
            Self::DestroyMenubar { .. } => K::DestroyMenubar,
            Self::CreateMenu { .. } => K::CreateMenu,
            Self::DestroyMenu { .. } => K::DestroyMenu,
            Self::AddMenuToMenubar { .. } => K::AddMenuToMenubar,
            Self::SetApplicationMenubar { .. } => K::SetApplicationMenubar,
            Self::AddMenuItem { .. } => K::AddMenuItem,
            Self::AddMenuSeparator { .. } => K::AddMenuSeparator,
            Self::CreateWindow(_) => K::CreateWindow,
            Self::DestroyWindow { .. } => K::DestroyWindow,
            Self::SetWindowTitle { .. } => K::SetWindowTitle,
            Self::GetWindowTitle { .. } => K::GetWindowTitle,
            Self::SetWindowRect { .. } => K::SetWindowRect,
            Self::GetWindowRect { .. } => K::GetWindowRect,
            Self::InvalidateRect { .. } => K::InvalidateRect,
            Self::DidFinishPainting { .. } => K::DidFinishPainting,
            Self::GetWindowBackingStore { .. } => K::GetWindowBackingStore,
            Self::SetGlobalCursorTracking { .. } => K::SetGlobalCursorTracking,
            Self::SetWindowOpacity { .. } => K::SetWindowOpacity,
            Self::SetWindowBackingStore { .. } => K::SetWindowBackingStore,
            Self::GetClipboardContents => K::GetClipboardContents,
            Self::SetClipboardContents { .. } => K::SetClipboardContents,
            Self::Greeting { .. } => K::Greeting,
            Self::SetWallpaper { .. } => K::SetWallpaper,
            Self::GetWallpaper => K::GetWallpaper,
            Self::SetWindowOverrideCursor { .. } => K::SetWindowOverrideCursor,
            Self::WmSetActiveWindow { .. } => K::WmSetActiveWindow,
            Self::WmSetHighlightWindow { .. } => K::WmSetHighlightWindow,
            Self::CreateSharedBuffer { .. } => K::CreateSharedBuffer,
            Self::ReleaseSharedBuffer { .. } => K::ReleaseSharedBuffer,
        }
    }

    /// The window this request targets, if any
    pub fn window_id(&self) -> Option<WindowId> {
        match self {
            Self::DestroyWindow { window_id }
            | Self::SetWindowTitle { window_id, .. }
            | Self::GetWindowTitle { window_id }
            | Self::SetWindowRect { window_id, .. }
            | Self::GetWindowRect { window_id }
            | Self::InvalidateRect { window_id, .. }
            | Self::DidFinishPainting { window_id, .. }
            | Self::GetWindowBackingStore { window_id }
            | Self::SetGlobalCursorTracking { window_id, .. }
            | Self::SetWindowOpacity { window_id, .. }
            | Self::SetWindowBackingStore { window_id, .. }
            | Self::SetWindowOverrideCursor { window_id, .. } => Some(*window_id),
            _ => None,
        }
    }

    pub fn encode(&self) -> RawMessage {
        let mut raw = RawMessage::new(self.kind() as u32);
        if let Some(window_id) = self.window_id() {
            raw.window_id = window_id;
        }
        match self {
            Self::CreateMenubar | Self::GetClipboardContents | Self::GetWallpaper => {}
            Self::DestroyMenubar { menubar_id } | Self::SetApplicationMenubar { menubar_id } => {
                raw.writer().i32(*menubar_id);
            }
            Self::CreateMenu { name } => raw.set_text(name),
            Self::DestroyMenu { menu_id } | Self::AddMenuSeparator { menu_id } => {
                raw.writer().i32(0).i32(*menu_id);
            }
            Self::AddMenuToMenubar { menubar_id, menu_id } => {
                raw.writer().i32(*menubar_id).i32(*menu_id);
            }
            Self::AddMenuItem { menu_id, identifier, text, shortcut } => {
                raw.set_text(text);
                raw.writer()
                    .i32(0)
                    .i32(*menu_id)
                    .u32(*identifier)
                    .short_text::<SHORTCUT_TEXT_CAPACITY>(shortcut);
            }
            Self::CreateWindow(params) => {
                raw.set_text(&params.title);
                raw.writer()
                    .rect(params.rect)
                    .bool(params.has_alpha_channel)
                    .bool(params.modal)
                    .bool(params.resizable)
                    .i32(params.window_type as i32)
                    .f32(params.opacity)
                    .size(params.base_size)
                    .size(params.size_increment);
            }
            Self::DestroyWindow { .. }
            | Self::GetWindowTitle { .. }
            | Self::GetWindowRect { .. }
            | Self::GetWindowBackingStore { .. } => {}
            Self::SetWindowTitle { title, .. } => raw.set_text(title),
            Self::SetWindowRect { rect, .. }
            | Self::InvalidateRect { rect, .. }
            | Self::DidFinishPainting { rect, .. } => {
                raw.writer().rect(*rect);
            }
            Self::SetGlobalCursorTracking { enabled, .. } => raw.value = *enabled as i32,
            Self::SetWindowOpacity { opacity, .. } => {
                raw.writer().f32(*opacity);
            }
            Self::SetWindowBackingStore { backing, flush_immediately, .. } => {
                raw.writer()
                    .size(backing.size)
                    .u32(backing.bits_per_pixel)
                    .u32(backing.pitch)
                    .i32(backing.shared_buffer_id)
                    .bool(backing.has_alpha_channel)
                    .bool(*flush_immediately);
            }
            Self::SetClipboardContents { shared_buffer_id, contents_size } => {
                raw.writer().i32(*shared_buffer_id).i32(*contents_size);
            }
            Self::Greeting { client_pid } => {
                raw.writer().i32(*client_pid);
            }
            Self::SetWallpaper { path } => raw.set_text(path),
            Self::SetWindowOverrideCursor { cursor, .. } => {
                raw.writer().u8(*cursor as u8);
            }
            Self::WmSetActiveWindow { client_id, window_id }
            | Self::WmSetHighlightWindow { client_id, window_id } => {
                raw.writer().i32(*client_id).i32(*window_id);
            }
            Self::CreateSharedBuffer { size } => raw.value = *size,
            Self::ReleaseSharedBuffer { shared_buffer_id } => raw.value = *shared_buffer_id,
        }
        raw
    }

    pub fn decode(raw: &RawMessage) -> Result<Self, ProtocolError> {
        use ClientMessageKind as K;
        let kind = K::try_from(raw.kind)?;
        let window_id = raw.window_id;
        let mut r = raw.reader();
        let msg = match kind {
            K::Invalid => return Err(ProtocolError::UnknownKind(raw.kind)),
            K::CreateMenubar => Self::CreateMenubar,
            K::DestroyMenubar => Self::DestroyMenubar { menubar_id: r.i32()? },
            K::CreateMenu => Self::CreateMenu { name: raw.text()? },
            K::DestroyMenu => {
                r.i32()?;
                Self::DestroyMenu { menu_id: r.i32()? }
            }
            K::AddMenuToMenubar => Self::AddMenuToMenubar {
                menubar_id: r.i32()?,
                menu_id: r.i32()?,
            },
            K::SetApplicationMenubar => Self::SetApplicationMenubar { menubar_id: r.i32()? },
            K::AddMenuItem => {
                r.i32()?;
                Self::AddMenuItem {
                    menu_id: r.i32()?,
                    identifier: r.u32()?,
                    shortcut: r.short_text::<SHORTCUT_TEXT_CAPACITY>()?,
                    text: raw.text()?,
                }
            }
            K::AddMenuSeparator => {
                r.i32()?;
                Self::AddMenuSeparator { menu_id: r.i32()? }
            }
            K::CreateWindow => Self::CreateWindow(CreateWindowParams {
                rect: r.rect()?,
                has_alpha_channel: r.bool()?,
                modal: r.bool()?,
                resizable: r.bool()?,
                window_type: WindowType::try_from(r.i32()?)?,
                opacity: r.f32()?,
                base_size: r.size()?,
                size_increment: r.size()?,
                title: raw.text()?,
            }),
            K::DestroyWindow => Self::DestroyWindow { window_id },
            K::SetWindowTitle => Self::SetWindowTitle { window_id, title: raw.text()? },
            K::GetWindowTitle => Self::GetWindowTitle { window_id },
            K::SetWindowRect => Self::SetWindowRect { window_id, rect: r.rect()? },
            K::GetWindowRect => Self::GetWindowRect { window_id },
            K::InvalidateRect => Self::InvalidateRect { window_id, rect: r.rect()? },
            K::DidFinishPainting => Self::DidFinishPainting { window_id, rect: r.rect()? },
            K::GetWindowBackingStore => Self::GetWindowBackingStore { window_id },
            K::SetGlobalCursorTracking => Self::SetGlobalCursorTracking {
                window_id,
                enabled: raw.value != 0,
            },
            K::SetWindowOpacity => Self::SetWindowOpacity { window_id, opacity: r.f32()? },
            K::SetWindowBackingStore => Self::SetWindowBackingStore {
                window_id,
                backing: BackingStoreInfo {
                    size: r.size()?,
                    bits_per_pixel: r.u32()?,
                    pitch: r.u32()?,
                    shared_buffer_id: r.i32()?,
                    has_alpha_channel: r.bool()?,
                },
                flush_immediately: r.bool()?,
            },
            K::GetClipboardContents => Self::GetClipboardContents,
            K::SetClipboardContents => Self::SetClipboardContents {
                shared_buffer_id: r.i32()?,
                contents_size: r.i32()?,
            },
            K::Greeting => Self::Greeting { client_pid: r.i32()? },
            K::SetWallpaper => Self::SetWallpaper { path: raw.text()? },
            K::GetWallpaper => Self::GetWallpaper,
            K::SetWindowOverrideCursor => Self::SetWindowOverrideCursor {
                window_id,
                cursor: StandardCursor::try_from(r.u8()?)?,
            },
            K::WmSetActiveWindow => Self::WmSetActiveWindow {
                client_id: r.i32()?,
                window_id: r.i32()?,
            },
            K::WmSetHighlightWindow => Self::WmSetHighlightWindow {
                client_id: r.i32()?,
                window_id: r.i32()?,
            },
            K::CreateSharedBuffer => Self::CreateSharedBuffer { size: raw.value },
            K::ReleaseSharedBuffer => Self::ReleaseSharedBuffer { shared_buffer_id: raw.value },
        };
        Ok(msg)
    }
}
