//! Value types carried inside messages.

use bitflags::bitflags;

use crate::error::ProtocolError;
use crate::geometry::Size;

/// Server-assigned window handle, unique per connection
pub type WindowId = i32;

/// Server-assigned connection handle
pub type ClientId = i32;

/// Opaque handle of a shared memory region
pub type SharedBufferId = i32;

pub type MenuId = i32;
pub type MenubarId = i32;

/// 32-bit packed color, `0xAARRGGBB`
pub type WireColor = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WindowType {
    Normal = 1,
    Menu = 2,
    WindowSwitcher = 3,
    Taskbar = 4,
}

impl TryFrom<i32> for WindowType {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Normal),
            2 => Ok(Self::Menu),
            3 => Ok(Self::WindowSwitcher),
            4 => Ok(Self::Taskbar),
            other => Err(ProtocolError::InvalidWindowType(other)),
        }
    }
}

/// The button that changed state in a mouse event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MouseButton {
    #[default]
    None = 0,
    Left = 1,
    Right = 2,
    Middle = 4,
}

impl TryFrom<u8> for MouseButton {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Left),
            2 => Ok(Self::Right),
            4 => Ok(Self::Middle),
            other => Err(ProtocolError::InvalidMouseButton(other)),
        }
    }
}

bitflags! {
    /// Buttons currently held down
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MouseButtons: u32 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

impl MouseButtons {
    /// Buttons in `self` that are not in `previous`, in left/right/middle order
    pub fn pressed_since(self, previous: MouseButtons) -> impl Iterator<Item = MouseButton> {
        changed(self - previous)
    }

    pub fn released_since(self, previous: MouseButtons) -> impl Iterator<Item = MouseButton> {
        changed(previous - self)
    }
}

fn changed(mask: MouseButtons) -> impl Iterator<Item = MouseButton> {
    [
        (MouseButtons::LEFT, MouseButton::Left),
        (MouseButtons::RIGHT, MouseButton::Right),
        (MouseButtons::MIDDLE, MouseButton::Middle),
    ]
    .into_iter()
    .filter(move |(flag, _)| mask.contains(*flag))
    .map(|(_, button)| button)
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StandardCursor {
    #[default]
    None = 0,
    Arrow,
    IBeam,
    ResizeHorizontal,
    ResizeVertical,
}

impl TryFrom<u8> for StandardCursor {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Arrow),
            2 => Ok(Self::IBeam),
            3 => Ok(Self::ResizeHorizontal),
            4 => Ok(Self::ResizeVertical),
            other => Err(ProtocolError::InvalidCursor(other)),
        }
    }
}

/// Backing store descriptor. Carries the shared buffer id, never pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackingStoreInfo {
    pub size: Size,
    pub bits_per_pixel: u32,
    pub pitch: u32,
    pub shared_buffer_id: SharedBufferId,
    pub has_alpha_channel: bool,
}

impl BackingStoreInfo {
    /// Bytes a buffer must hold to back this descriptor
    pub fn required_bytes(&self) -> usize {
        self.pitch as usize * self.size.height.max(0) as usize
    }
}
