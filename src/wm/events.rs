//! Pointer events routed through the window manager

use pane_proto::{KeyModifiers, MouseButton, MouseButtons, MouseEventInfo, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Move,
    Down,
    Up,
}

/// A pointer event. The coordinate space depends on who holds it: screen
/// space in the manager, frame-local in a frame, button-local in a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub position: Point,
    pub button: MouseButton,
    pub buttons: MouseButtons,
    pub modifiers: KeyModifiers,
}

impl MouseEvent {
    pub fn new(kind: MouseEventKind, position: Point, button: MouseButton, buttons: MouseButtons) -> Self {
        Self {
            kind,
            position,
            button,
            buttons,
            modifiers: KeyModifiers::empty(),
        }
    }

    /// Same event with `offset` added to the position
    pub fn translated(&self, offset: Point) -> Self {
        Self {
            position: self.position.translated(offset.x, offset.y),
            ..*self
        }
    }

    pub fn is_left_down(&self) -> bool {
        self.kind == MouseEventKind::Down && self.button == MouseButton::Left
    }

    pub fn info(&self) -> MouseEventInfo {
        MouseEventInfo {
            position: self.position,
            button: self.button,
            buttons: self.buttons,
            modifiers: self.modifiers,
        }
    }
}
