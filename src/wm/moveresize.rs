//! MoveResize Module
//!
//! Interactive window dragging from the titlebar.

use pane_proto::{Point, Rect};
use tracing::debug;

use super::window::WindowKey;

/// Drag operation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveResizeState {
    /// Window being dragged
    pub window: WindowKey,
    /// Pointer position at drag start (screen coordinates)
    pub start_pointer: Point,
    /// Window content rect at drag start
    pub start_rect: Rect,
}

/// Move manager
#[derive(Debug, Default)]
pub struct MoveResizeManager {
    state: Option<MoveResizeState>,
}

impl MoveResizeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_move(&mut self, window: WindowKey, pointer: Point, rect: Rect) {
        debug!("Starting move operation for window {:?}", window);
        self.state = Some(MoveResizeState {
            window,
            start_pointer: pointer,
            start_rect: rect,
        });
    }

    pub fn window(&self) -> Option<WindowKey> {
        self.state.map(|state| state.window)
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Where the dragged window goes for a pointer at `pointer`
    pub fn update_move(&self, pointer: Point) -> Option<(WindowKey, Rect)> {
        let state = self.state?;
        let delta = pointer.offset_from(state.start_pointer);
        Some((state.window, state.start_rect.translated_by(delta)))
    }

    /// Finish the drag, returning the dragged window and its rect at drag start
    pub fn end_move(&mut self) -> Option<(WindowKey, Rect)> {
        let state = self.state.take()?;
        debug!("Finished move operation for window {:?}", state.window);
        Some((state.window, state.start_rect))
    }

    /// Abort the drag if it targets `window`
    pub fn cancel_for(&mut self, window: WindowKey) -> bool {
        if self.window() == Some(window) {
            self.state = None;
            return true;
        }
        false
    }
}
