//! Server-side window state

use std::sync::Arc;

use pane_proto::wire::{MAX_TEXT_LENGTH, truncated_len};
use pane_proto::{
    ClientId, CreateWindowParams, Rect, Size, StandardCursor, WindowId, WindowStateInfo, WindowType,
};

use super::backing_store::BackingStore;
use super::decorations::WindowFrame;
use crate::shared::Bitmap;

/// Handle addressing a window in the manager's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    pub client_id: ClientId,
    pub window_id: WindowId,
}

impl WindowKey {
    pub const fn new(client_id: ClientId, window_id: WindowId) -> Self {
        Self {
            client_id,
            window_id,
        }
    }
}

pub struct Window {
    key: WindowKey,
    window_type: WindowType,
    rect: Rect,
    title: String,
    icon: Arc<Bitmap>,
    backing_store: Option<BackingStore>,
    pub resizable: bool,
    pub modal: bool,
    pub has_alpha_channel: bool,
    opacity: f32,
    pub base_size: Size,
    pub size_increment: Size,
    pub minimized: bool,
    pub global_cursor_tracking: bool,
    pub override_cursor: StandardCursor,
    pub pending_paint: bool,
    frame: WindowFrame,
}

impl Window {
    pub fn new(key: WindowKey, params: &CreateWindowParams, icon: Arc<Bitmap>) -> Self {
        let mut window = Self {
            key,
            window_type: params.window_type,
            rect: params.rect,
            title: String::new(),
            icon,
            backing_store: None,
            resizable: params.resizable,
            modal: params.modal,
            has_alpha_channel: params.has_alpha_channel,
            opacity: 1.0,
            base_size: params.base_size,
            size_increment: params.size_increment,
            minimized: false,
            global_cursor_tracking: false,
            override_cursor: StandardCursor::None,
            pending_paint: false,
            frame: WindowFrame::new(key, params.window_type, params.rect),
        };
        window.set_title(&params.title);
        window.set_opacity(params.opacity);
        window
    }

    pub fn key(&self) -> WindowKey {
        self.key
    }

    pub fn client_id(&self) -> ClientId {
        self.key.client_id
    }

    pub fn window_id(&self) -> WindowId {
        self.key.window_id
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// Screen-space content rect
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn size(&self) -> Size {
        self.rect.size
    }

    /// Apply a new rect, returning the old and new frame rects to invalidate
    pub fn set_rect(&mut self, rect: Rect) -> [Rect; 2] {
        let old = self.rect;
        self.rect = rect;
        self.frame.notify_rect_changed(old, rect)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Titles are bounded by the wire text capacity
    pub fn set_title(&mut self, title: &str) {
        let len = truncated_len(title, MAX_TEXT_LENGTH);
        self.title = title[..len].to_owned();
    }

    pub fn icon(&self) -> &Bitmap {
        &self.icon
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    pub fn backing_store(&self) -> Option<&BackingStore> {
        self.backing_store.as_ref()
    }

    /// Install a new store, handing back the one it replaces
    pub fn replace_backing_store(&mut self, store: BackingStore) -> Option<BackingStore> {
        self.backing_store.replace(store)
    }

    pub fn take_backing_store(&mut self) -> Option<BackingStore> {
        self.backing_store.take()
    }

    pub fn frame(&self) -> &WindowFrame {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut WindowFrame {
        &mut self.frame
    }

    pub fn state_info(&self, is_active: bool) -> WindowStateInfo {
        WindowStateInfo {
            client_id: self.key.client_id,
            window_id: self.key.window_id,
            rect: self.rect,
            is_active,
            is_minimized: self.minimized,
            window_type: self.window_type,
            title: self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(title: &str) -> Window {
        Window::new(
            WindowKey::new(1, 1),
            &CreateWindowParams::normal(Rect::new(10, 10, 100, 50), title),
            Arc::new(Bitmap::default_window_icon()),
        )
    }

    #[test]
    fn test_title_is_bounded() {
        let window = window(&"t".repeat(300));
        assert_eq!(window.title().len(), 255);
    }

    #[test]
    fn test_set_rect_updates_frame() {
        let mut window = window("a");
        let [old, new] = window.set_rect(Rect::new(20, 30, 100, 50));
        assert_eq!(old, Rect::new(7, -10, 106, 73));
        assert_eq!(new, Rect::new(17, 10, 106, 73));
        assert_eq!(window.frame().rect(), new);
    }

    #[test]
    fn test_opacity_is_clamped() {
        let mut window = window("a");
        window.set_opacity(3.0);
        assert_eq!(window.opacity(), 1.0);
        window.set_opacity(f32::NAN);
        assert_eq!(window.opacity(), 1.0);
        window.set_opacity(0.25);
        assert_eq!(window.opacity(), 0.25);
    }
}
