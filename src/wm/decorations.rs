//! Window decorations (titlebars, borders, buttons)
//!
//! Every window owns one frame. Only `Normal` windows get a titlebar and
//! buttons; menus get a thin outline and the switcher and taskbar get nothing.
//!
//! Frame-local geometry for a `w`×`h` window:
//!
//! ```text
//! titlebar       { 2, 2, w + 2, 17 }
//! icon           { titlebar.x + 2, titlebar.y, 16, 17 }
//! title text     { titlebar.x + 20, titlebar.y, titlebar.width - 22, 17 }
//! middle border  { 1, 1, w + 4, h + 4 + 17 }
//! inner border   { 2, 2 + 17, w + 2, h + 2 }
//! ```

use pane_proto::{Point, Rect, WindowType};

use super::button::{BUTTON_HEIGHT, BUTTON_WIDTH, Button, ButtonAction, CLOSE_GLYPH, MINIMIZE_GLYPH};
use super::events::{MouseEvent, MouseEventKind};
use super::window::WindowKey;
use crate::compositor::painter::{Font, Painter, TextAlignment};
use crate::config::{FrameColors, FrameScheme};
use crate::shared::{Bitmap, Color};

pub const TITLEBAR_HEIGHT: i32 = 17;

/// Interaction state that selects the frame colors, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Highlighted,
    Dragging,
    Active,
    Inactive,
}

impl FrameState {
    fn scheme(self, colors: &FrameColors) -> (FrameScheme, Color) {
        match self {
            FrameState::Highlighted => (colors.highlight, Color::WHITE),
            FrameState::Dragging => (colors.dragging, Color::from_rgb(0xf9b36a)),
            FrameState::Active => (colors.active, Color::from_rgb(0x8f673d)),
            FrameState::Inactive => (colors.inactive, Color::MID_GRAY),
        }
    }
}

/// Requests a frame makes of the window manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    RaiseAndActivate,
    Button(ButtonAction),
    StartDrag,
    /// Button visuals changed
    InvalidateTitlebar,
}

/// Everything a frame needs from its window to paint
pub struct FramePaint<'a> {
    pub state: FrameState,
    pub title: &'a str,
    pub icon: &'a Bitmap,
    pub colors: &'a FrameColors,
    pub font: Font,
}

/// Screen-space frame rect of a window of `window_type` at `rect`
pub fn frame_rect_for_window_type(window_type: WindowType, rect: Rect) -> Rect {
    match window_type {
        WindowType::Menu => rect.inflated(2, 2),
        WindowType::Normal => Rect::new(
            rect.x() - 3,
            rect.y() - TITLEBAR_HEIGHT - 3,
            rect.width() + 6,
            rect.height() + 6 + TITLEBAR_HEIGHT,
        ),
        WindowType::WindowSwitcher | WindowType::Taskbar => rect,
    }
}

#[derive(Debug, Clone)]
pub struct WindowFrame {
    window: WindowKey,
    window_type: WindowType,
    window_rect: Rect,
    buttons: Vec<Button>,
}

impl WindowFrame {
    pub fn new(window: WindowKey, window_type: WindowType, window_rect: Rect) -> Self {
        let buttons = if window_type == WindowType::Normal {
            vec![
                Button::new(&CLOSE_GLYPH, ButtonAction::Close),
                Button::new(&MINIMIZE_GLYPH, ButtonAction::Minimize),
            ]
        } else {
            Vec::new()
        };
        let mut frame = Self {
            window,
            window_type,
            window_rect,
            buttons,
        };
        frame.layout_buttons();
        frame
    }

    pub fn window(&self) -> WindowKey {
        self.window
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    /// Screen-space frame rect
    pub fn rect(&self) -> Rect {
        frame_rect_for_window_type(self.window_type, self.window_rect)
    }

    pub fn titlebar_rect(&self) -> Rect {
        Rect::new(2, 2, self.window_rect.width() + 2, TITLEBAR_HEIGHT)
    }

    pub fn titlebar_icon_rect(&self) -> Rect {
        let titlebar = self.titlebar_rect();
        Rect::new(titlebar.x() + 2, titlebar.y(), 16, titlebar.height())
    }

    pub fn titlebar_text_rect(&self) -> Rect {
        let titlebar = self.titlebar_rect();
        let icon = self.titlebar_icon_rect();
        Rect::new(
            titlebar.x() + 2 + icon.width() + 2,
            titlebar.y(),
            titlebar.width() - 4 - icon.width() - 2,
            titlebar.height(),
        )
    }

    pub fn middle_border_rect(&self) -> Rect {
        Rect::new(
            1,
            1,
            self.window_rect.width() + 4,
            self.window_rect.height() + 4 + TITLEBAR_HEIGHT,
        )
    }

    pub fn inner_border_rect(&self) -> Rect {
        Rect::new(
            2,
            2 + TITLEBAR_HEIGHT,
            self.window_rect.width() + 2,
            self.window_rect.height() + 2,
        )
    }

    /// Titlebar in screen space
    pub fn titlebar_screen_rect(&self) -> Rect {
        self.titlebar_rect().translated_by(self.rect().location)
    }

    /// Lay buttons out right to left from the end of the title text area
    fn layout_buttons(&mut self) {
        let text_rect = self.titlebar_text_rect();
        let mut x = text_rect.right() + 1;
        for button in &mut self.buttons {
            x -= BUTTON_WIDTH;
            let mut rect = Rect::new(x, 0, BUTTON_WIDTH, BUTTON_HEIGHT);
            rect.center_vertically_within(&text_rect);
            button.set_relative_rect(rect);
        }
    }

    /// Update cached geometry after the window rect changed.
    /// Returns the old and new frame rects for invalidation.
    pub fn notify_rect_changed(&mut self, old_rect: Rect, new_rect: Rect) -> [Rect; 2] {
        debug_assert!(self.window_type == WindowType::Normal || self.buttons.is_empty());
        self.window_rect = new_rect;
        self.layout_buttons();
        [
            frame_rect_for_window_type(self.window_type, old_rect),
            frame_rect_for_window_type(self.window_type, new_rect),
        ]
    }

    /// Handle a frame-local event
    pub fn on_mouse_event(&mut self, event: &MouseEvent) -> Vec<FrameAction> {
        let mut actions = Vec::new();
        if self.window_type != WindowType::Normal {
            return actions;
        }
        if !self.titlebar_rect().contains(event.position) {
            if self.reset_buttons(event.kind) {
                actions.push(FrameAction::InvalidateTitlebar);
            }
            return actions;
        }

        if event.kind == MouseEventKind::Down {
            actions.push(FrameAction::RaiseAndActivate);
        }

        let hit = self
            .buttons
            .iter()
            .position(|button| button.relative_rect().contains(event.position));

        let mut changed = false;
        for (index, button) in self.buttons.iter_mut().enumerate() {
            if Some(index) != hit {
                changed |= button.reset(event.kind);
            }
        }

        if let Some(index) = hit {
            let button = &mut self.buttons[index];
            let before = (button.is_pressed(), button.is_hovered());
            let local = event.translated(Point::new(
                -button.relative_rect().x(),
                -button.relative_rect().y(),
            ));
            let fired = button.on_mouse_event(&local);
            changed |= before != (button.is_pressed(), button.is_hovered());
            if changed {
                actions.push(FrameAction::InvalidateTitlebar);
            }
            if let Some(action) = fired {
                actions.push(FrameAction::Button(action));
            }
            return actions;
        }

        if changed {
            actions.push(FrameAction::InvalidateTitlebar);
        }
        if event.is_left_down() {
            actions.push(FrameAction::StartDrag);
        }
        actions
    }

    /// Forget button press/hover state for an event routed elsewhere
    pub fn reset_buttons(&mut self, kind: MouseEventKind) -> bool {
        let mut changed = false;
        for button in &mut self.buttons {
            changed |= button.reset(kind);
        }
        changed
    }

    /// Paint into a screen-space painter
    pub fn paint(&self, painter: &mut Painter<'_>, paint: &FramePaint<'_>) {
        let mut painter = painter.scoped();
        let frame_rect = self.rect();
        painter.translate(frame_rect.location);

        match self.window_type {
            WindowType::Menu => {
                let outline = Rect::from_parts(Point::default(), frame_rect.size);
                painter.draw_rect(outline, Color::LIGHT_GRAY);
                return;
            }
            WindowType::WindowSwitcher | WindowType::Taskbar => return,
            WindowType::Normal => {}
        }

        let titlebar = self.titlebar_rect();
        let text_rect = self.titlebar_text_rect();
        let outer_rect = Rect::from_parts(Point::default(), frame_rect.size);

        let mut title_rect = text_rect;
        title_rect.set_width(paint.font.text_width(paint.title).min(text_rect.width()));

        let (scheme, middle_border_color) = paint.state.scheme(paint.colors);
        let border = Color::from_rgb(scheme.border);
        let border2 = Color::from_rgb(scheme.border2);
        let title_color = Color::from_rgb(scheme.title);

        let leftmost_button = self
            .buttons
            .last()
            .map(Button::relative_rect)
            .unwrap_or_default();

        painter.fill_rect_with_gradient(titlebar, border, border2);
        let stripe_left = title_rect.right() + 4;
        let stripe_right = leftmost_button.left() - 3;
        if stripe_left <= stripe_right {
            for i in (2..=text_rect.height() - 2).step_by(2) {
                let y = text_rect.y() + i;
                painter.draw_line(Point::new(stripe_left, y), Point::new(stripe_right, y), border);
            }
        }
        painter.draw_rect(self.middle_border_rect(), middle_border_color);
        painter.draw_rect(outer_rect, border);
        painter.draw_rect(self.inner_border_rect(), border);

        painter.draw_text(
            title_rect,
            paint.title,
            paint.font,
            TextAlignment::CenterLeft,
            title_color,
        );

        let icon_rect = self.titlebar_icon_rect();
        let icon_y = icon_rect.y() + (icon_rect.height() - paint.icon.size().height) / 2;
        painter.blit(Point::new(icon_rect.x(), icon_y), paint.icon);

        for button in &self.buttons {
            button.paint(&mut painter);
        }
    }
}
