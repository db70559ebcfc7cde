//! Titlebar buttons

use std::sync::LazyLock;

use pane_proto::{MouseButton, Point, Rect};

use super::events::{MouseEvent, MouseEventKind};
use crate::compositor::painter::Painter;
use crate::shared::{CharacterBitmap, Color};

pub const BUTTON_WIDTH: i32 = 15;
pub const BUTTON_HEIGHT: i32 = 15;

pub static CLOSE_GLYPH: LazyLock<CharacterBitmap> = LazyLock::new(|| {
    CharacterBitmap::from_ascii(&[
        "##    ##",
        "###  ###",
        " ###### ",
        "  ####  ",
        "   ##   ",
        "  ####  ",
        " ###### ",
        "###  ###",
        "##    ##",
    ])
});

pub static MINIMIZE_GLYPH: LazyLock<CharacterBitmap> = LazyLock::new(|| {
    CharacterBitmap::from_ascii(&[
        "        ",
        "        ",
        "##    ##",
        "###  ###",
        " ###### ",
        "  ####  ",
        "   ##   ",
        "        ",
        "        ",
    ])
});

/// What a button does when clicked; dispatched by the window manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Close,
    Minimize,
}

#[derive(Debug, Clone)]
pub struct Button {
    relative_rect: Rect,
    glyph: &'static CharacterBitmap,
    action: ButtonAction,
    pressed: bool,
    hovered: bool,
}

impl Button {
    pub fn new(glyph: &'static CharacterBitmap, action: ButtonAction) -> Self {
        Self {
            relative_rect: Rect::default(),
            glyph,
            action,
            pressed: false,
            hovered: false,
        }
    }

    /// Frame-local rect
    pub fn relative_rect(&self) -> Rect {
        self.relative_rect
    }

    pub fn set_relative_rect(&mut self, rect: Rect) {
        self.relative_rect = rect;
    }

    pub fn action(&self) -> ButtonAction {
        self.action
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    /// Handle a button-local event. Returns the action when a click completes.
    pub fn on_mouse_event(&mut self, event: &MouseEvent) -> Option<ButtonAction> {
        let inside = Rect::from_parts(Point::default(), self.relative_rect.size).contains(event.position);
        match event.kind {
            MouseEventKind::Down if event.button == MouseButton::Left && inside => {
                self.pressed = true;
                None
            }
            MouseEventKind::Up if event.button == MouseButton::Left => {
                let fire = self.pressed && inside;
                self.pressed = false;
                fire.then_some(self.action)
            }
            MouseEventKind::Move => {
                self.hovered = inside;
                None
            }
            _ => None,
        }
    }

    /// Forget press and hover state after an event that went elsewhere.
    /// Returns whether anything changed.
    pub fn reset(&mut self, kind: MouseEventKind) -> bool {
        let before = (self.pressed, self.hovered);
        match kind {
            MouseEventKind::Up => self.pressed = false,
            MouseEventKind::Move => self.hovered = false,
            MouseEventKind::Down => {}
        }
        before != (self.pressed, self.hovered)
    }

    /// Paint into a frame-local painter
    pub fn paint(&self, painter: &mut Painter<'_>) {
        let rect = self.relative_rect;
        let face = if self.hovered && !self.pressed {
            Color::WHITE
        } else {
            Color::LIGHT_GRAY
        };
        painter.fill_rect(rect, face);

        let (top_left, bottom_right) = if self.pressed {
            (Color::DARK_GRAY, Color::WHITE)
        } else {
            (Color::WHITE, Color::DARK_GRAY)
        };
        let (l, t, r, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
        painter.draw_line(Point::new(l, t), Point::new(r, t), top_left);
        painter.draw_line(Point::new(l, t), Point::new(l, b), top_left);
        painter.draw_line(Point::new(l, b), Point::new(r, b), bottom_right);
        painter.draw_line(Point::new(r, t), Point::new(r, b), bottom_right);

        let glyph = self.glyph.size();
        let mut origin = Point::new(
            rect.x() + (rect.width() - glyph.width) / 2,
            rect.y() + (rect.height() - glyph.height) / 2,
        );
        if self.pressed {
            origin = origin.translated(1, 1);
        }
        painter.draw_bitmap(origin, self.glyph, Color::BLACK);
    }
}
