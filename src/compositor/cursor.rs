use pane_proto::{Point, Rect, Size, StandardCursor};

use super::painter::Painter;
use crate::shared::{Bitmap, Color};

const ARROW: &[&str] = &[
    "#         ",
    "##        ",
    "#.#       ",
    "#..#      ",
    "#...#     ",
    "#....#    ",
    "#.....#   ",
    "#......#  ",
    "#.......# ",
    "#........#",
    "#.....####",
    "#..#..#   ",
    "#.# #..#  ",
    "##  #..#  ",
    "     #..# ",
    "     ###  ",
];

const IBEAM: &[&str] = &[
    "### ###",
    "   #   ",
    "   #   ",
    "   #   ",
    "   #   ",
    "   #   ",
    "   #   ",
    "   #   ",
    "   #   ",
    "   #   ",
    "   #   ",
    "### ###",
];

const RESIZE_HORIZONTAL: &[&str] = &[
    "   #       #   ",
    "  ##       ##  ",
    " #.#########.# ",
    "#.............#",
    " #.#########.# ",
    "  ##       ##  ",
    "   #       #   ",
];

const RESIZE_VERTICAL: &[&str] = &[
    "   #   ",
    "  #.#  ",
    " #...# ",
    "####.##",
    "   #.# ",
    "   #.# ",
    "   #.# ",
    "   #.# ",
    "   #.# ",
    "##.####",
    " #...# ",
    "  #.#  ",
    "   #   ",
];

/// `#` is outline, `.` is fill, anything else is transparent
fn cursor_bitmap(rows: &[&str]) -> Bitmap {
    let height = rows.len() as i32;
    let width = rows.iter().map(|row| row.len()).max().unwrap_or(0) as i32;
    let mut bitmap = Bitmap::new(Size::new(width, height), Color(0));
    for (y, row) in rows.iter().enumerate() {
        for (x, byte) in row.bytes().enumerate() {
            let color = match byte {
                b'#' => Color::BLACK,
                b'.' => Color::WHITE,
                _ => continue,
            };
            bitmap.set_pixel(x as i32, y as i32, color);
        }
    }
    bitmap
}

struct CursorImage {
    bitmap: Bitmap,
    hotspot: Point,
}

/// Software cursor drawn on top of every composited frame
pub struct CursorManager {
    pub position: Point,
    current: StandardCursor,
    arrow: CursorImage,
    ibeam: CursorImage,
    resize_horizontal: CursorImage,
    resize_vertical: CursorImage,
    pub visible: bool,
}

impl CursorManager {
    pub fn new(position: Point) -> Self {
        let image = |rows: &[&str], hotspot: Point| CursorImage {
            bitmap: cursor_bitmap(rows),
            hotspot,
        };
        Self {
            position,
            current: StandardCursor::Arrow,
            arrow: image(ARROW, Point::new(0, 0)),
            ibeam: image(IBEAM, Point::new(3, 6)),
            resize_horizontal: image(RESIZE_HORIZONTAL, Point::new(7, 3)),
            resize_vertical: image(RESIZE_VERTICAL, Point::new(3, 6)),
            visible: true,
        }
    }

    /// Move the cursor, returning whether it actually moved
    pub fn update_position(&mut self, position: Point) -> bool {
        if self.position == position {
            return false;
        }
        self.position = position;
        true
    }

    /// Select the shape; `None` hides the cursor entirely
    pub fn set_cursor(&mut self, cursor: StandardCursor) -> bool {
        if self.current == cursor {
            return false;
        }
        self.current = cursor;
        true
    }

    fn image(&self) -> Option<&CursorImage> {
        match self.current {
            StandardCursor::None => None,
            StandardCursor::Arrow => Some(&self.arrow),
            StandardCursor::IBeam => Some(&self.ibeam),
            StandardCursor::ResizeHorizontal => Some(&self.resize_horizontal),
            StandardCursor::ResizeVertical => Some(&self.resize_vertical),
        }
    }

    /// Screen rect covered by the cursor at `position`
    pub fn rect_at(&self, position: Point) -> Rect {
        // Large enough for every shape, so a shape change never leaves residue
        Rect::new(position.x - 8, position.y - 8, 24, 24)
    }

    pub fn paint(&self, painter: &mut Painter<'_>) {
        if !self.visible {
            return;
        }
        if let Some(image) = self.image() {
            let origin = self.position.offset_from(image.hotspot);
            painter.blit(origin, &image.bitmap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::painter::Framebuffer;

    #[test]
    fn test_update_position_reports_movement() {
        let mut cursor = CursorManager::new(Point::new(10, 10));
        assert!(!cursor.update_position(Point::new(10, 10)));
        assert!(cursor.update_position(Point::new(12, 10)));
        assert_eq!(cursor.position, Point::new(12, 10));
    }

    #[test]
    fn test_arrow_tip_is_at_hotspot() {
        let cursor = CursorManager::new(Point::new(5, 5));
        let mut fb = Framebuffer::new(Size::new(32, 32), Color::WHITE);
        cursor.paint(&mut Painter::new(&mut fb));
        assert_eq!(fb.pixel(Point::new(5, 5)), Color::BLACK);
        assert_eq!(fb.pixel(Point::new(4, 4)), Color::WHITE);
    }

    #[test]
    fn test_hidden_cursor_paints_nothing() {
        let mut cursor = CursorManager::new(Point::new(5, 5));
        assert!(cursor.set_cursor(StandardCursor::None));
        let mut fb = Framebuffer::new(Size::new(32, 32), Color::WHITE);
        cursor.paint(&mut Painter::new(&mut fb));
        assert_eq!(fb.pixel(Point::new(5, 5)), Color::WHITE);
    }

    #[test]
    fn test_cursor_rect_covers_every_shape() {
        let cursor = CursorManager::new(Point::new(50, 50));
        let rect = cursor.rect_at(cursor.position);
        for rows in [ARROW, IBEAM, RESIZE_HORIZONTAL, RESIZE_VERTICAL] {
            let bitmap = cursor_bitmap(rows);
            assert!(bitmap.size().width <= rect.width() - 8);
            assert!(bitmap.size().height <= rect.height() - 8);
        }
    }
}
