//! Software painter over a 32-bit framebuffer.
//!
//! All drawing goes through [`Painter`], which carries a translation and a
//! clip rect. Sub-painters made with [`Painter::scoped`] restore the caller's
//! state when dropped.

use pane_proto::{Point, Rect, Size};

use crate::shared::{Bitmap, CharacterBitmap, Color};

/// In-memory screen image, one `0xAARRGGBB` word per pixel
#[derive(Debug, Clone)]
pub struct Framebuffer {
    size: Size,
    pixels: Vec<u32>,
}

impl Framebuffer {
    pub fn new(size: Size, fill: Color) -> Self {
        Self {
            size,
            pixels: vec![fill.0; size.area() as usize],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn rect(&self) -> Rect {
        Rect::from_parts(Point::default(), self.size)
    }

    pub fn pixel(&self, point: Point) -> Color {
        Color(self.pixels[(point.y * self.size.width + point.x) as usize])
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn row_mut(&mut self, y: i32, left: i32, right: i32) -> &mut [u32] {
        let start = (y * self.size.width + left) as usize;
        let end = (y * self.size.width + right) as usize + 1;
        &mut self.pixels[start..end]
    }
}

/// Fixed-cell title font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Font {
    pub glyph_width: i32,
    pub glyph_height: i32,
}

impl Font {
    pub fn text_width(&self, text: &str) -> i32 {
        text.chars().count() as i32 * self.glyph_width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlignment {
    CenterLeft,
    Center,
}

/// Borrowed view of client pixels in a shared buffer
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
    pub bytes: &'a [u8],
    pub size: Size,
    pub pitch: usize,
    pub has_alpha: bool,
}

impl PixelBuffer<'_> {
    fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let offset = y as usize * self.pitch + x as usize * 4;
        let word = self.bytes.get(offset..offset + 4)?;
        Some(Color(u32::from_ne_bytes([word[0], word[1], word[2], word[3]])))
    }
}

pub struct Painter<'a> {
    target: &'a mut Framebuffer,
    translation: Point,
    clip: Rect,
}

impl<'a> Painter<'a> {
    pub fn new(target: &'a mut Framebuffer) -> Self {
        let clip = target.rect();
        Self {
            target,
            translation: Point::default(),
            clip,
        }
    }

    /// Painter sharing this target with the current translation and clip
    pub fn scoped(&mut self) -> Painter<'_> {
        Painter {
            target: &mut *self.target,
            translation: self.translation,
            clip: self.clip,
        }
    }

    pub fn translate(&mut self, offset: Point) {
        self.translation = self.translation.translated(offset.x, offset.y);
    }

    /// Narrow the clip to `rect`, given in local coordinates
    pub fn add_clip_rect(&mut self, rect: Rect) {
        self.clip = self.clip.intersected(&self.to_screen(rect));
    }

    #[cfg(test)]
    pub fn clip_rect(&self) -> Rect {
        self.clip
    }

    fn to_screen(&self, rect: Rect) -> Rect {
        rect.translated_by(self.translation)
    }

    fn put(&mut self, x: i32, y: i32, color: Color) {
        let point = Point::new(x + self.translation.x, y + self.translation.y);
        if self.clip.contains(point) {
            let width = self.target.size.width;
            self.target.pixels[(point.y * width + point.x) as usize] = color.0;
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let area = self.to_screen(rect).intersected(&self.clip);
        if area.is_empty() {
            return;
        }
        for y in area.top()..=area.bottom() {
            self.target.row_mut(y, area.left(), area.right()).fill(color.0);
        }
    }

    /// Horizontal gradient from `from` at the left edge to `to` at the right
    pub fn fill_rect_with_gradient(&mut self, rect: Rect, from: Color, to: Color) {
        let screen = self.to_screen(rect);
        let area = screen.intersected(&self.clip);
        if area.is_empty() {
            return;
        }
        let span = (screen.width() - 1).max(1) as f32;
        for x in area.left()..=area.right() {
            let color = from.lerp(to, (x - screen.left()) as f32 / span);
            for y in area.top()..=area.bottom() {
                let width = self.target.size.width;
                self.target.pixels[(y * width + x) as usize] = color.0;
            }
        }
    }

    /// One-pixel outline
    pub fn draw_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() {
            return;
        }
        self.fill_rect(Rect::new(rect.left(), rect.top(), rect.width(), 1), color);
        self.fill_rect(Rect::new(rect.left(), rect.bottom(), rect.width(), 1), color);
        self.fill_rect(Rect::new(rect.left(), rect.top(), 1, rect.height()), color);
        self.fill_rect(Rect::new(rect.right(), rect.top(), 1, rect.height()), color);
    }

    pub fn draw_line(&mut self, from: Point, to: Point, color: Color) {
        if from.y == to.y {
            let (left, right) = (from.x.min(to.x), from.x.max(to.x));
            self.fill_rect(Rect::new(left, from.y, right - left + 1, 1), color);
            return;
        }
        if from.x == to.x {
            let (top, bottom) = (from.y.min(to.y), from.y.max(to.y));
            self.fill_rect(Rect::new(from.x, top, 1, bottom - top + 1), color);
            return;
        }

        let (dx, dy) = ((to.x - from.x).abs(), -(to.y - from.y).abs());
        let (sx, sy) = ((to.x - from.x).signum(), (to.y - from.y).signum());
        let (mut x, mut y, mut err) = (from.x, from.y, dx + dy);
        loop {
            self.put(x, y, color);
            if x == to.x && y == to.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn draw_bitmap(&mut self, location: Point, bitmap: &CharacterBitmap, color: Color) {
        let size = bitmap.size();
        for y in 0..size.height {
            for x in 0..size.width {
                if bitmap.is_set(x, y) {
                    self.put(location.x + x, location.y + y, color);
                }
            }
        }
    }

    /// Copy `source` with per-pixel alpha
    pub fn blit(&mut self, location: Point, source: &Bitmap) {
        let size = source.size();
        for y in 0..size.height {
            for x in 0..size.width {
                let pixel = source.pixel(x, y);
                if pixel.alpha() == 0 {
                    continue;
                }
                self.blend(location.x + x, location.y + y, pixel, 1.0);
            }
        }
    }

    /// Nearest-neighbour scale of `source` into `dest`
    pub fn blit_scaled(&mut self, dest: Rect, source: &Bitmap) {
        let src = source.size();
        if dest.is_empty() || src.is_empty() {
            return;
        }
        let area = self.to_screen(dest).intersected(&self.clip);
        let origin = self.to_screen(dest).location;
        for y in area.top()..=area.bottom() {
            let sy = ((y - origin.y) as i64 * src.height as i64 / dest.height() as i64) as i32;
            for x in area.left()..=area.right() {
                let sx = ((x - origin.x) as i64 * src.width as i64 / dest.width() as i64) as i32;
                let width = self.target.size.width;
                self.target.pixels[(y * width + x) as usize] = source.pixel(sx, sy).0 | 0xff000000;
            }
        }
    }

    /// Copy client pixels at `location`. Opaque stores overwrite; stores with
    /// an alpha channel, or any opacity below 1, blend.
    pub fn blit_buffer(&mut self, location: Point, source: &PixelBuffer<'_>, opacity: f32) {
        let dest = Rect::from_parts(location, source.size);
        let area = self.to_screen(dest).intersected(&self.clip);
        if area.is_empty() {
            return;
        }
        let origin = self.to_screen(dest).location;
        let blend = source.has_alpha || opacity < 1.0;
        for y in area.top()..=area.bottom() {
            for x in area.left()..=area.right() {
                let Some(pixel) = source.pixel(x - origin.x, y - origin.y) else {
                    continue;
                };
                let width = self.target.size.width;
                let index = (y * width + x) as usize;
                if blend {
                    let pixel = if source.has_alpha { pixel } else { Color(pixel.0 | 0xff000000) };
                    let dst = Color(self.target.pixels[index]);
                    self.target.pixels[index] = pixel.blend_over(dst, opacity).0;
                } else {
                    self.target.pixels[index] = pixel.0 | 0xff000000;
                }
            }
        }
    }

    fn blend(&mut self, x: i32, y: i32, color: Color, opacity: f32) {
        let point = Point::new(x + self.translation.x, y + self.translation.y);
        if self.clip.contains(point) {
            let index = (point.y * self.target.size.width + point.x) as usize;
            let dst = Color(self.target.pixels[index]);
            self.target.pixels[index] = color.blend_over(dst, opacity).0;
        }
    }

    /// Text as one outlined cell per visible character, clipped to `rect`
    pub fn draw_text(
        &mut self,
        rect: Rect,
        text: &str,
        font: Font,
        alignment: TextAlignment,
        color: Color,
    ) {
        let width = font.text_width(text);
        let x = match alignment {
            TextAlignment::CenterLeft => rect.x(),
            TextAlignment::Center => rect.x() + (rect.width() - width) / 2,
        };
        let y = rect.y() + (rect.height() - font.glyph_height) / 2;

        let mut painter = self.scoped();
        painter.add_clip_rect(rect);
        for (index, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let cell = Rect::new(
                x + index as i32 * font.glyph_width,
                y + 1,
                font.glyph_width - 2,
                font.glyph_height - 2,
            );
            painter.draw_rect(cell, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_respects_translation_and_clip() {
        let mut fb = Framebuffer::new(Size::new(20, 20), Color::BLACK);
        {
            let mut painter = Painter::new(&mut fb);
            painter.translate(Point::new(5, 5));
            painter.add_clip_rect(Rect::new(0, 0, 4, 4));
            painter.fill_rect(Rect::new(-2, -2, 10, 10), Color::WHITE);
        }
        assert_eq!(fb.pixel(Point::new(5, 5)), Color::WHITE);
        assert_eq!(fb.pixel(Point::new(8, 8)), Color::WHITE);
        assert_eq!(fb.pixel(Point::new(9, 9)), Color::BLACK);
        assert_eq!(fb.pixel(Point::new(4, 4)), Color::BLACK);
    }

    #[test]
    fn test_scoped_painter_restores_state() {
        let mut fb = Framebuffer::new(Size::new(10, 10), Color::BLACK);
        let mut painter = Painter::new(&mut fb);
        {
            let mut inner = painter.scoped();
            inner.translate(Point::new(3, 3));
            inner.add_clip_rect(Rect::new(0, 0, 1, 1));
        }
        assert_eq!(painter.clip_rect(), Rect::new(0, 0, 10, 10));
        painter.fill_rect(Rect::new(0, 0, 1, 1), Color::WHITE);
        assert_eq!(fb.pixel(Point::new(0, 0)), Color::WHITE);
    }

    #[test]
    fn test_gradient_runs_left_to_right() {
        let mut fb = Framebuffer::new(Size::new(11, 1), Color::BLACK);
        Painter::new(&mut fb).fill_rect_with_gradient(
            Rect::new(0, 0, 11, 1),
            Color::BLACK,
            Color::WHITE,
        );
        assert_eq!(fb.pixel(Point::new(0, 0)), Color::BLACK);
        assert_eq!(fb.pixel(Point::new(10, 0)), Color::WHITE);
    }

    #[test]
    fn test_blit_buffer_blends_with_opacity() {
        let bytes: Vec<u8> = [0xffff0000u32; 4]
            .iter()
            .flat_map(|px| px.to_ne_bytes())
            .collect();
        let source = PixelBuffer {
            bytes: &bytes,
            size: Size::new(2, 2),
            pitch: 8,
            has_alpha: false,
        };
        let mut fb = Framebuffer::new(Size::new(4, 4), Color::BLACK);
        let mut painter = Painter::new(&mut fb);
        painter.blit_buffer(Point::new(0, 0), &source, 1.0);
        painter.blit_buffer(Point::new(2, 2), &source, 0.5);

        assert_eq!(fb.pixel(Point::new(1, 1)), Color(0xffff0000));
        let blended = fb.pixel(Point::new(3, 3));
        assert!((0x7f..=0x80).contains(&blended.red()));
        assert_eq!(fb.pixel(Point::new(2, 0)), Color::BLACK);
    }

    #[test]
    fn test_short_buffer_is_not_read_past_its_end() {
        let bytes = [0xffu8; 6];
        let source = PixelBuffer {
            bytes: &bytes,
            size: Size::new(2, 1),
            pitch: 8,
            has_alpha: false,
        };
        let mut fb = Framebuffer::new(Size::new(2, 1), Color::BLACK);
        Painter::new(&mut fb).blit_buffer(Point::default(), &source, 1.0);
        assert_eq!(fb.pixel(Point::new(0, 0)), Color::WHITE);
        assert_eq!(fb.pixel(Point::new(1, 0)), Color::BLACK);
    }
}
