//! Pixel types shared by the window manager and the compositor

use pane_proto::Size;

/// 32-bit color, `0xAARRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xff000000);
    pub const WHITE: Color = Color(0xffffffff);
    pub const MID_GRAY: Color = Color(0xff7f7f7f);
    pub const LIGHT_GRAY: Color = Color(0xffc0c0c0);
    pub const DARK_GRAY: Color = Color(0xff404040);

    /// Opaque color from `0xRRGGBB`
    pub const fn from_rgb(rgb: u32) -> Self {
        Color(0xff000000 | (rgb & 0x00ff_ffff))
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    /// Source-over blend of `self` onto `dst`, with the source alpha scaled by `opacity`
    pub fn blend_over(self, dst: Color, opacity: f32) -> Color {
        let alpha = (self.alpha() as f32 / 255.0) * opacity.clamp(0.0, 1.0);
        if alpha >= 1.0 {
            return Color(self.0 | 0xff000000);
        }
        if alpha <= 0.0 {
            return dst;
        }
        let mix = |s: u8, d: u8| (s as f32 * alpha + d as f32 * (1.0 - alpha)).round() as u8;
        Color::from_argb(
            0xff,
            mix(self.red(), dst.red()),
            mix(self.green(), dst.green()),
            mix(self.blue(), dst.blue()),
        )
    }

    /// Linear interpolation between two opaque colors, `t` in `0.0..=1.0`
    pub fn lerp(self, to: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color::from_argb(
            mix(self.alpha(), to.alpha()),
            mix(self.red(), to.red()),
            mix(self.green(), to.green()),
            mix(self.blue(), to.blue()),
        )
    }
}

/// One-bit glyph, built from an ASCII picture where `#` is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterBitmap {
    width: i32,
    height: i32,
    bits: Vec<bool>,
}

impl CharacterBitmap {
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|row| row.len()).max().unwrap_or(0) as i32;
        let mut bits = vec![false; (width * height) as usize];
        for (y, row) in rows.iter().enumerate() {
            for (x, byte) in row.bytes().enumerate() {
                bits[y * width as usize + x] = byte == b'#';
            }
        }
        Self { width, height, bits }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_set(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && self.bits[(y * self.width + x) as usize]
    }
}

/// Owned 32-bit pixel image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    size: Size,
    pixels: Vec<u32>,
}

impl Bitmap {
    pub fn new(size: Size, fill: Color) -> Self {
        let count = size.area() as usize;
        Self {
            size,
            pixels: vec![fill.0; count],
        }
    }

    pub fn from_pixels(size: Size, pixels: Vec<u32>) -> Option<Self> {
        (pixels.len() == size.area() as usize).then_some(Self { size, pixels })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixel(&self, x: i32, y: i32) -> Color {
        Color(self.pixels[(y * self.size.width + x) as usize])
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        self.pixels[(y * self.size.width + x) as usize] = color.0;
    }

    /// Default 16×16 window icon: a framed document
    pub fn default_window_icon() -> Self {
        let mut icon = Bitmap::new(Size::new(16, 16), Color(0));
        for y in 1..15 {
            for x in 3..13 {
                let edge = y == 1 || y == 14 || x == 3 || x == 12;
                icon.set_pixel(x, y, if edge { Color::BLACK } else { Color::WHITE });
            }
        }
        for y in (4..12).step_by(2) {
            for x in 5..11 {
                icon.set_pixel(x, y, Color::MID_GRAY);
            }
        }
        icon
    }
}
