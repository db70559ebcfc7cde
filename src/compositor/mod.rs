//! Compositor Module
//!
//! Software compositing into an in-memory framebuffer: background or
//! wallpaper, window frames and contents back to front, menus, then the
//! cursor. Only damaged regions are repainted.

pub mod cursor;
pub mod damage;
pub mod painter;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::MmapMut;
use pane_proto::Size;
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::shared::{Bitmap, Color};
use crate::wm::WindowManager;
use crate::wm::backing_store::BackingStore;
use cursor::CursorManager;
use painter::{Framebuffer, Painter};

struct Wallpaper {
    path: PathBuf,
    bitmap: Bitmap,
}

/// Mapped display device the framebuffer is mirrored into after each pass
struct FramebufferDevice {
    path: PathBuf,
    map: MmapMut,
}

impl FramebufferDevice {
    fn open(path: &Path, required: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open framebuffer device {}", path.display()))?;
        let metadata = file.metadata()?;
        if metadata.is_file() && (metadata.len() as usize) < required {
            file.set_len(required as u64)?;
        }
        // SAFETY: the device is only written through this mapping while the server runs
        let map = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("Failed to map framebuffer device {}", path.display()))?;
        Ok(Self {
            path: path.to_owned(),
            map,
        })
    }

    fn present(&mut self, pixels: &[u8]) {
        let len = pixels.len().min(self.map.len());
        self.map[..len].copy_from_slice(&pixels[..len]);
    }
}

fn load_wallpaper(path: &Path) -> Result<Bitmap> {
    let image = image::open(path)
        .with_context(|| format!("Failed to load wallpaper {}", path.display()))?
        .to_rgba8();
    let size = Size::new(image.width() as i32, image.height() as i32);
    let pixels = image
        .pixels()
        .map(|p| Color::from_argb(p[3], p[0], p[1], p[2]).0)
        .collect();
    Bitmap::from_pixels(size, pixels).context("Wallpaper has inconsistent dimensions")
}

pub struct Compositor {
    framebuffer: Framebuffer,
    cursor: CursorManager,
    background: Color,
    wallpaper: Option<Wallpaper>,
    device: Option<FramebufferDevice>,
    draw_cursor: bool,
    frames: u64,
}

impl Compositor {
    pub fn new(wm: &mut WindowManager, config: &Config) -> Result<Self> {
        let screen = wm.screen_rect();
        info!("Initializing compositor ({}x{})", screen.width(), screen.height());

        let background = Color::from_rgb(config.screen.background);
        let framebuffer = Framebuffer::new(screen.size, background);
        let device = match &config.screen.framebuffer_device {
            Some(path) => {
                let device = FramebufferDevice::open(path, framebuffer.as_bytes().len())?;
                info!("Mirroring frames to {}", device.path.display());
                Some(device)
            }
            None => None,
        };

        let mut compositor = Self {
            framebuffer,
            cursor: CursorManager::new(wm.cursor_position()),
            background,
            wallpaper: None,
            device,
            draw_cursor: config.compositor.draw_cursor,
            frames: 0,
        };
        if let Some(path) = &config.screen.wallpaper {
            compositor.set_wallpaper(path)?;
        }
        wm.damage_mut().add_full_damage();
        Ok(compositor)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Passes that repainted at least one region
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn wallpaper_path(&self) -> Option<&Path> {
        self.wallpaper.as_ref().map(|wallpaper| wallpaper.path.as_path())
    }

    /// Load and install a wallpaper; the caller invalidates the screen
    pub fn set_wallpaper(&mut self, path: &Path) -> Result<()> {
        let bitmap = load_wallpaper(path)?;
        info!(
            "Wallpaper set to {} ({}x{})",
            path.display(),
            bitmap.size().width,
            bitmap.size().height
        );
        self.wallpaper = Some(Wallpaper {
            path: path.to_owned(),
            bitmap,
        });
        Ok(())
    }

    /// Move the damage of a cursor change into the tracker
    fn sync_cursor(&mut self, wm: &mut WindowManager) {
        let shape_changed = self.cursor.set_cursor(wm.current_cursor());
        let previous = self.cursor.position;
        let moved = self.cursor.update_position(wm.cursor_position());
        if shape_changed || moved {
            wm.invalidate(self.cursor.rect_at(previous));
            wm.invalidate(self.cursor.rect_at(self.cursor.position));
        }
    }

    /// Repaint every damaged region. Returns the backing stores retired
    /// since the last pass, which are safe to release now.
    pub fn compose(&mut self, wm: &mut WindowManager) -> Vec<BackingStore> {
        self.sync_cursor(wm);
        if wm.damage().is_empty() {
            return wm.take_retired();
        }

        let regions = wm.damage().regions();
        self.frames += 1;
        trace!("Composing frame {} ({} damaged regions)", self.frames, regions.len());
        let screen = wm.screen_rect();
        {
            let mut painter = Painter::new(&mut self.framebuffer);
            for region in &regions {
                let mut painter = painter.scoped();
                painter.add_clip_rect(*region);

                painter.fill_rect(*region, self.background);
                if let Some(wallpaper) = &self.wallpaper {
                    painter.blit_scaled(screen, &wallpaper.bitmap);
                }

                for window in wm.windows_back_to_front() {
                    if window.minimized || !window.frame().rect().intersects(region) {
                        continue;
                    }
                    window.frame().paint(&mut painter, &wm.frame_paint(window));

                    let content = window.rect();
                    let mut painter = painter.scoped();
                    painter.add_clip_rect(content);
                    match window.backing_store() {
                        Some(store) => {
                            if store.size() != content.size {
                                painter.fill_rect(content, Color::WHITE);
                            }
                            painter.blit_buffer(content.location, &store.pixels(), window.opacity());
                        }
                        None => painter.fill_rect(content, Color::WHITE),
                    }
                }

                wm.menus().paint(&mut painter, wm.active_client());
                if self.draw_cursor {
                    self.cursor.paint(&mut painter);
                }
            }
        }
        wm.damage_mut().clear();

        if let Some(device) = &mut self.device {
            device.present(self.framebuffer.as_bytes());
        }
        let retired = wm.take_retired();
        if !retired.is_empty() {
            debug!("Releasing {} retired backing stores", retired.len());
        }
        retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::SharedBufferPool;
    use pane_proto::{BackingStoreInfo, ClientId, CreateWindowParams, Point, Rect};

    use crate::wm::WindowKey;

    fn setup() -> (WindowManager, Compositor) {
        let mut config = Config::default();
        config.screen.width = 200;
        config.screen.height = 150;
        config.screen.background = 0x123456;
        config.compositor.draw_cursor = false;
        let mut wm = WindowManager::new(Size::new(200, 150), &config);
        let compositor = Compositor::new(&mut wm, &config).unwrap();
        (wm, compositor)
    }

    fn solid_store(pool: &mut SharedBufferPool, client: ClientId, size: Size, rgb: u32) -> BackingStore {
        let pixels = vec![0xff000000 | rgb; (size.width * size.height) as usize];
        let buffer = pool
            .create_with_contents(bytemuck::cast_slice(&pixels), client)
            .unwrap();
        let info = BackingStoreInfo {
            size,
            bits_per_pixel: 32,
            pitch: size.width as u32 * 4,
            shared_buffer_id: buffer.id(),
            has_alpha_channel: false,
        };
        BackingStore::attach(info, buffer, false).unwrap()
    }

    #[test]
    fn test_first_pass_paints_background() {
        let (mut wm, mut compositor) = setup();
        compositor.compose(&mut wm);
        assert!(wm.damage().is_empty());
        assert_eq!(
            compositor.framebuffer().pixel(Point::new(100, 100)),
            Color::from_rgb(0x123456)
        );
    }

    #[test]
    fn test_window_without_store_is_white() {
        let (mut wm, mut compositor) = setup();
        wm.create_window(1, &CreateWindowParams::normal(Rect::new(40, 40, 50, 50), "w"));
        compositor.compose(&mut wm);
        assert_eq!(compositor.framebuffer().pixel(Point::new(60, 60)), Color::WHITE);
        // The frame border sits just outside the content
        assert_ne!(
            compositor.framebuffer().pixel(Point::new(37, 60)),
            Color::from_rgb(0x123456)
        );
    }

    #[test]
    fn test_minimized_window_is_not_painted() {
        let (mut wm, mut compositor) = setup();
        let id = wm.create_window(1, &CreateWindowParams::normal(Rect::new(40, 40, 50, 50), "w"));
        wm.set_minimized(WindowKey::new(1, id), true);
        compositor.compose(&mut wm);
        assert_eq!(
            compositor.framebuffer().pixel(Point::new(60, 60)),
            Color::from_rgb(0x123456)
        );
    }

    #[test]
    fn test_composite_reads_newest_store_and_retires_old() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = SharedBufferPool::new(dir.path(), 1 << 20);
        let (mut wm, mut compositor) = setup();
        let id = wm.create_window(1, &CreateWindowParams::normal(Rect::new(40, 40, 10, 10), "w"));
        let key = WindowKey::new(1, id);

        let red = solid_store(&mut pool, 1, Size::new(10, 10), 0xff0000);
        let red_id = red.shared_buffer_id();
        wm.set_backing_store(key, red, true);
        assert!(compositor.compose(&mut wm).is_empty());
        assert_eq!(compositor.framebuffer().pixel(Point::new(45, 45)), Color(0xffff0000));

        let green = solid_store(&mut pool, 1, Size::new(10, 10), 0x00ff00);
        wm.set_backing_store(key, green, true);
        let retired = compositor.compose(&mut wm);
        assert_eq!(compositor.framebuffer().pixel(Point::new(45, 45)), Color(0xff00ff00));
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].shared_buffer_id(), red_id);

        drop(retired);
        assert!(pool.release(red_id));
        assert!(!pool.shared_buffer_path(red_id).exists());
    }

    #[test]
    fn test_alpha_store_blends_per_pixel_at_full_opacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = SharedBufferPool::new(dir.path(), 1 << 20);
        let (mut wm, mut compositor) = setup();
        let id = wm.create_window(1, &CreateWindowParams::normal(Rect::new(40, 40, 2, 1), "w"));
        let key = WindowKey::new(1, id);

        // Fully transparent, then half-transparent red
        let pixels: [u32; 2] = [0x00ff0000, 0x80ff0000];
        let buffer = pool.create_with_contents(bytemuck::cast_slice(&pixels), 1).unwrap();
        let info = BackingStoreInfo {
            size: Size::new(2, 1),
            bits_per_pixel: 32,
            pitch: 8,
            shared_buffer_id: buffer.id(),
            has_alpha_channel: true,
        };
        wm.set_backing_store(key, BackingStore::attach(info, buffer, false).unwrap(), true);
        assert_eq!(wm.window(key).unwrap().opacity(), 1.0);
        compositor.compose(&mut wm);

        let background = Color::from_rgb(0x123456);
        let fb = compositor.framebuffer();
        assert_eq!(fb.pixel(Point::new(40, 40)), background);
        let blended = fb.pixel(Point::new(41, 40));
        assert_eq!(blended, Color(0x80ff0000).blend_over(background, 1.0));
        assert_ne!(blended, Color(0xffff0000));
        assert_ne!(blended, background);
    }

    #[test]
    fn test_undamaged_pixels_are_left_alone() {
        let (mut wm, mut compositor) = setup();
        compositor.compose(&mut wm);
        let id = wm.create_window(1, &CreateWindowParams::normal(Rect::new(40, 40, 20, 20), "w"));
        wm.damage_mut().clear();
        compositor.compose(&mut wm);
        // Damage was dropped, so the new window never reached the screen
        assert_eq!(
            compositor.framebuffer().pixel(Point::new(50, 50)),
            Color::from_rgb(0x123456)
        );
        wm.did_finish_painting(WindowKey::new(1, id), Rect::default());
        compositor.compose(&mut wm);
        assert_eq!(compositor.framebuffer().pixel(Point::new(50, 50)), Color::WHITE);
    }

    #[test]
    fn test_wallpaper_is_scaled_to_screen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wall.png");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();

        let (mut wm, mut compositor) = setup();
        compositor.set_wallpaper(&path).unwrap();
        wm.invalidate_screen();
        compositor.compose(&mut wm);
        assert_eq!(compositor.framebuffer().pixel(Point::new(150, 120)), Color(0xff0000ff));
        assert_eq!(compositor.wallpaper_path(), Some(path.as_path()));
    }

    #[test]
    fn test_frames_mirror_to_device() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("fb");
        std::fs::File::create(&device).unwrap();

        let mut config = Config::default();
        config.screen.framebuffer_device = Some(device.clone());
        config.compositor.draw_cursor = false;
        let mut wm = WindowManager::new(Size::new(4, 4), &config);
        let mut compositor = Compositor::new(&mut wm, &config).unwrap();
        compositor.compose(&mut wm);
        drop(compositor);

        let bytes = std::fs::read(&device).unwrap();
        assert_eq!(bytes.len(), 4 * 4 * 4);
        let first = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(first, Color::from_rgb(config.screen.background).0);
    }
}
