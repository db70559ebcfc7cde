//! Configuration for the Pane window server
//!
//! Loads configuration from TOML file at `~/.config/pane/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub screen: ScreenConfig,
    pub input: InputConfig,
    pub window_manager: WindowManagerConfig,
    pub compositor: CompositorConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the default location, or use defaults if the
    /// file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing a default file there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", config_path))?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("pane");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Screen configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: i32,
    pub height: i32,
    /// Framebuffer device to mirror the composited screen into, e.g. `/dev/fb0`
    pub framebuffer_device: Option<PathBuf>,
    /// Background color (hex: 0xRRGGBB)
    pub background: u32,
    /// Image scaled over the background
    pub wallpaper: Option<PathBuf>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            framebuffer_device: None,
            background: 0x506f93,
            wallpaper: None,
        }
    }
}

/// Input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub enabled: bool,
    /// Pointer device producing PS/2 frames
    pub mouse_device: PathBuf,
    /// Multiplier applied to every motion delta
    pub speed: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mouse_device: PathBuf::from("/dev/input/mice"),
            speed: 1.0,
        }
    }
}

/// Window manager configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowManagerConfig {
    pub colors: FrameColors,
    pub title_font: TitleFontConfig,
}

/// Titlebar colors for one interaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameScheme {
    /// Gradient start and border color (hex: 0xRRGGBB)
    pub border: u32,
    /// Gradient end (hex: 0xRRGGBB)
    pub border2: u32,
    /// Title text (hex: 0xRRGGBB)
    pub title: u32,
}

/// Frame colors per interaction state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameColors {
    pub active: FrameScheme,
    pub inactive: FrameScheme,
    pub dragging: FrameScheme,
    pub highlight: FrameScheme,
}

impl Default for FrameColors {
    fn default() -> Self {
        Self {
            active: FrameScheme {
                border: 0x6e2209,
                border2: 0xf4ca9e,
                title: 0xffffff,
            },
            inactive: FrameScheme {
                border: 0x808080,
                border2: 0xc0c0c0,
                title: 0xd5d0c7,
            },
            dragging: FrameScheme {
                border: 0xa1320d,
                border2: 0xfadcbb,
                title: 0xffffff,
            },
            highlight: FrameScheme {
                border: 0xa10d0d,
                border2: 0xfabbbb,
                title: 0xffffff,
            },
        }
    }
}

/// Title font metrics (fixed-width bitmap font)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleFontConfig {
    pub glyph_width: i32,
    pub glyph_height: i32,
}

impl Default for TitleFontConfig {
    fn default() -> Self {
        Self {
            glyph_width: 7,
            glyph_height: 10,
        }
    }
}

/// Compositor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Damage rects tracked before collapsing to a full-screen repaint
    pub max_damage_regions: usize,
    /// Draw the software cursor
    pub draw_cursor: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            max_damage_regions: 32,
            draw_cursor: true,
        }
    }
}

/// Connection server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Overrides `$XDG_RUNTIME_DIR/pane.sock`
    pub socket_path: Option<PathBuf>,
    /// Largest shared buffer a client may request, in bytes
    pub max_shared_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            max_shared_buffer_size: 64 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pane").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.screen.width, 1024);
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.window_manager.colors.active, config.window_manager.colors.active);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[screen]\nwidth = 640\nheight = 480\n\n[input]\nenabled = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.screen.width, 640);
        assert!(!config.input.enabled);
        assert_eq!(config.input.mouse_device, PathBuf::from("/dev/input/mice"));
        assert_eq!(config.compositor.max_damage_regions, 32);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[screen\nwidth = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
