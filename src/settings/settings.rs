// Settings management and persistence
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::queue::persistence::{join_paths, split_paths};

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const APP_DIR_NAME: &str = "wired";
pub const MAX_VOLUME: u8 = 100;

/// Window geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 1200,
            height: 700,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    #[serde(deserialize_with = "clamped_volume")]
    pub volume: u8, // 0-100
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { volume: 75 }
    }
}

/// Out-of-range stored volumes are clamped instead of failing the whole file
fn clamped_volume<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let volume = i64::deserialize(deserializer)?;
    Ok(volume.clamp(0, i64::from(MAX_VOLUME)) as u8)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Root of the last scanned library
    pub last_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub last_track_index: Option<usize>,
    pub shuffle_enabled: bool,
}

/// Queue contents saved on shutdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// File paths joined with `|`
    pub paths: String,
    pub panel_visible: bool,
}

/// Main application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: i32, // Settings schema version for future migrations
    pub window: WindowSettings,
    pub audio: AudioSettings,
    pub library: LibrarySettings,
    pub playback: PlaybackSettings,
    pub queue: QueueSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: 1,
            window: WindowSettings::default(),
            audio: AudioSettings::default(),
            library: LibrarySettings::default(),
            playback: PlaybackSettings::default(),
            queue: QueueSettings::default(),
        }
    }
}

/// `<config dir>/wired`, if the platform has a config directory
pub fn default_app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
}

impl AppSettings {
    /// Get the settings file path
    pub fn settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join(SETTINGS_FILE_NAME)
    }

    /// Load settings from file, or return defaults if the file doesn't exist.
    /// A file that exists but can't be read or parsed is an error.
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::settings_path(app_dir);

        if !path.exists() {
            debug!(path = %path.display(), "no settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: AppSettings = serde_json::from_str(&content)?;

        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Like [`AppSettings::load`], but a broken file falls back to defaults
    pub fn load_or_default(app_dir: &Path) -> Self {
        Self::load(app_dir).unwrap_or_else(|e| {
            warn!(error = %e, "could not load settings, using defaults");
            Self::default()
        })
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        // Ensure directory exists
        fs::create_dir_all(app_dir)?;

        let path = Self::settings_path(app_dir);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;

        info!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// Set the volume, clamped to 0-100
    pub fn set_volume(&mut self, volume: i32) {
        self.audio.volume = volume.clamp(0, i32::from(MAX_VOLUME)) as u8;
    }

    pub fn queue_paths(&self) -> Vec<String> {
        split_paths(&self.queue.paths)
    }

    pub fn set_queue_paths(&mut self, paths: &[String]) {
        self.queue.paths = join_paths(paths);
    }

    /// Saved queue paths, cleared so they are applied only once
    pub fn take_queue_paths(&mut self) -> Vec<String> {
        split_paths(&std::mem::take(&mut self.queue.paths))
    }
}
