//! Application settings
//!
//! Persisted to `<config dir>/Audio Merger/settings.json`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "Audio Merger";

/// Application-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Explicit ffmpeg location (None = discover)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe location (None = discover)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<PathBuf>,
    /// Silence between merged tracks, in seconds
    #[serde(default = "default_pause")]
    pub default_pause_seconds: f64,
    /// Fade length for merged tracks, in seconds
    #[serde(default = "default_fade")]
    pub default_fade_seconds: f64,
    /// Worker count override for batch conversion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_workers: Option<usize>,
}

fn default_pause() -> f64 {
    2.0
}

fn default_fade() -> f64 {
    3.0
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            default_pause_seconds: default_pause(),
            default_fade_seconds: default_fade(),
            batch_workers: None,
        }
    }
}

impl AppSettings {
    const SETTINGS_FILE: &'static str = "settings.json";

    /// Get the app config directory, creating it if needed
    fn get_app_config_dir() -> Result<PathBuf, String> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;

        let app_dir = config_dir.join(APP_DIR_NAME);

        if !app_dir.exists() {
            std::fs::create_dir_all(&app_dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        Ok(app_dir)
    }

    /// Location of the settings file
    pub fn settings_path() -> Result<PathBuf, String> {
        Ok(Self::get_app_config_dir()?.join(Self::SETTINGS_FILE))
    }

    /// Load app settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path().and_then(|p| Self::load_from(&p)) {
            Ok(settings) => {
                log::debug!("Loaded app settings from disk");
                settings
            }
            Err(e) => {
                log::debug!("Using default app settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Err("Settings file not found".to_string());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;

        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Save app settings to disk
    pub fn save(&self) -> Result<PathBuf, String> {
        let path = Self::settings_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        self.validate()?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))?;

        log::debug!("Saved app settings to {:?}", path);
        Ok(())
    }

    /// Reject values the merge pipeline would refuse anyway
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("pause", self.default_pause_seconds),
            ("fade", self.default_fade_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("Default {} must be >= 0 seconds, got {}", name, value));
            }
        }
        if self.batch_workers == Some(0) {
            return Err("Batch workers must be at least 1".to_string());
        }
        Ok(())
    }
}
