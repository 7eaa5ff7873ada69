//! Persisted settings.
//!
//! In development (`cargo run` or a debug build) the config lives next to
//! the working directory; installed builds use the platform config dir.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::editor::EditorSettings;
use crate::model::DEFAULT_FONT_SIZE;

const APP_DIR: &str = "bubble-annotate";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the translation API, e.g. `https://example.com/api`.
    pub api_base_url: String,
    /// Passed through as a bearer token.
    pub api_token: Option<String>,
    pub hit_radius_px: f32,
    /// Half side of a new draft square, in native pixels.
    pub draft_half_extent: f32,
    /// Upper bound for the page's display width. `None` fits the window.
    pub max_display_width: Option<f32>,
    pub default_font_size: f32,
    pub text_padding: f32,
    /// Work against an in-memory backend.
    pub offline: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            api_token: None,
            hit_radius_px: 8.0,
            draft_half_extent: 40.0,
            max_display_width: None,
            default_font_size: DEFAULT_FONT_SIZE,
            text_padding: 4.0,
            offline: false,
        }
    }
}

impl AppConfig {
    pub fn editor_settings(&self) -> EditorSettings {
        EditorSettings {
            hit_radius_px: self.hit_radius_px,
            draft_half_extent: self.draft_half_extent,
            text_padding: self.text_padding,
            default_font_size: self.default_font_size,
        }
    }
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    /// Set when a broken file was replaced by defaults.
    pub reset_reason: Option<String>,
}

pub fn is_dev_mode() -> bool {
    std::env::var("CARGO").is_ok() || cfg!(debug_assertions)
}

pub fn config_file() -> PathBuf {
    if is_dev_mode() {
        return PathBuf::from(CONFIG_FILE);
    }
    dirs::config_dir()
        .map(|p| p.join(APP_DIR).join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

pub fn logs_dir() -> PathBuf {
    if is_dev_mode() {
        return PathBuf::from("logs");
    }
    dirs::data_dir()
        .map(|p| p.join(APP_DIR).join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Reads the config at `path`. A missing file gives defaults; an unreadable
/// or corrupt one gives defaults plus a reason for the user.
pub fn load_config(path: &Path) -> LoadedConfig {
    let (config, reset_reason) = if path.exists() {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    (config, None)
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    (
                        AppConfig::default(),
                        Some(format!("Configuration file was corrupted: {}", e)),
                    )
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file: {}", e);
                (
                    AppConfig::default(),
                    Some(format!("Could not read configuration file: {}", e)),
                )
            }
        }
    } else {
        tracing::info!("No config file found, using defaults");
        (AppConfig::default(), None)
    };

    LoadedConfig {
        config,
        path: path.to_path_buf(),
        reset_reason,
    }
}

pub fn save_config(config: &AppConfig, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    tracing::info!("Config saved to {:?}", path);
    Ok(())
}
