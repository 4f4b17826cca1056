use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::capture::{CameraConfig, DEFAULT_JPEG_QUALITY};
use crate::presence::DEBOUNCE_WINDOW;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Endpoint of the stock recognition server.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/api/process-frame";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub startup_timeout_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        let camera = CameraConfig::default();
        Self {
            device_index: camera.device_index,
            width: camera.width,
            height: camera.height,
            fps: camera.fps,
            startup_timeout_ms: camera.startup_timeout.as_millis() as u64,
        }
    }
}

impl CameraSettings {
    pub fn to_config(&self) -> CameraConfig {
        CameraConfig {
            device_index: self.device_index,
            width: self.width,
            height: self.height,
            fps: self.fps,
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundSettings {
    pub enabled: bool,
    /// Played on welcome. `None` uses the built-in chime.
    pub welcome: Option<PathBuf>,
    /// Played on absence. `None` uses the built-in chime.
    pub absence: Option<PathBuf>,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            welcome: None,
            absence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    pub camera: CameraSettings,
    /// Scheduling ticks per second; stands in for the display refresh rate.
    pub tick_rate_hz: u32,
    pub debounce_ms: u64,
    pub request_timeout_ms: u64,
    pub jpeg_quality: u8,
    /// Cap on concurrent recognition requests. 0 = unlimited.
    pub max_in_flight: usize,
    pub sounds: SoundSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            camera: CameraSettings::default(),
            tick_rate_hz: 30,
            debounce_ms: DEBOUNCE_WINDOW.as_millis() as u64,
            request_timeout_ms: 10_000,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_in_flight: 0,
            sounds: SoundSettings::default(),
        }
    }
}

impl Settings {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// `$XDG_CONFIG_HOME/facecheck/settings.json` (or the platform equivalent).
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("facecheck").join("settings.json"))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// A missing file yields defaults; an invalid one is logged and ignored.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("ignoring invalid settings file {}: {err}", path.display());
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
