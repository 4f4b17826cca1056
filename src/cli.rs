use std::path::PathBuf;

use clap::Parser;

use crate::settings::Settings;

/// Continuous face-recognition client: samples the camera, asks a recognition
/// service who is in frame, and announces arrivals and departures.
#[derive(Debug, Parser)]
#[command(name = "facecheck", version)]
pub struct Cli {
    /// Settings file (JSON). Defaults to the user config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the effective settings back to the settings file.
    #[arg(long)]
    pub write_config: bool,

    /// Recognition service endpoint (POST, JSON `{frame}`).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Camera device index (0 = built-in, user-facing camera).
    #[arg(long)]
    pub device: Option<u32>,

    /// Preferred capture width. The device may choose another.
    #[arg(long)]
    pub width: Option<u32>,

    /// Preferred capture height. The device may choose another.
    #[arg(long)]
    pub height: Option<u32>,

    /// Scheduling ticks per second.
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Debounce window for welcome/absence events, in milliseconds.
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Per-request timeout for the recognition service, in milliseconds.
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// JPEG quality for submitted frames (1-100).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: Option<u8>,

    /// Maximum concurrent recognition requests (0 = unlimited).
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Sound file played on welcome.
    #[arg(long)]
    pub welcome_sound: Option<PathBuf>,

    /// Sound file played on absence.
    #[arg(long)]
    pub absence_sound: Option<PathBuf>,

    /// Disable audio cues.
    #[arg(long)]
    pub no_sound: bool,

    /// Verbose logging (same as FACECHECK_DEBUG=1).
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Flags win over whatever the settings file said.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(endpoint) = &self.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(device) = self.device {
            settings.camera.device_index = device;
        }
        if let Some(width) = self.width {
            settings.camera.width = width;
        }
        if let Some(height) = self.height {
            settings.camera.height = height;
        }
        if let Some(rate) = self.tick_rate {
            settings.tick_rate_hz = rate;
        }
        if let Some(debounce) = self.debounce_ms {
            settings.debounce_ms = debounce;
        }
        if let Some(timeout) = self.request_timeout_ms {
            settings.request_timeout_ms = timeout;
        }
        if let Some(quality) = self.jpeg_quality {
            settings.jpeg_quality = quality;
        }
        if let Some(cap) = self.max_in_flight {
            settings.max_in_flight = cap;
        }
        if let Some(path) = &self.welcome_sound {
            settings.sounds.welcome = Some(path.clone());
        }
        if let Some(path) = &self.absence_sound {
            settings.sounds.absence = Some(path.clone());
        }
        if self.no_sound {
            settings.sounds.enabled = false;
        }
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
            || std::env::var("FACECHECK_DEBUG")
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
    }
}
