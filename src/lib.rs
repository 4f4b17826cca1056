pub mod audio;
pub mod capture;
pub mod cli;
pub mod presence;
pub mod recognition;
pub mod sensing;
pub mod settings;
pub mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use log::info;

use audio::CueEngineHandle;
use capture::CameraSource;
use cli::Cli;
use presence::{Feedback, TerminalStatus};
use recognition::HttpRecognitionClient;
use sensing::{FrameRateScheduler, LoopConfig, SensingController};
use settings::{default_settings_path, SettingsStore};

pub async fn run(cli: Cli) -> Result<()> {
    utils::logging::init(cli.debug_enabled());

    info!("facecheck starting up...");

    let settings_path = cli
        .config
        .clone()
        .or_else(default_settings_path)
        .context("no config directory available; pass --config")?;
    let store = SettingsStore::new(settings_path)?;

    let mut settings = store.settings();
    cli.apply(&mut settings);
    if cli.write_config {
        store.update(settings.clone())?;
        info!("wrote settings to {}", store.path().display());
    }

    let client = HttpRecognitionClient::new(&settings.endpoint, settings.request_timeout())
        .context("invalid recognition endpoint")?;
    info!("submitting frames to {}", client.endpoint());

    let cues = if settings.sounds.enabled {
        CueEngineHandle::load(&settings.sounds)
    } else {
        CueEngineHandle::silent()
    };
    let feedback = Feedback::new(TerminalStatus::new(), cues);
    let scheduler = FrameRateScheduler::new(settings.tick_rate_hz);
    let config = LoopConfig {
        jpeg_quality: settings.jpeg_quality,
        max_in_flight: settings.max_in_flight,
        debounce_window: settings.debounce_window(),
    };

    let mut controller = SensingController::launch(
        CameraSource::initialize(settings.camera.to_config()),
        client,
        scheduler,
        feedback,
        config,
    )
    .await
    .context("camera unavailable")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("interrupt received; shutting down");

    let stats = controller.teardown().await?;
    info!(
        "session summary: {}",
        serde_json::to_string(&stats).unwrap_or_default()
    );
    Ok(())
}
