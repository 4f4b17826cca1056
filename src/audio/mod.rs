pub mod chime;

use chime::Chime;

use rodio::{Decoder, OutputStream, Sink};
use serde::Serialize;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use thiserror::Error;

use crate::settings::SoundSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Cue {
    Welcome,
    Absence,
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to read cue {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("unsupported cue file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("audio engine unavailable: {0}")]
    Engine(String),
}

/// Fire-and-forget cue playback, gated on whether the cue asset is loaded.
pub trait CuePlayer: Send {
    fn is_loaded(&self, cue: Cue) -> bool;
    fn play(&self, cue: Cue) -> Result<(), AudioError>;
}

#[derive(Clone)]
enum CueAsset {
    Encoded(Arc<[u8]>),
    Chime,
}

#[derive(Default)]
struct CueBank {
    welcome: Option<CueAsset>,
    absence: Option<CueAsset>,
}

impl CueBank {
    fn get(&self, cue: Cue) -> Option<&CueAsset> {
        match cue {
            Cue::Welcome => self.welcome.as_ref(),
            Cue::Absence => self.absence.as_ref(),
        }
    }
}

enum AudioCommand {
    Play { cue: Cue, asset: CueAsset },
}

/// Handle to the audio thread. rodio's output stream is `!Send`, so it lives on
/// its own thread, created on first playback.
pub struct CueEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    bank: Arc<CueBank>,
    output_failed: Arc<AtomicBool>,
}

impl CueEngineHandle {
    /// Load cue assets up front. A configured file that cannot be read or decoded
    /// leaves that cue unloaded; no file means the built-in chime.
    pub fn load(settings: &SoundSettings) -> Self {
        let bank = if settings.enabled {
            CueBank {
                welcome: load_asset(Cue::Welcome, settings.welcome.as_deref()),
                absence: load_asset(Cue::Absence, settings.absence.as_deref()),
            }
        } else {
            log_info!("audio cues disabled");
            CueBank::default()
        };

        Self {
            tx: Arc::new(Mutex::new(None)),
            bank: Arc::new(bank),
            output_failed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn silent() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            bank: Arc::new(CueBank::default()),
            output_failed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, AudioError> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| AudioError::Engine(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let output_failed = Arc::clone(&self.output_failed);

        thread::Builder::new()
            .name("audio-cues".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("failed to open audio output: {e}"))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("failed to create audio sink: {e}"))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play { cue, asset } => {
                            if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                log_error!("{err}; disabling audio cues");
                                output_failed.store(true, Ordering::SeqCst);
                                continue;
                            }
                            let Some(ref s) = sink else { continue };
                            match asset {
                                CueAsset::Encoded(bytes) => match Decoder::new(Cursor::new(bytes)) {
                                    Ok(source) => s.append(source),
                                    Err(err) => log_warn!("{cue:?} cue failed to decode: {err}"),
                                },
                                CueAsset::Chime => s.append(Chime::for_cue(cue)),
                            }
                        }
                    }
                }
            })
            .map_err(|e| AudioError::Engine(e.to_string()))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl CuePlayer for CueEngineHandle {
    fn is_loaded(&self, cue: Cue) -> bool {
        !self.output_failed.load(Ordering::SeqCst) && self.bank.get(cue).is_some()
    }

    fn play(&self, cue: Cue) -> Result<(), AudioError> {
        let asset = self
            .bank
            .get(cue)
            .cloned()
            .ok_or_else(|| AudioError::Engine(format!("{cue:?} cue not loaded")))?;
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Play { cue, asset })
            .map_err(|e| AudioError::Engine(e.to_string()))
    }
}

fn load_asset(cue: Cue, path: Option<&Path>) -> Option<CueAsset> {
    let Some(path) = path else {
        return Some(CueAsset::Chime);
    };

    match load_cue_file(path) {
        Ok(bytes) => {
            log_info!("loaded {cue:?} cue from {}", path.display());
            Some(CueAsset::Encoded(bytes))
        }
        Err(err) => {
            log_warn!("{err}; {cue:?} cue will be skipped");
            None
        }
    }
}

fn load_cue_file(path: &Path) -> Result<Arc<[u8]>, AudioError> {
    let bytes: Arc<[u8]> = fs::read(path)
        .map_err(|source| AudioError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .into();

    // Probe once so a broken file counts as "not loaded" instead of failing later.
    Decoder::new(Cursor::new(Arc::clone(&bytes))).map_err(|err| AudioError::Format {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;

    Ok(bytes)
}
