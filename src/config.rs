use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StoreError;
use crate::models::{DEFAULT_SUMMARY_MODEL, TRANSCRIPTION_MODEL};
use crate::platform::Platform;

/// Knobs for the bundled backend simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Delay between synthetic progress events.
    pub tick_ms: u64,
    /// Progress added per tick, in percent.
    pub step_percent: f64,
    /// Model returned by `get_recommended_summary_model`.
    pub recommended_model: String,
    pub microphone_granted: bool,
    pub system_audio_granted: bool,
    /// Reject `start_background_downloads` to exercise the error card.
    pub fail_start: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            step_percent: 4.0,
            recommended_model: DEFAULT_SUMMARY_MODEL.into(),
            microphone_granted: true,
            system_audio_granted: true,
            fail_start: false,
        }
    }
}

/// Top-level onboarding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transcription_model: String,
    /// Extra identifiers accepted on the summary progress stream besides the
    /// currently selected model.
    pub summary_model_aliases: Vec<String>,
    /// Forces the macOS or non-macOS path; detected when absent.
    pub platform: Option<Platform>,
    pub finalize_delay_ms: u64,
    pub notice_timeout_secs: u64,
    pub simulator: SimulatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcription_model: TRANSCRIPTION_MODEL.into(),
            summary_model_aliases: vec!["gemma3:1b".into(), "gemma3:4b".into()],
            platform: None,
            finalize_delay_ms: 100,
            notice_timeout_secs: 5,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Config {
    /// Directory: ~/.config/meeting-onboarding/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("meeting-onboarding");
        p
    }

    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if file doesn't exist or is invalid.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Like [`Config::load`], but writes the defaults out on first run so
    /// there is a file to edit.
    pub fn load_or_create() -> Self {
        Self::load_or_create_at(&Self::path())
    }

    pub fn load_or_create_at(path: &Path) -> Self {
        let config = Self::load_from(path);
        if !path.exists() {
            match config.save_to(path) {
                Ok(()) => log::info!("Wrote default config to {}", path.display()),
                Err(e) => log::warn!("Failed to write default config: {e}"),
            }
        }
        config
    }

    /// Persist to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn platform(&self) -> Platform {
        Platform::resolve(self.platform)
    }

    pub fn finalize_delay(&self) -> Duration {
        Duration::from_millis(self.finalize_delay_ms)
    }

    pub fn notice_timeout(&self) -> Duration {
        Duration::from_secs(self.notice_timeout_secs)
    }
}
