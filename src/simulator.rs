//! In-process stand-in for the native engine.
//!
//! Downloads are fake: a tokio task per model ticks progress forward and
//! emits the same events the real engine would, through the shared
//! [`EventHub`]. Permission answers come from [`SimulatorConfig`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::NativeBridge;
use crate::config::{Config, SimulatorConfig};
use crate::error::BridgeError;
use crate::events::{EventHub, NativeEvent, ProgressPayload};
use crate::models;
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Transcription,
    Summary,
}

pub struct SimulatedBackend {
    hub: EventHub,
    config: SimulatorConfig,
    transcription_model: String,
    platform: Platform,
    /// Models with a download task in flight.
    active: Arc<Mutex<Vec<String>>>,
}

impl SimulatedBackend {
    pub fn new(hub: EventHub, config: &Config) -> Self {
        Self {
            hub,
            config: config.simulator.clone(),
            transcription_model: config.transcription_model.clone(),
            platform: config.platform(),
            active: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn tick(&self) -> Duration {
        Duration::from_millis(self.config.tick_ms.max(1))
    }

    /// Start a fake download for `model` unless one is already running.
    fn spawn_download(&self, stream: Stream, model: String) {
        {
            let mut active = self.active.lock();
            if active.contains(&model) {
                log::debug!("Download for {model} already running");
                return;
            }
            active.push(model.clone());
        }

        let hub = self.hub.clone();
        let active = self.active.clone();
        let tick = self.tick();
        let step = self.config.step_percent.clamp(0.1, 100.0);
        let total_mb = models::size_mb_or_default(&model) as f64;

        tokio::spawn(async move {
            log::info!("Simulating download of {model} ({total_mb} MB)");
            let mut interval = tokio::time::interval(tick);
            // The first tick completes immediately.
            interval.tick().await;

            let speed = total_mb * step / 100.0 / tick.as_secs_f64();
            let mut progress = 0.0_f64;
            while progress < 100.0 {
                interval.tick().await;
                progress = (progress + step).min(100.0);
                let done = progress >= 100.0;
                let payload = ProgressPayload::new(&model, progress)
                    .with_status(if done { "completed" } else { "downloading" })
                    .with_sizes(total_mb * progress / 100.0, total_mb, if done { 0.0 } else { speed });
                hub.emit(match stream {
                    Stream::Transcription => NativeEvent::TranscriptionProgress(payload),
                    Stream::Summary => NativeEvent::SummaryProgress(payload),
                });
            }

            if stream == Stream::Transcription {
                hub.emit(NativeEvent::TranscriptionComplete {
                    model: model.clone(),
                });
            }
            log::info!("Simulated download of {model} finished");
            active.lock().retain(|m| m != &model);
        });
    }

    /// Program and argument that open the privacy settings.
    fn settings_command(&self) -> (&'static str, &'static str) {
        match self.platform {
            Platform::Macos => (
                "open",
                "x-apple.systempreferences:com.apple.preference.security?Privacy",
            ),
            Platform::Other => ("gnome-control-center", "privacy"),
        }
    }
}

#[async_trait]
impl NativeBridge for SimulatedBackend {
    async fn get_recommended_summary_model(&self) -> Result<String, BridgeError> {
        Ok(self.config.recommended_model.clone())
    }

    async fn start_background_downloads(&self, force: bool) -> Result<(), BridgeError> {
        if self.config.fail_start {
            return Err(BridgeError::failed(
                "start_background_downloads",
                "download service unavailable",
            ));
        }
        log::info!("Background downloads requested (force={force})");
        self.spawn_download(Stream::Transcription, self.transcription_model.clone());
        self.spawn_download(Stream::Summary, self.config.recommended_model.clone());
        Ok(())
    }

    async fn open_system_settings(&self) -> Result<(), BridgeError> {
        let (program, arg) = self.settings_command();
        let status = tokio::process::Command::new(program)
            .arg(arg)
            .status()
            .await
            .map_err(|e| BridgeError::failed("open_system_settings", e.to_string()))?;
        if !status.success() {
            return Err(BridgeError::failed(
                "open_system_settings",
                format!("{program} exited with {status}"),
            ));
        }
        Ok(())
    }

    async fn request_microphone_permission(&self) -> Result<bool, BridgeError> {
        tokio::time::sleep(self.tick()).await;
        Ok(self.config.microphone_granted)
    }

    async fn request_system_audio_permission(&self) -> Result<bool, BridgeError> {
        tokio::time::sleep(self.tick()).await;
        Ok(self.config.system_audio_granted)
    }
}
