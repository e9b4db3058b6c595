//! Commands the screens send to the native layer.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::BridgeError;

#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Identifier of the summary model best suited to this machine.
    async fn get_recommended_summary_model(&self) -> Result<String, BridgeError>;

    /// Kick off both model downloads. They keep running after the screen
    /// goes away; progress arrives through the event hub.
    async fn start_background_downloads(&self, force: bool) -> Result<(), BridgeError>;

    async fn open_system_settings(&self) -> Result<(), BridgeError>;

    async fn request_microphone_permission(&self) -> Result<bool, BridgeError>;

    /// Granted only when a short capture of system audio is not silence.
    async fn request_system_audio_permission(&self) -> Result<bool, BridgeError>;
}

/// Runs every call of the wrapped bridge on a tokio runtime so the GTK main
/// loop can await the result without a tokio context of its own.
pub struct RuntimeBridge {
    inner: Arc<dyn NativeBridge>,
    handle: tokio::runtime::Handle,
}

impl RuntimeBridge {
    pub fn new(inner: Arc<dyn NativeBridge>, handle: tokio::runtime::Handle) -> Self {
        Self { inner, handle }
    }

    async fn run<T, F, Fut>(&self, command: &'static str, call: F) -> Result<T, BridgeError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn NativeBridge>) -> Fut,
        Fut: Future<Output = Result<T, BridgeError>> + Send + 'static,
    {
        let fut = call(self.inner.clone());
        self.handle
            .spawn(fut)
            .await
            .map_err(|e| BridgeError::Interrupted {
                command,
                message: e.to_string(),
            })?
    }
}

#[async_trait]
impl NativeBridge for RuntimeBridge {
    async fn get_recommended_summary_model(&self) -> Result<String, BridgeError> {
        self.run("get_recommended_summary_model", |b| async move {
            b.get_recommended_summary_model().await
        })
        .await
    }

    async fn start_background_downloads(&self, force: bool) -> Result<(), BridgeError> {
        self.run("start_background_downloads", move |b| async move {
            b.start_background_downloads(force).await
        })
        .await
    }

    async fn open_system_settings(&self) -> Result<(), BridgeError> {
        self.run("open_system_settings", |b| async move {
            b.open_system_settings().await
        })
        .await
    }

    async fn request_microphone_permission(&self) -> Result<bool, BridgeError> {
        self.run("request_microphone_permission", |b| async move {
            b.request_microphone_permission().await
        })
        .await
    }

    async fn request_system_audio_permission(&self) -> Result<bool, BridgeError> {
        self.run("request_system_audio_permission", |b| async move {
            b.request_system_audio_permission().await
        })
        .await
    }
}
