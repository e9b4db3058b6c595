//! Push notifications from the native layer and the subscription hub that
//! fans them out to mounted screens.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

use crate::error::EventParseError;

/// Progress update for one model download.
///
/// The transcription stream names the model `modelName`, the summary stream
/// names it `model`; both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(alias = "modelName")]
    pub model: String,
    pub progress: f64,
    #[serde(default)]
    pub downloaded_mb: Option<f64>,
    #[serde(default)]
    pub total_mb: Option<f64>,
    #[serde(default)]
    pub speed_mbps: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ProgressPayload {
    pub fn new(model: &str, progress: f64) -> Self {
        Self {
            model: model.to_string(),
            progress,
            downloaded_mb: None,
            total_mb: None,
            speed_mbps: None,
            status: None,
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn with_sizes(mut self, downloaded_mb: f64, total_mb: f64, speed_mbps: f64) -> Self {
        self.downloaded_mb = Some(downloaded_mb);
        self.total_mb = Some(total_mb);
        self.speed_mbps = Some(speed_mbps);
        self
    }

    pub fn signals_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }

    /// Either the explicit completed status or a full progress bar.
    pub fn reaches_completion(&self) -> bool {
        self.signals_completed() || self.progress >= 100.0
    }
}

#[derive(Deserialize)]
struct CompletePayload {
    #[serde(rename = "modelName", alias = "model")]
    model: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(rename = "modelName", alias = "model")]
    model: String,
    error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TranscriptionProgress,
    TranscriptionComplete,
    TranscriptionError,
    SummaryProgress,
}

impl EventKind {
    pub const TRANSCRIPTION: [EventKind; 3] = [
        EventKind::TranscriptionProgress,
        EventKind::TranscriptionComplete,
        EventKind::TranscriptionError,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::TranscriptionProgress => "parakeet-model-download-progress",
            Self::TranscriptionComplete => "parakeet-model-download-complete",
            Self::TranscriptionError => "parakeet-model-download-error",
            Self::SummaryProgress => "builtin-ai-download-progress",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        [
            Self::TranscriptionProgress,
            Self::TranscriptionComplete,
            Self::TranscriptionError,
            Self::SummaryProgress,
        ]
        .into_iter()
        .find(|kind| kind.wire_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    TranscriptionProgress(ProgressPayload),
    TranscriptionComplete { model: String },
    TranscriptionError { model: String, error: String },
    SummaryProgress(ProgressPayload),
}

impl NativeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TranscriptionProgress(_) => EventKind::TranscriptionProgress,
            Self::TranscriptionComplete { .. } => EventKind::TranscriptionComplete,
            Self::TranscriptionError { .. } => EventKind::TranscriptionError,
            Self::SummaryProgress(_) => EventKind::SummaryProgress,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::TranscriptionProgress(p) | Self::SummaryProgress(p) => &p.model,
            Self::TranscriptionComplete { model } | Self::TranscriptionError { model, .. } => model,
        }
    }

    /// Decode an event as the native layer emits it: a name plus a JSON body.
    pub fn from_wire(name: &str, payload: serde_json::Value) -> Result<Self, EventParseError> {
        let kind =
            EventKind::from_wire(name).ok_or_else(|| EventParseError::UnknownEvent(name.into()))?;
        let malformed = |source| EventParseError::Payload {
            event: kind.wire_name(),
            source,
        };

        let event = match kind {
            EventKind::TranscriptionProgress => {
                Self::TranscriptionProgress(serde_json::from_value(payload).map_err(malformed)?)
            }
            EventKind::SummaryProgress => {
                Self::SummaryProgress(serde_json::from_value(payload).map_err(malformed)?)
            }
            EventKind::TranscriptionComplete => {
                let p: CompletePayload = serde_json::from_value(payload).map_err(malformed)?;
                Self::TranscriptionComplete { model: p.model }
            }
            EventKind::TranscriptionError => {
                let p: ErrorPayload = serde_json::from_value(payload).map_err(malformed)?;
                Self::TranscriptionError {
                    model: p.model,
                    error: p.error,
                }
            }
        };
        Ok(event)
    }
}

struct Listener {
    id: u64,
    kinds: Vec<EventKind>,
    sender: async_channel::Sender<NativeEvent>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Fan-out point for native push notifications.
///
/// Cloning shares the same listener table; the hub may be fed from any
/// thread.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<Mutex<HubInner>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `kinds`. The listener lives exactly as long as
    /// the returned [`Subscription`].
    pub fn listen(&self, kinds: &[EventKind]) -> Subscription {
        let (sender, receiver) = async_channel::unbounded();
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.listeners.push(Listener {
            id,
            kinds: kinds.to_vec(),
            sender,
        });
        log::debug!("Listener {id} subscribed to {kinds:?}");

        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
            receiver,
        }
    }

    /// Deliver `event` to every listener registered for its kind, in
    /// emission order.
    pub fn emit(&self, event: NativeEvent) {
        let kind = event.kind();
        let mut inner = self.inner.lock();
        inner.listeners.retain(|listener| {
            if !listener.kinds.contains(&kind) {
                return true;
            }
            // Unbounded channel: the only failure is a closed receiver.
            listener.sender.try_send(event.clone()).is_ok()
        });
    }

    pub fn emit_wire(&self, name: &str, payload: serde_json::Value) -> Result<(), EventParseError> {
        self.emit(NativeEvent::from_wire(name, payload)?);
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

/// A live registration on an [`EventHub`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubInner>>,
    receiver: async_channel::Receiver<NativeEvent>,
}

impl Subscription {
    /// Wait for the next event. `None` once the hub is gone and the queue is
    /// drained.
    pub async fn recv(&self) -> Option<NativeEvent> {
        self.receiver.recv().await.ok()
    }

    pub fn try_recv(&self) -> Option<NativeEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.lock().listeners.retain(|l| l.id != self.id);
            log::debug!("Listener {} unsubscribed", self.id);
        }
    }
}
