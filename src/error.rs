/// A command sent to the native layer did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("{command} failed: {message}")]
    CommandFailed {
        command: &'static str,
        message: String,
    },

    /// The runtime dropped the call before it resolved (shutdown or panic).
    #[error("{command} was interrupted: {message}")]
    Interrupted {
        command: &'static str,
        message: String,
    },
}

impl BridgeError {
    pub fn failed(command: &'static str, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command,
            message: message.into(),
        }
    }
}

/// A push notification from the native layer could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("malformed `{event}` payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Reading or writing a persisted JSON file failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures a screen recovers from locally.
///
/// None of these escape the screen: request failures become an error card or
/// a `denied` status, stream errors are shown inline, and finalize failures
/// re-enable the action and raise a notice.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Request(#[from] BridgeError),

    #[error("{model}: {message}")]
    Stream { model: String, message: String },

    #[error("could not finalize onboarding: {0}")]
    Finalize(#[source] StoreError),
}
