use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient, non-blocking message shown over the current screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
    pub duration: Duration,
}

impl Notice {
    pub fn info(title: &str, description: &str, duration: Duration) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            description: description.into(),
            duration,
        }
    }

    pub fn error(title: &str, description: &str, duration: Duration) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
            duration,
        }
    }

    /// Shown when the user moves on before both models are in place.
    pub fn downloads_in_background(duration: Duration) -> Self {
        Self::info(
            "Downloads will continue in the background",
            "You can start using the app. Recording will be available once speech recognition is ready.",
            duration,
        )
    }

    pub fn finalize_failed(duration: Duration) -> Self {
        Self::error("Failed to complete setup", "Please try again.", duration)
    }
}
