use serde::{Deserialize, Serialize};

/// Host platform as far as onboarding cares: only macOS gates recording
/// behind explicit permission prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Macos,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            Self::Other
        }
    }

    /// Use the configured override when present, otherwise detect.
    pub fn resolve(configured: Option<Platform>) -> Self {
        configured.unwrap_or_else(Self::current)
    }

    pub fn requires_permissions_step(self) -> bool {
        self == Self::Macos
    }

    /// Number of onboarding steps shown in the step counter.
    pub fn total_steps(self) -> u32 {
        if self.requires_permissions_step() {
            4
        } else {
            3
        }
    }
}
