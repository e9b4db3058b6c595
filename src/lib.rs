//! Headless state for the model-download and permissions onboarding screens.
//!
//! The screens never download or negotiate anything themselves. Commands go
//! out through a [`bridge::NativeBridge`], push notifications come back
//! through an [`events::EventHub`], and cross-step state lives in the shared
//! [`context::OnboardingContext`].

pub mod bridge;
pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod events;
pub mod models;
pub mod notice;
pub mod permissions;
pub mod platform;
pub mod simulator;

pub use bridge::NativeBridge;
pub use config::Config;
pub use context::{FinalizeOutcome, OnboardingContext, SharedContext};
pub use download::DownloadProgressStep;
pub use error::{BridgeError, StepError, StoreError};
pub use events::{EventHub, NativeEvent, Subscription};
pub use notice::Notice;
pub use permissions::PermissionsStep;
pub use platform::Platform;
