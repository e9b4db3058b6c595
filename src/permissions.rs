//! The "Grant Permissions" step.
//!
//! Statuses change only as the result of a button press: a request call for
//! an undetermined permission, or an attempt to open system settings for a
//! denied one. Nothing is inferred from which devices happen to exist.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::time::Duration;

use crate::bridge::NativeBridge;
use crate::config::Config;
use crate::context::{finalize_onboarding, FinalizeOutcome, SharedContext};
use crate::error::{BridgeError, StepError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    #[default]
    Undetermined,
    Authorized,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    Microphone,
    SystemAudio,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 2] = [PermissionKind::Microphone, PermissionKind::SystemAudio];

    pub fn title(self) -> &'static str {
        match self {
            Self::Microphone => "Microphone",
            Self::SystemAudio => "System Audio",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Microphone => "Required to capture your voice during meetings",
            Self::SystemAudio => "Click Enable to grant Audio Capture permission",
        }
    }

    /// Shown when system settings cannot be opened for a denied permission.
    pub fn settings_instructions(self) -> &'static str {
        match self {
            Self::Microphone => {
                "Please enable microphone access in System Preferences > Security & Privacy > Microphone"
            }
            Self::SystemAudio => {
                "Please enable Audio Capture in System Settings → Privacy & Security → Audio Capture"
            }
        }
    }
}

/// What pressing a row's button does for the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    Request,
    OpenSettings,
}

impl PermissionAction {
    pub fn for_status(status: PermissionStatus) -> Self {
        if status == PermissionStatus::Denied {
            Self::OpenSettings
        } else {
            Self::Request
        }
    }
}

/// Result of pressing a row's button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Another request is still in flight.
    Busy,
    Updated(PermissionStatus),
    SettingsOpened,
    /// Settings could not be opened; show these instructions instead.
    ShowInstructions(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRowView {
    pub kind: PermissionKind,
    pub title: &'static str,
    pub description: &'static str,
    pub status: PermissionStatus,
    pub button_label: &'static str,
    pub button_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionsView {
    pub rows: Vec<PermissionRowView>,
    pub finish_enabled: bool,
    pub skip_enabled: bool,
    /// "Recording won't work without permissions."
    pub show_hint: bool,
}

pub struct PermissionsStep {
    ctx: SharedContext,
    pending: bool,
    finalizing: bool,
    finalize_delay: Duration,
    notice_timeout: Duration,
}

impl PermissionsStep {
    pub fn new(ctx: SharedContext, config: &Config) -> Self {
        Self {
            ctx,
            pending: false,
            finalizing: false,
            finalize_delay: config.finalize_delay(),
            notice_timeout: config.notice_timeout(),
        }
    }

    /// Log the statuses this mount starts from. Devices are not queried and
    /// nothing changes.
    pub fn log_current_state(&self) {
        let statuses = self.ctx.borrow().permissions();
        log::info!("Current permission states:");
        log::info!("  - Microphone: {:?}", statuses.microphone);
        log::info!("  - System Audio: {:?}", statuses.system_audio);
    }

    pub fn status(&self, kind: PermissionKind) -> PermissionStatus {
        self.ctx.borrow().permission(kind)
    }

    pub fn action_for(&self, kind: PermissionKind) -> PermissionAction {
        PermissionAction::for_status(self.status(kind))
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn can_finish(&self) -> bool {
        self.ctx.borrow().permissions().all_authorized()
    }

    /// Claim the single in-flight slot shared by both rows.
    pub fn begin_request(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Record what the native layer answered. A failed call counts as denied.
    pub fn apply_request_result(
        &mut self,
        kind: PermissionKind,
        result: Result<bool, BridgeError>,
    ) -> PermissionStatus {
        self.pending = false;
        let status = match result {
            Ok(true) => PermissionStatus::Authorized,
            Ok(false) => PermissionStatus::Denied,
            Err(e) => {
                log::error!(
                    "Failed to request {} permission: {}",
                    kind.title(),
                    StepError::from(e)
                );
                PermissionStatus::Denied
            }
        };
        log::info!("{} permission result: {status:?}", kind.title());
        self.ctx.borrow_mut().set_permission_status(kind, status);
        status
    }

    /// Finish Setup. Only available once both permissions are authorized.
    pub fn finish(&mut self) -> FinalizeOutcome {
        if !self.can_finish() {
            return FinalizeOutcome::Ignored;
        }
        self.run_finalize()
    }

    /// "I'll do this later": remember the skip, then finish regardless of
    /// permission state.
    pub fn skip(&mut self) -> FinalizeOutcome {
        if self.finalizing {
            return FinalizeOutcome::Ignored;
        }
        log::info!("Permissions skipped");
        self.ctx.borrow_mut().set_permissions_skipped(true);
        self.run_finalize()
    }

    fn run_finalize(&mut self) -> FinalizeOutcome {
        if self.finalizing {
            return FinalizeOutcome::Ignored;
        }
        self.finalizing = true;
        let outcome = finalize_onboarding(&self.ctx, self.finalize_delay, self.notice_timeout);
        if matches!(outcome, FinalizeOutcome::Failed(_)) {
            self.finalizing = false;
        }
        outcome
    }

    pub fn view(&self) -> PermissionsView {
        let rows = PermissionKind::ALL
            .into_iter()
            .map(|kind| {
                let status = self.status(kind);
                let (button_label, actionable) = match status {
                    PermissionStatus::Undetermined => ("Enable", true),
                    PermissionStatus::Denied => ("Open Settings", true),
                    PermissionStatus::Authorized => ("Granted", false),
                };
                PermissionRowView {
                    kind,
                    title: kind.title(),
                    description: kind.description(),
                    status,
                    button_label,
                    button_sensitive: actionable && !self.pending,
                }
            })
            .collect();
        let finish_enabled = self.can_finish() && !self.finalizing;

        PermissionsView {
            rows,
            finish_enabled,
            skip_enabled: !self.finalizing,
            show_hint: !self.can_finish(),
        }
    }

    /// Handle a press on `kind`'s button.
    ///
    /// A denied permission is never re-requested; the press only tries to
    /// open system settings.
    pub async fn trigger(
        step: &RefCell<Self>,
        bridge: &dyn NativeBridge,
        kind: PermissionKind,
    ) -> TriggerOutcome {
        let action = step.borrow().action_for(kind);
        if action == PermissionAction::OpenSettings {
            return match bridge.open_system_settings().await {
                Ok(()) => TriggerOutcome::SettingsOpened,
                Err(e) => {
                    log::warn!("Could not open system settings: {e}");
                    TriggerOutcome::ShowInstructions(kind.settings_instructions())
                }
            };
        }

        if !step.borrow_mut().begin_request() {
            return TriggerOutcome::Busy;
        }
        log::info!("Triggering {} permission...", kind.title());
        let result = match kind {
            PermissionKind::Microphone => bridge.request_microphone_permission().await,
            PermissionKind::SystemAudio => bridge.request_system_audio_permission().await,
        };
        TriggerOutcome::Updated(step.borrow_mut().apply_request_result(kind, result))
    }
}
