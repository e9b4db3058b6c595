//! Cross-step onboarding state.
//!
//! One `OnboardingContext` is created when onboarding starts and handed to
//! every screen as a [`SharedContext`]. Each mutation is written straight to
//! disk so a reload (or a crash) resumes where the user left off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::error::{StepError, StoreError};
use crate::models::{ModelRole, DEFAULT_SUMMARY_MODEL};
use crate::notice::Notice;
use crate::permissions::{PermissionKind, PermissionStatus};

pub type SharedContext = Rc<RefCell<OnboardingContext>>;

/// What a screen should do after asking to finish onboarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Reload the application once `after` has elapsed, giving the
    /// persisted record time to settle.
    Reload { after: Duration },
    /// Nothing was written; the action is available again.
    Failed(Notice),
    /// The action was not available (gate closed or already in flight).
    Ignored,
}

/// Run the finalize-onboarding action on `ctx`.
pub fn finalize_onboarding(
    ctx: &SharedContext,
    reload_delay: Duration,
    notice_timeout: Duration,
) -> FinalizeOutcome {
    match ctx.borrow_mut().complete() {
        Ok(()) => FinalizeOutcome::Reload {
            after: reload_delay,
        },
        Err(e) => {
            log::error!("{}", StepError::Finalize(e));
            FinalizeOutcome::Failed(Notice::finalize_failed(notice_timeout))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionStatuses {
    pub microphone: PermissionStatus,
    pub system_audio: PermissionStatus,
}

impl PermissionStatuses {
    pub fn get(&self, kind: PermissionKind) -> PermissionStatus {
        match kind {
            PermissionKind::Microphone => self.microphone,
            PermissionKind::SystemAudio => self.system_audio,
        }
    }

    fn set(&mut self, kind: PermissionKind, status: PermissionStatus) {
        match kind {
            PermissionKind::Microphone => self.microphone = status,
            PermissionKind::SystemAudio => self.system_audio = status,
        }
    }

    pub fn all_authorized(&self) -> bool {
        self.microphone == PermissionStatus::Authorized
            && self.system_audio == PermissionStatus::Authorized
    }
}

/// The persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingProgress {
    pub selected_summary_model: String,
    pub transcription_downloaded: bool,
    pub summary_downloaded: bool,
    pub permissions: PermissionStatuses,
    pub permissions_skipped: bool,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for OnboardingProgress {
    fn default() -> Self {
        Self {
            selected_summary_model: DEFAULT_SUMMARY_MODEL.into(),
            transcription_downloaded: false,
            summary_downloaded: false,
            permissions: PermissionStatuses::default(),
            permissions_skipped: false,
            completed: false,
            completed_at: None,
        }
    }
}

#[derive(Debug)]
pub struct OnboardingContext {
    progress: OnboardingProgress,
    path: PathBuf,
}

impl OnboardingContext {
    /// Default location: ~/.local/share/meeting-onboarding/onboarding.json
    pub fn default_path() -> PathBuf {
        let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("meeting-onboarding");
        p.push("onboarding.json");
        p
    }

    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load from disk, returning a fresh record if missing or unreadable.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let progress = match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Discarding corrupt onboarding state at {}: {e}", path.display());
                OnboardingProgress::default()
            }),
            Err(_) => OnboardingProgress::default(),
        };
        Self { progress, path }
    }

    pub fn into_shared(self) -> SharedContext {
        Rc::new(RefCell::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn progress(&self) -> &OnboardingProgress {
        &self.progress
    }

    pub fn selected_summary_model(&self) -> &str {
        &self.progress.selected_summary_model
    }

    pub fn is_downloaded(&self, role: ModelRole) -> bool {
        match role {
            ModelRole::Transcription => self.progress.transcription_downloaded,
            ModelRole::Summary => self.progress.summary_downloaded,
        }
    }

    /// True while either tracked model still has to be fetched.
    pub fn needs_downloads(&self) -> bool {
        !self.progress.transcription_downloaded || !self.progress.summary_downloaded
    }

    pub fn permission(&self, kind: PermissionKind) -> PermissionStatus {
        self.progress.permissions.get(kind)
    }

    pub fn permissions(&self) -> PermissionStatuses {
        self.progress.permissions
    }

    pub fn permissions_skipped(&self) -> bool {
        self.progress.permissions_skipped
    }

    pub fn is_completed(&self) -> bool {
        self.progress.completed
    }

    pub fn set_selected_summary_model(&mut self, model: &str) {
        if self.progress.selected_summary_model == model {
            return;
        }
        self.progress.selected_summary_model = model.to_string();
        self.persist();
    }

    /// Flip the downloaded flag for `role`. Returns `true` only the first
    /// time; the flag is never cleared.
    pub fn mark_downloaded(&mut self, role: ModelRole) -> bool {
        let flag = match role {
            ModelRole::Transcription => &mut self.progress.transcription_downloaded,
            ModelRole::Summary => &mut self.progress.summary_downloaded,
        };
        if *flag {
            return false;
        }
        *flag = true;
        log::info!("{role:?} model marked as downloaded");
        self.persist();
        true
    }

    pub fn set_permission_status(&mut self, kind: PermissionKind, status: PermissionStatus) {
        self.progress.permissions.set(kind, status);
        self.persist();
    }

    pub fn set_permissions_skipped(&mut self, skipped: bool) {
        self.progress.permissions_skipped = skipped;
        self.persist();
    }

    /// Mark onboarding as finished. Unlike the other mutators a failed write
    /// is reported, and the record stays incomplete so the user can retry.
    pub fn complete(&mut self) -> Result<(), StoreError> {
        let previous = self.progress.clone();
        self.progress.completed = true;
        self.progress.completed_at = Some(Utc::now());
        if let Err(e) = self.save() {
            self.progress = previous;
            return Err(e);
        }
        log::info!("Onboarding completed");
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(&self.progress)?;
        fs::write(&self.path, data)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            log::warn!("Failed to persist onboarding state: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_context() -> (OnboardingContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = OnboardingContext::load_from(dir.path().join("onboarding.json"));
        (ctx, dir)
    }

    #[test]
    fn fresh_context_needs_both_downloads() {
        let (ctx, _dir) = temp_context();
        assert!(ctx.needs_downloads());
        assert_eq!(ctx.selected_summary_model(), DEFAULT_SUMMARY_MODEL);
        assert_eq!(ctx.permission(PermissionKind::Microphone), PermissionStatus::Undetermined);
        assert!(!ctx.is_completed());
    }

    #[test]
    fn mark_downloaded_reports_first_transition_only() {
        let (mut ctx, _dir) = temp_context();
        assert!(ctx.mark_downloaded(ModelRole::Transcription));
        assert!(!ctx.mark_downloaded(ModelRole::Transcription));
        assert!(ctx.is_downloaded(ModelRole::Transcription));
        assert!(ctx.needs_downloads());

        assert!(ctx.mark_downloaded(ModelRole::Summary));
        assert!(!ctx.needs_downloads());
    }

    #[test]
    fn mutations_survive_reload() {
        let (mut ctx, _dir) = temp_context();
        ctx.set_selected_summary_model("gemma3:4b");
        ctx.mark_downloaded(ModelRole::Summary);
        ctx.set_permission_status(PermissionKind::SystemAudio, PermissionStatus::Denied);
        ctx.set_permissions_skipped(true);

        let reloaded = OnboardingContext::load_from(ctx.path().to_path_buf());
        assert_eq!(reloaded.selected_summary_model(), "gemma3:4b");
        assert!(reloaded.is_downloaded(ModelRole::Summary));
        assert!(!reloaded.is_downloaded(ModelRole::Transcription));
        assert_eq!(reloaded.permission(PermissionKind::SystemAudio), PermissionStatus::Denied);
        assert!(reloaded.permissions_skipped());
    }

    #[test]
    fn complete_stamps_and_persists() {
        let (mut ctx, _dir) = temp_context();
        ctx.complete().expect("complete");
        let reloaded = OnboardingContext::load_from(ctx.path().to_path_buf());
        assert!(reloaded.is_completed());
        assert!(reloaded.progress().completed_at.is_some());
    }

    #[test]
    fn failed_complete_leaves_record_incomplete() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A directory where the file should be makes the write fail.
        let path = dir.path().join("onboarding.json");
        fs::create_dir_all(&path).expect("create blocking dir");
        let mut ctx = OnboardingContext::load_from(path);

        assert!(ctx.complete().is_err());
        assert!(!ctx.is_completed());
        assert!(ctx.progress().completed_at.is_none());
    }

    #[test]
    fn finalize_reports_reload_or_notice() {
        let (ctx, _dir) = temp_context();
        let ctx = ctx.into_shared();
        let outcome = finalize_onboarding(&ctx, Duration::from_millis(100), Duration::from_secs(5));
        assert_eq!(
            outcome,
            FinalizeOutcome::Reload {
                after: Duration::from_millis(100)
            }
        );

        let dir = tempfile::tempdir().expect("tempdir");
        let blocked = dir.path().join("onboarding.json");
        fs::create_dir_all(&blocked).expect("create blocking dir");
        let broken = OnboardingContext::load_from(blocked).into_shared();
        let FinalizeOutcome::Failed(notice) =
            finalize_onboarding(&broken, Duration::from_millis(100), Duration::from_secs(5))
        else {
            panic!("expected a failure notice");
        };
        assert_eq!(notice.title, "Failed to complete setup");
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("onboarding.json");
        fs::write(&path, "][").expect("write");
        let ctx = OnboardingContext::load_from(path);
        assert_eq!(ctx.progress(), &OnboardingProgress::default());
    }
}
