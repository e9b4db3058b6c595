//! Integration tests: both onboarding screens driven through a scripted
//! native bridge and the shared event hub, with state persisted to a temp dir.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use meeting_onboarding::download::{ContinueAction, DownloadStatus};
use meeting_onboarding::models::{ModelRole, TRANSCRIPTION_MODEL};
use meeting_onboarding::permissions::{PermissionKind, PermissionStatus, TriggerOutcome};
use meeting_onboarding::simulator::SimulatedBackend;
use meeting_onboarding::{
    BridgeError, Config, DownloadProgressStep, EventHub, FinalizeOutcome, NativeBridge,
    OnboardingContext, PermissionsStep, Platform, SharedContext,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedBridge {
    recommended: Option<String>,
    /// Never answer the recommendation request.
    stall_recommendation: bool,
    fail_start: bool,
    microphone: Option<bool>,
    system_audio: Option<bool>,
    settings_open: bool,
    start_calls: AtomicUsize,
    request_calls: AtomicUsize,
    settings_calls: AtomicUsize,
    log: Mutex<Vec<&'static str>>,
}

impl ScriptedBridge {
    fn record(&self, command: &'static str) {
        self.log.lock().push(command);
    }
}

#[async_trait]
impl NativeBridge for ScriptedBridge {
    async fn get_recommended_summary_model(&self) -> Result<String, BridgeError> {
        self.record("get_recommended_summary_model");
        if self.stall_recommendation {
            std::future::pending::<()>().await;
        }
        self.recommended
            .clone()
            .ok_or_else(|| BridgeError::failed("get_recommended_summary_model", "no hardware info"))
    }

    async fn start_background_downloads(&self, _force: bool) -> Result<(), BridgeError> {
        self.record("start_background_downloads");
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(BridgeError::failed("start_background_downloads", "disk full"));
        }
        Ok(())
    }

    async fn open_system_settings(&self) -> Result<(), BridgeError> {
        self.settings_calls.fetch_add(1, Ordering::SeqCst);
        if self.settings_open {
            Ok(())
        } else {
            Err(BridgeError::failed("open_system_settings", "unsupported"))
        }
    }

    async fn request_microphone_permission(&self) -> Result<bool, BridgeError> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        self.microphone
            .ok_or_else(|| BridgeError::failed("request_microphone_permission", "no device"))
    }

    async fn request_system_audio_permission(&self) -> Result<bool, BridgeError> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        self.system_audio
            .ok_or_else(|| BridgeError::failed("request_system_audio_permission", "silent"))
    }
}

fn temp_context() -> (SharedContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let ctx = OnboardingContext::load_from(dir.path().join("onboarding.json")).into_shared();
    (ctx, dir)
}

fn config_for(platform: Platform) -> Config {
    Config {
        platform: Some(platform),
        ..Config::default()
    }
}

fn drain(step: &RefCell<DownloadProgressStep>, sub: &meeting_onboarding::Subscription) -> usize {
    let mut handled = 0;
    while let Some(event) = sub.try_recv() {
        if step.borrow_mut().handle_event(&event) {
            handled += 1;
        }
    }
    handled
}

// ---------------------------------------------------------------------------
// Download step
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mount_fetches_recommendation_and_starts_downloads() {
    let (ctx, _dir) = temp_context();
    let bridge = ScriptedBridge {
        recommended: Some("gemma3:4b".into()),
        ..Default::default()
    };
    let step = RefCell::new(DownloadProgressStep::new(ctx.clone(), &config_for(Platform::Other)));

    DownloadProgressStep::on_mount(&step, &bridge).await;

    let mut calls = bridge.log.lock().clone();
    calls.sort_unstable();
    assert_eq!(calls, vec!["get_recommended_summary_model", "start_background_downloads"]);
    assert_eq!(ctx.borrow().selected_summary_model(), "gemma3:4b");
    let view = step.borrow().view();
    assert_eq!(view.summary.subtitle, "~2.5 GB");
    assert_eq!(view.transcription.state.status, DownloadStatus::Downloading);

    // A second mount-time call on the same step does not re-issue the request.
    DownloadProgressStep::start_downloads(&step, &bridge).await;
    assert_eq!(bridge.start_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stalled_recommendation_does_not_hold_back_downloads() {
    let (ctx, _dir) = temp_context();
    let bridge = ScriptedBridge {
        stall_recommendation: true,
        ..Default::default()
    };
    let step = RefCell::new(DownloadProgressStep::new(ctx.clone(), &config_for(Platform::Other)));

    let mounted = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        DownloadProgressStep::on_mount(&step, &bridge),
    )
    .await;

    assert!(mounted.is_err(), "recommendation should still be pending");
    assert_eq!(bridge.start_calls.load(Ordering::SeqCst), 1);
    let view = step.borrow().view();
    assert_eq!(view.transcription.state.status, DownloadStatus::Downloading);
    // The summary card keeps the configured default until an answer arrives.
    assert_eq!(ctx.borrow().selected_summary_model(), "gemma3:1b");
}

#[tokio::test]
async fn remount_with_both_models_downloaded_skips_start_request() {
    let (ctx, _dir) = temp_context();
    ctx.borrow_mut().mark_downloaded(ModelRole::Transcription);
    ctx.borrow_mut().mark_downloaded(ModelRole::Summary);
    let bridge = ScriptedBridge::default();
    let step = RefCell::new(DownloadProgressStep::new(ctx, &config_for(Platform::Other)));

    DownloadProgressStep::on_mount(&step, &bridge).await;

    assert_eq!(bridge.start_calls.load(Ordering::SeqCst), 0);
    let view = step.borrow().view();
    assert_eq!(view.transcription.state.status, DownloadStatus::Completed);
    assert_eq!(view.summary.state.status, DownloadStatus::Completed);
    assert!(view.continue_enabled);
}

#[tokio::test]
async fn failed_start_marks_transcription_card_as_error() {
    let (ctx, _dir) = temp_context();
    let bridge = ScriptedBridge {
        fail_start: true,
        ..Default::default()
    };
    let step = RefCell::new(DownloadProgressStep::new(ctx.clone(), &config_for(Platform::Other)));

    DownloadProgressStep::on_mount(&step, &bridge).await;

    let s = step.borrow();
    assert_eq!(s.transcription().status, DownloadStatus::Error);
    let message = s.transcription().error.clone().expect("error message");
    assert!(message.contains("disk full"), "{message}");
    assert!(!s.can_continue());
    // The recommendation failed too; the selection keeps its default.
    assert_eq!(ctx.borrow().selected_summary_model(), "gemma3:1b");
}

#[test]
fn transcription_progress_at_45_shows_spinner_and_blocks_continue() {
    let (ctx, _dir) = temp_context();
    let hub = EventHub::new();
    let step = RefCell::new(DownloadProgressStep::new(ctx, &config_for(Platform::Other)));
    let sub = DownloadProgressStep::subscribe(&hub);

    hub.emit_wire(
        "parakeet-model-download-progress",
        json!({"modelName": TRANSCRIPTION_MODEL, "progress": 45, "status": "downloading"}),
    )
    .expect("emit");
    assert_eq!(drain(&step, &sub), 1);

    let view = step.borrow().view();
    assert_eq!(view.transcription.state.status, DownloadStatus::Downloading);
    assert_eq!(view.transcription.state.percent_text(), "45%");
    assert!(!view.continue_enabled);
    assert!(view.continue_busy);
}

#[test]
fn transcription_complete_enables_continue_while_summary_downloads() {
    let (ctx, _dir) = temp_context();
    let hub = EventHub::new();
    let step = RefCell::new(DownloadProgressStep::new(ctx.clone(), &config_for(Platform::Other)));
    let sub = DownloadProgressStep::subscribe(&hub);

    hub.emit_wire(
        "builtin-ai-download-progress",
        json!({"model": "gemma3:1b", "progress": 30, "downloaded_mb": 241.8,
               "total_mb": 806.0, "speed_mbps": 9.4, "status": "downloading"}),
    )
    .expect("emit summary");
    hub.emit_wire(
        "parakeet-model-download-complete",
        json!({"modelName": TRANSCRIPTION_MODEL}),
    )
    .expect("emit complete");
    assert_eq!(drain(&step, &sub), 2);

    assert!(ctx.borrow().is_downloaded(ModelRole::Transcription));
    assert!(!ctx.borrow().is_downloaded(ModelRole::Summary));
    let view = step.borrow().view();
    assert!(view.continue_enabled);
    assert!(view.show_background_hint);
    assert_eq!(view.summary.state.size_text(), "241.8 MB / 806.0 MB");

    // Non-macOS: Continue finalizes straight away, with the background notice.
    let outcome = step.borrow_mut().continue_clicked();
    assert_eq!(outcome.action, ContinueAction::Finalize);
    let notice = outcome.notice.expect("background notice");
    assert_eq!(notice.title, "Downloads will continue in the background");
    assert!(!step.borrow().view().continue_enabled, "finalize in flight");

    assert!(matches!(step.borrow_mut().finalize(), FinalizeOutcome::Reload { .. }));
    assert!(ctx.borrow().is_completed());
}

#[test]
fn macos_continue_goes_to_permissions() {
    let (ctx, _dir) = temp_context();
    ctx.borrow_mut().mark_downloaded(ModelRole::Transcription);
    ctx.borrow_mut().mark_downloaded(ModelRole::Summary);
    let mut step = DownloadProgressStep::new(ctx.clone(), &config_for(Platform::Macos));

    let outcome = step.continue_clicked();
    assert_eq!(outcome.action, ContinueAction::GoToPermissions);
    assert!(outcome.notice.is_none());
    assert_eq!(step.view().total_steps, 4);
    assert!(!ctx.borrow().is_completed());
}

#[test]
fn events_for_other_models_are_ignored() {
    let (ctx, _dir) = temp_context();
    let hub = EventHub::new();
    let step = RefCell::new(DownloadProgressStep::new(ctx.clone(), &config_for(Platform::Other)));
    let sub = DownloadProgressStep::subscribe(&hub);

    hub.emit_wire(
        "builtin-ai-download-progress",
        json!({"model": "mistral:7b", "progress": 100, "status": "completed"}),
    )
    .expect("emit");
    hub.emit_wire(
        "parakeet-model-download-complete",
        json!({"modelName": "parakeet-tdt-0.6b-v2"}),
    )
    .expect("emit");

    assert_eq!(drain(&step, &sub), 0);
    assert!(ctx.borrow().needs_downloads());
    assert_eq!(step.borrow().summary().status, DownloadStatus::Waiting);
}

#[test]
fn unmounting_releases_the_listener() {
    let (ctx, _dir) = temp_context();
    let hub = EventHub::new();
    {
        let _step = DownloadProgressStep::new(ctx, &config_for(Platform::Other));
        let _sub = DownloadProgressStep::subscribe(&hub);
        assert_eq!(hub.listener_count(), 1);
    }
    assert_eq!(hub.listener_count(), 0);
}

#[tokio::test]
async fn simulated_backend_drives_step_to_completion() {
    let (ctx, _dir) = temp_context();
    let mut config = config_for(Platform::Other);
    config.simulator.tick_ms = 1;
    config.simulator.step_percent = 25.0;
    let hub = EventHub::new();
    let backend = Arc::new(SimulatedBackend::new(hub.clone(), &config));
    let step = RefCell::new(DownloadProgressStep::new(ctx.clone(), &config));
    let sub = DownloadProgressStep::subscribe(&hub);

    DownloadProgressStep::on_mount(&step, backend.as_ref()).await;

    while ctx.borrow().needs_downloads() {
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), sub.recv())
            .await
            .expect("event before timeout")
            .expect("hub alive");
        step.borrow_mut().handle_event(&event);
    }

    let view = step.borrow().view();
    assert_eq!(view.transcription.state.status, DownloadStatus::Completed);
    assert_eq!(view.summary.state.status, DownloadStatus::Completed);
    assert!(!view.show_background_hint);
    assert!(view.continue_enabled);
}

// ---------------------------------------------------------------------------
// Permissions step
// ---------------------------------------------------------------------------

#[tokio::test]
async fn denied_microphone_switches_to_settings_and_never_rerequests() {
    let (ctx, _dir) = temp_context();
    let bridge = ScriptedBridge {
        microphone: Some(false),
        settings_open: false,
        ..Default::default()
    };
    let step = RefCell::new(PermissionsStep::new(ctx.clone(), &config_for(Platform::Macos)));

    let first = PermissionsStep::trigger(&step, &bridge, PermissionKind::Microphone).await;
    assert_eq!(first, TriggerOutcome::Updated(PermissionStatus::Denied));
    assert!(!step.borrow().view().finish_enabled);
    assert_eq!(step.borrow().view().rows[0].button_label, "Open Settings");

    let second = PermissionsStep::trigger(&step, &bridge, PermissionKind::Microphone).await;
    assert_eq!(
        second,
        TriggerOutcome::ShowInstructions(
            "Please enable microphone access in System Preferences > Security & Privacy > Microphone"
        )
    );
    assert_eq!(bridge.request_calls.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.settings_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.borrow().permission(PermissionKind::Microphone), PermissionStatus::Denied);
}

#[tokio::test]
async fn request_failure_is_treated_as_denied() {
    let (ctx, _dir) = temp_context();
    let bridge = ScriptedBridge {
        microphone: Some(true),
        system_audio: None,
        settings_open: true,
        ..Default::default()
    };
    let step = RefCell::new(PermissionsStep::new(ctx, &config_for(Platform::Macos)));

    let outcome = PermissionsStep::trigger(&step, &bridge, PermissionKind::SystemAudio).await;
    assert_eq!(outcome, TriggerOutcome::Updated(PermissionStatus::Denied));

    let outcome = PermissionsStep::trigger(&step, &bridge, PermissionKind::SystemAudio).await;
    assert_eq!(outcome, TriggerOutcome::SettingsOpened);
    assert_eq!(bridge.request_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn both_authorized_enables_finish_and_reloads() {
    let (ctx, dir) = temp_context();
    let bridge = ScriptedBridge {
        microphone: Some(true),
        system_audio: Some(true),
        ..Default::default()
    };
    let step = RefCell::new(PermissionsStep::new(ctx, &config_for(Platform::Macos)));
    step.borrow().log_current_state();

    for kind in PermissionKind::ALL {
        let outcome = PermissionsStep::trigger(&step, &bridge, kind).await;
        assert_eq!(outcome, TriggerOutcome::Updated(PermissionStatus::Authorized));
    }
    assert!(step.borrow().view().finish_enabled);

    let outcome = step.borrow_mut().finish();
    assert_eq!(
        outcome,
        FinalizeOutcome::Reload {
            after: std::time::Duration::from_millis(100)
        }
    );

    let reloaded = OnboardingContext::load_from(dir.path().join("onboarding.json"));
    assert!(reloaded.is_completed());
    assert!(!reloaded.permissions_skipped());
    assert!(reloaded.permissions().all_authorized());
}

#[test]
fn skip_persists_flag_and_completes() {
    let (ctx, dir) = temp_context();
    let mut step = PermissionsStep::new(ctx, &config_for(Platform::Macos));

    assert!(matches!(step.skip(), FinalizeOutcome::Reload { .. }));

    let reloaded = OnboardingContext::load_from(dir.path().join("onboarding.json"));
    assert!(reloaded.is_completed());
    assert!(reloaded.permissions_skipped());
    assert_eq!(reloaded.permission(PermissionKind::Microphone), PermissionStatus::Undetermined);
}
