//! The "Getting things ready" step: two download cards and a Continue gate.
//!
//! Only the transcription model gates Continue. The summary model may still
//! be downloading when the user moves on; the backend keeps going.

use std::cell::RefCell;
use std::time::Duration;

use crate::bridge::NativeBridge;
use crate::config::Config;
use crate::context::{finalize_onboarding, FinalizeOutcome, SharedContext};
use crate::error::{BridgeError, StepError};
use crate::events::{EventHub, EventKind, NativeEvent, ProgressPayload, Subscription};
use crate::models::{self, ModelRole};
use crate::notice::Notice;
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Waiting,
    Downloading,
    Completed,
    Error,
}

/// What one download card shows.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadState {
    pub status: DownloadStatus,
    /// Percent, 0–100.
    pub progress: f64,
    pub downloaded_mb: f64,
    pub total_mb: f64,
    pub speed_mbps: f64,
    pub error: Option<String>,
}

impl DownloadState {
    pub fn new(already_downloaded: bool, total_mb: f64) -> Self {
        if already_downloaded {
            Self {
                status: DownloadStatus::Completed,
                progress: 100.0,
                downloaded_mb: total_mb,
                total_mb,
                speed_mbps: 0.0,
                error: None,
            }
        } else {
            Self {
                status: DownloadStatus::Waiting,
                progress: 0.0,
                downloaded_mb: 0.0,
                total_mb,
                speed_mbps: 0.0,
                error: None,
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DownloadStatus::Completed | DownloadStatus::Error)
    }

    /// The start request went out.
    fn begin(&mut self) {
        if self.status == DownloadStatus::Waiting {
            self.status = DownloadStatus::Downloading;
        }
    }

    /// Fold a progress event into the card. Fields the event leaves out keep
    /// their last value. A terminal card only accepts a completion signal.
    fn apply_progress(&mut self, p: &ProgressPayload) {
        let completes = p.reaches_completion();
        if self.is_terminal() && !(completes && self.status == DownloadStatus::Error) {
            return;
        }

        self.progress = p.progress.clamp(0.0, 100.0);
        if let Some(mb) = p.downloaded_mb {
            self.downloaded_mb = mb;
        }
        if let Some(mb) = p.total_mb {
            self.total_mb = mb;
        }
        if let Some(speed) = p.speed_mbps {
            self.speed_mbps = speed;
        }

        if completes {
            self.complete();
        } else {
            self.status = DownloadStatus::Downloading;
        }
    }

    fn complete(&mut self) {
        self.status = DownloadStatus::Completed;
        self.progress = 100.0;
        self.speed_mbps = 0.0;
        self.error = None;
    }

    fn fail(&mut self, message: String) {
        if self.status == DownloadStatus::Completed {
            return;
        }
        self.status = DownloadStatus::Error;
        self.error = Some(message);
    }

    pub fn shows_progress_bar(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Downloading | DownloadStatus::Completed
        )
    }

    pub fn fraction(&self) -> f64 {
        self.progress / 100.0
    }

    pub fn size_text(&self) -> String {
        format!("{:.1} MB / {:.1} MB", self.downloaded_mb, self.total_mb)
    }

    pub fn speed_text(&self) -> Option<String> {
        (self.speed_mbps > 0.0).then(|| format!("{:.1} MB/s", self.speed_mbps))
    }

    pub fn percent_text(&self) -> String {
        format!("{}%", self.progress.round() as u32)
    }
}

/// Rendering input for one card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub title: &'static str,
    /// Catalog display name of the tracked model.
    pub model_name: String,
    /// Approximate download size.
    pub subtitle: String,
    pub state: DownloadState,
}

/// Rendering input for the whole step.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadView {
    pub step: u32,
    pub total_steps: u32,
    pub transcription: CardView,
    pub summary: CardView,
    /// "You can continue while this finishes."
    pub show_background_hint: bool,
    pub continue_enabled: bool,
    /// Continue shows a spinner instead of its label.
    pub continue_busy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinueAction {
    /// Continue was not available.
    Ignored,
    GoToPermissions,
    /// Finalize now; call [`DownloadProgressStep::finalize`].
    Finalize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueOutcome {
    pub action: ContinueAction,
    pub notice: Option<Notice>,
}

pub struct DownloadProgressStep {
    ctx: SharedContext,
    platform: Platform,
    transcription_model: String,
    summary_aliases: Vec<String>,
    recommended_model: String,
    transcription: DownloadState,
    summary: DownloadState,
    start_requested: bool,
    finalizing: bool,
    finalize_delay: Duration,
    notice_timeout: Duration,
}

impl DownloadProgressStep {
    pub fn new(ctx: SharedContext, config: &Config) -> Self {
        let (transcription, summary, selected) = {
            let c = ctx.borrow();
            (
                DownloadState::new(
                    c.is_downloaded(ModelRole::Transcription),
                    models::size_mb_or_default(&config.transcription_model) as f64,
                ),
                DownloadState::new(
                    c.is_downloaded(ModelRole::Summary),
                    models::size_mb_or_default(c.selected_summary_model()) as f64,
                ),
                c.selected_summary_model().to_string(),
            )
        };

        Self {
            ctx,
            platform: config.platform(),
            transcription_model: config.transcription_model.clone(),
            summary_aliases: config.summary_model_aliases.clone(),
            recommended_model: selected,
            transcription,
            summary,
            start_requested: false,
            finalizing: false,
            finalize_delay: config.finalize_delay(),
            notice_timeout: config.notice_timeout(),
        }
    }

    /// Listen to both progress streams for as long as the step is mounted.
    pub fn subscribe(hub: &EventHub) -> Subscription {
        let mut kinds = EventKind::TRANSCRIPTION.to_vec();
        kinds.push(EventKind::SummaryProgress);
        hub.listen(&kinds)
    }

    pub fn transcription(&self) -> &DownloadState {
        &self.transcription
    }

    pub fn summary(&self) -> &DownloadState {
        &self.summary
    }

    pub fn recommended_model(&self) -> &str {
        &self.recommended_model
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    fn transcription_downloaded(&self) -> bool {
        self.ctx.borrow().is_downloaded(ModelRole::Transcription)
    }

    pub fn can_continue(&self) -> bool {
        self.transcription_downloaded() && !self.finalizing
    }

    pub fn show_background_hint(&self) -> bool {
        let c = self.ctx.borrow();
        c.is_downloaded(ModelRole::Transcription) && !c.is_downloaded(ModelRole::Summary)
    }

    /// Whether a summary stream event is about the model we track: the
    /// selected one, or any configured alias.
    pub fn matches_summary_model(&self, model: &str) -> bool {
        model == self.ctx.borrow().selected_summary_model()
            || self.summary_aliases.iter().any(|alias| alias == model)
    }

    pub fn apply_recommendation(&mut self, result: Result<String, BridgeError>) {
        let model = match result {
            Ok(model) => model,
            Err(e) => {
                log::error!("Failed to get recommended model: {e}");
                return;
            }
        };
        log::info!("Recommended summary model: {model}");
        self.ctx.borrow_mut().set_selected_summary_model(&model);
        if !self.summary.is_terminal() && self.summary.downloaded_mb == 0.0 {
            self.summary.total_mb = models::size_mb_or_default(&model) as f64;
        }
        self.recommended_model = model;
    }

    /// Decide whether this mount should ask the backend to start downloading.
    ///
    /// Answers `true` at most once per mount, and never when the persisted
    /// context already has both models.
    pub fn begin_downloads(&mut self) -> bool {
        if self.start_requested {
            return false;
        }
        self.start_requested = true;

        let (transcription_done, summary_done) = {
            let c = self.ctx.borrow();
            (
                c.is_downloaded(ModelRole::Transcription),
                c.is_downloaded(ModelRole::Summary),
            )
        };
        if transcription_done && summary_done {
            log::info!("Both models already downloaded, not starting downloads");
            return false;
        }
        if !transcription_done {
            self.transcription.begin();
        }
        if !summary_done {
            self.summary.begin();
        }
        true
    }

    /// The start request was rejected. Only the transcription card reflects it.
    pub fn downloads_request_failed(&mut self, err: BridgeError) {
        let err = StepError::from(err);
        log::error!("Failed to start downloads: {err}");
        if !self.transcription_downloaded() {
            self.transcription.fail(err.to_string());
        }
    }

    /// Fold one native event into the step. Returns `false` for events about
    /// models this step does not track.
    pub fn handle_event(&mut self, event: &NativeEvent) -> bool {
        match event {
            NativeEvent::TranscriptionProgress(p) if p.model == self.transcription_model => {
                self.transcription.apply_progress(p);
                if p.reaches_completion() {
                    self.ctx.borrow_mut().mark_downloaded(ModelRole::Transcription);
                }
                true
            }
            NativeEvent::TranscriptionComplete { model } if *model == self.transcription_model => {
                self.transcription.complete();
                self.ctx.borrow_mut().mark_downloaded(ModelRole::Transcription);
                true
            }
            NativeEvent::TranscriptionError { model, error } if *model == self.transcription_model => {
                log::error!(
                    "{}",
                    StepError::Stream {
                        model: model.clone(),
                        message: error.clone(),
                    }
                );
                self.transcription.fail(error.clone());
                true
            }
            NativeEvent::SummaryProgress(p) if self.matches_summary_model(&p.model) => {
                self.summary.apply_progress(p);
                if p.reaches_completion() {
                    self.ctx.borrow_mut().mark_downloaded(ModelRole::Summary);
                }
                true
            }
            other => {
                log::trace!("Ignoring event for untracked model {}", other.model());
                false
            }
        }
    }

    /// The user pressed Continue.
    pub fn continue_clicked(&mut self) -> ContinueOutcome {
        if !self.can_continue() {
            return ContinueOutcome {
                action: ContinueAction::Ignored,
                notice: None,
            };
        }

        let downloads_complete = self.transcription.status == DownloadStatus::Completed
            && self.summary.status == DownloadStatus::Completed;
        let notice =
            (!downloads_complete).then(|| Notice::downloads_in_background(self.notice_timeout));

        let action = if self.platform.requires_permissions_step() {
            ContinueAction::GoToPermissions
        } else {
            self.finalizing = true;
            ContinueAction::Finalize
        };
        ContinueOutcome { action, notice }
    }

    /// Finish onboarding from this step (non-macOS path).
    pub fn finalize(&mut self) -> FinalizeOutcome {
        if !self.finalizing {
            return FinalizeOutcome::Ignored;
        }
        let outcome = finalize_onboarding(&self.ctx, self.finalize_delay, self.notice_timeout);
        if matches!(outcome, FinalizeOutcome::Failed(_)) {
            self.finalizing = false;
        }
        outcome
    }

    pub fn view(&self) -> DownloadView {
        let summary_size = models::size_label(models::size_mb_or_default(&self.recommended_model));
        let transcription_size =
            models::size_label(models::size_mb_or_default(&self.transcription_model));
        let downloaded = self.transcription_downloaded();

        DownloadView {
            step: 3,
            total_steps: self.platform.total_steps(),
            transcription: CardView {
                title: "Transcription Engine",
                model_name: models::display_name(&self.transcription_model),
                subtitle: transcription_size,
                state: self.transcription.clone(),
            },
            summary: CardView {
                title: "Summary Engine",
                model_name: models::display_name(&self.recommended_model),
                subtitle: summary_size,
                state: self.summary.clone(),
            },
            show_background_hint: self.show_background_hint(),
            continue_enabled: self.can_continue(),
            continue_busy: self.finalizing || !downloaded,
        }
    }

    /// Fetch the recommended summary model and record it in the context.
    pub async fn fetch_recommendation(step: &RefCell<Self>, bridge: &dyn NativeBridge) {
        let result = bridge.get_recommended_summary_model().await;
        step.borrow_mut().apply_recommendation(result);
    }

    /// Issue the start request if this mount needs one.
    pub async fn start_downloads(step: &RefCell<Self>, bridge: &dyn NativeBridge) {
        if !step.borrow_mut().begin_downloads() {
            return;
        }
        log::info!("Starting background downloads");
        if let Err(e) = bridge.start_background_downloads(true).await {
            step.borrow_mut().downloads_request_failed(e);
        }
    }

    /// Mount-time work. The recommendation fetch and the start request run
    /// side by side; a slow recommendation never holds back the downloads.
    pub async fn on_mount(step: &RefCell<Self>, bridge: &dyn NativeBridge) {
        tokio::join!(
            Self::fetch_recommendation(step, bridge),
            Self::start_downloads(step, bridge),
        );
    }
}
