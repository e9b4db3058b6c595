use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use gtk4::glib;
use gtk4::prelude::*;
use libadwaita::prelude::*;

use meeting_onboarding::download::{CardView, ContinueAction, DownloadProgressStep, DownloadStatus};
use meeting_onboarding::{Config, EventHub, FinalizeOutcome, NativeBridge, SharedContext};

use super::ShellEvent;

struct CardWidgets {
    row: libadwaita::ActionRow,
    status: gtk4::Stack,
    progress_bar: gtk4::ProgressBar,
    detail_label: gtk4::Label,
    error_label: gtk4::Label,
}

/// The "Getting things ready" page.
pub struct DownloadPage {
    pub root: gtk4::Box,
    step: Rc<RefCell<DownloadProgressStep>>,
    step_label: gtk4::Label,
    transcription: CardWidgets,
    summary: CardWidgets,
    hint: gtk4::Revealer,
    continue_button: gtk4::Button,
    continue_stack: gtk4::Stack,
    pump: RefCell<Option<glib::JoinHandle<()>>>,
}

fn build_card(title: &str, description: &str) -> (libadwaita::PreferencesGroup, CardWidgets) {
    let group = libadwaita::PreferencesGroup::new();
    group.set_margin_top(12);

    let row = libadwaita::ActionRow::builder()
        .title(title)
        .subtitle(description)
        .build();

    let status = gtk4::Stack::new();
    status.set_valign(gtk4::Align::Center);
    let waiting = gtk4::Label::new(Some("Waiting..."));
    waiting.add_css_class("dim-label");
    status.add_named(&waiting, Some("waiting"));
    let spinner = gtk4::Spinner::new();
    spinner.start();
    status.add_named(&spinner, Some("downloading"));
    let done = gtk4::Image::from_icon_name("emblem-ok-symbolic");
    done.add_css_class("success");
    status.add_named(&done, Some("completed"));
    let failed = gtk4::Image::from_icon_name("dialog-error-symbolic");
    failed.add_css_class("error");
    status.add_named(&failed, Some("error"));
    row.add_suffix(&status);
    group.add(&row);

    let details = gtk4::Box::new(gtk4::Orientation::Vertical, 4);
    details.set_margin_top(6);

    let progress_bar = gtk4::ProgressBar::new();
    progress_bar.set_visible(false);
    details.append(&progress_bar);

    let detail_label = gtk4::Label::new(None);
    detail_label.set_xalign(0.0);
    detail_label.add_css_class("caption");
    detail_label.add_css_class("dim-label");
    detail_label.set_visible(false);
    details.append(&detail_label);

    let error_label = gtk4::Label::new(None);
    error_label.set_xalign(0.0);
    error_label.set_wrap(true);
    error_label.add_css_class("caption");
    error_label.add_css_class("error");
    error_label.set_visible(false);
    details.append(&error_label);

    group.add(&details);

    (
        group,
        CardWidgets {
            row,
            status,
            progress_bar,
            detail_label,
            error_label,
        },
    )
}

fn update_card(card: &CardWidgets, view: &CardView) {
    let state = &view.state;
    card.row
        .set_subtitle(&format!("{} · {}", view.model_name, view.subtitle));
    card.status.set_visible_child_name(match state.status {
        DownloadStatus::Waiting => "waiting",
        DownloadStatus::Downloading => "downloading",
        DownloadStatus::Completed => "completed",
        DownloadStatus::Error => "error",
    });

    card.progress_bar.set_visible(state.shows_progress_bar());
    card.progress_bar.set_fraction(state.fraction());

    let downloading = state.status == DownloadStatus::Downloading;
    card.detail_label.set_visible(downloading);
    if downloading {
        let text = match state.speed_text() {
            Some(speed) => format!("{} · {} · {}", state.size_text(), speed, state.percent_text()),
            None => format!("{} · {}", state.size_text(), state.percent_text()),
        };
        card.detail_label.set_text(&text);
    }

    match &state.error {
        Some(message) => {
            card.error_label.set_text(message);
            card.error_label.set_visible(true);
        }
        None => card.error_label.set_visible(false),
    }
}

impl DownloadPage {
    /// Build the page, subscribe to both progress streams and run the
    /// mount-time requests.
    pub fn mount(
        ctx: SharedContext,
        config: &Config,
        hub: &EventHub,
        bridge: Arc<dyn NativeBridge>,
        events: async_channel::Sender<ShellEvent>,
    ) -> Rc<Self> {
        let step = Rc::new(RefCell::new(DownloadProgressStep::new(ctx, config)));

        let root = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
        root.set_margin_start(24);
        root.set_margin_end(24);
        root.set_margin_top(18);
        root.set_margin_bottom(18);

        let step_label = gtk4::Label::new(None);
        step_label.add_css_class("caption");
        step_label.add_css_class("dim-label");
        root.append(&step_label);

        let title = gtk4::Label::new(Some("Getting things ready"));
        title.add_css_class("title-1");
        title.set_margin_top(6);
        root.append(&title);

        let subtitle = gtk4::Label::new(Some(
            "You can start using the app after downloading the Transcription Engine.",
        ));
        subtitle.add_css_class("dim-label");
        subtitle.set_wrap(true);
        subtitle.set_justify(gtk4::Justification::Center);
        root.append(&subtitle);

        let (transcription_group, transcription) =
            build_card("Transcription Engine", "Speech recognition");
        root.append(&transcription_group);
        let (summary_group, summary) = build_card("Summary Engine", "Meeting summaries");
        root.append(&summary_group);

        let hint_label = gtk4::Label::new(Some("You can continue while this finishes"));
        hint_label.add_css_class("dim-label");
        hint_label.set_wrap(true);
        let hint = gtk4::Revealer::builder()
            .child(&hint_label)
            .transition_type(gtk4::RevealerTransitionType::SlideDown)
            .margin_top(12)
            .build();
        root.append(&hint);

        let continue_stack = gtk4::Stack::new();
        continue_stack.add_named(&gtk4::Label::new(Some("Continue")), Some("label"));
        let busy = gtk4::Spinner::new();
        busy.start();
        continue_stack.add_named(&busy, Some("busy"));

        let continue_button = gtk4::Button::builder()
            .child(&continue_stack)
            .halign(gtk4::Align::Center)
            .margin_top(18)
            .build();
        continue_button.add_css_class("suggested-action");
        continue_button.add_css_class("pill");
        root.append(&continue_button);

        let page = Rc::new(Self {
            root,
            step,
            step_label,
            transcription,
            summary,
            hint,
            continue_button,
            continue_stack,
            pump: RefCell::new(None),
        });
        page.refresh();

        // Continue
        {
            let weak = Rc::downgrade(&page);
            page.continue_button.connect_clicked(move |_| {
                let Some(page) = weak.upgrade() else { return };
                page.on_continue(&events);
            });
        }

        // Event pump, alive until unmount
        {
            let sub = DownloadProgressStep::subscribe(hub);
            let weak = Rc::downgrade(&page);
            let pump = glib::spawn_future_local(async move {
                while let Some(event) = sub.recv().await {
                    let Some(page) = weak.upgrade() else { break };
                    if page.step.borrow_mut().handle_event(&event) {
                        page.refresh();
                    }
                }
            });
            *page.pump.borrow_mut() = Some(pump);
        }

        // Recommendation, then the start request
        {
            let weak = Rc::downgrade(&page);
            let step = page.step.clone();
            glib::spawn_future_local(async move {
                DownloadProgressStep::on_mount(&step, bridge.as_ref()).await;
                if let Some(page) = weak.upgrade() {
                    page.refresh();
                }
            });
        }

        page
    }

    fn on_continue(&self, events: &async_channel::Sender<ShellEvent>) {
        let outcome = self.step.borrow_mut().continue_clicked();
        if let Some(notice) = outcome.notice {
            let _ = events.try_send(ShellEvent::Notice(notice));
        }
        match outcome.action {
            ContinueAction::Ignored => {}
            ContinueAction::GoToPermissions => {
                let _ = events.try_send(ShellEvent::ShowPermissions);
            }
            ContinueAction::Finalize => {
                self.refresh();
                let result = self.step.borrow_mut().finalize();
                match result {
                    FinalizeOutcome::Reload { after } => {
                        let _ = events.try_send(ShellEvent::Reload(after));
                    }
                    FinalizeOutcome::Failed(notice) => {
                        let _ = events.try_send(ShellEvent::Notice(notice));
                    }
                    FinalizeOutcome::Ignored => {}
                }
                self.refresh();
            }
        }
    }

    pub fn refresh(&self) {
        let view = self.step.borrow().view();
        self.step_label
            .set_text(&format!("Step {} of {}", view.step, view.total_steps));
        update_card(&self.transcription, &view.transcription);
        update_card(&self.summary, &view.summary);
        self.hint.set_reveal_child(view.show_background_hint);
        self.continue_button.set_sensitive(view.continue_enabled);
        self.continue_stack
            .set_visible_child_name(if view.continue_busy { "busy" } else { "label" });
    }

    /// Stop listening. Downloads keep going in the backend.
    pub fn unmount(&self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            log::debug!("Download page unmounted");
        }
    }
}

impl Drop for DownloadPage {
    fn drop(&mut self) {
        self.unmount();
    }
}
