use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use gtk4::glib;
use gtk4::prelude::*;
use libadwaita::prelude::*;

use meeting_onboarding::permissions::{
    PermissionKind, PermissionRowView, PermissionStatus, TriggerOutcome,
};
use meeting_onboarding::{Config, FinalizeOutcome, NativeBridge, PermissionsStep, SharedContext};

use super::ShellEvent;

struct RowWidgets {
    kind: PermissionKind,
    icon: gtk4::Image,
    button: gtk4::Button,
}

/// The "Grant Permissions" page.
pub struct PermissionsPage {
    pub root: gtk4::Box,
    step: Rc<RefCell<PermissionsStep>>,
    rows: Vec<RowWidgets>,
    hint: gtk4::Label,
    finish_button: gtk4::Button,
    skip_button: gtk4::Button,
}

fn status_icon(status: PermissionStatus) -> &'static str {
    match status {
        PermissionStatus::Undetermined => "dialog-question-symbolic",
        PermissionStatus::Authorized => "emblem-ok-symbolic",
        PermissionStatus::Denied => "action-unavailable-symbolic",
    }
}

fn update_row(row: &RowWidgets, view: &PermissionRowView) {
    row.icon.set_icon_name(Some(status_icon(view.status)));
    row.icon.remove_css_class("success");
    row.icon.remove_css_class("error");
    match view.status {
        PermissionStatus::Authorized => row.icon.add_css_class("success"),
        PermissionStatus::Denied => row.icon.add_css_class("error"),
        PermissionStatus::Undetermined => {}
    }
    row.button.set_label(view.button_label);
    row.button.set_sensitive(view.button_sensitive);
}

impl PermissionsPage {
    pub fn mount(
        ctx: SharedContext,
        config: &Config,
        bridge: Arc<dyn NativeBridge>,
        events: async_channel::Sender<ShellEvent>,
    ) -> Rc<Self> {
        let step = Rc::new(RefCell::new(PermissionsStep::new(ctx, config)));
        step.borrow().log_current_state();

        let root = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
        root.set_margin_start(24);
        root.set_margin_end(24);
        root.set_margin_top(18);
        root.set_margin_bottom(18);

        let step_label = gtk4::Label::new(Some(&format!(
            "Step 4 of {}",
            config.platform().total_steps()
        )));
        step_label.add_css_class("caption");
        step_label.add_css_class("dim-label");
        root.append(&step_label);

        let title = gtk4::Label::new(Some("Grant Permissions"));
        title.add_css_class("title-1");
        title.set_margin_top(6);
        root.append(&title);

        let subtitle = gtk4::Label::new(Some(
            "Meeting notes need access to your microphone and system audio.",
        ));
        subtitle.add_css_class("dim-label");
        subtitle.set_wrap(true);
        subtitle.set_justify(gtk4::Justification::Center);
        root.append(&subtitle);

        let group = libadwaita::PreferencesGroup::new();
        group.set_margin_top(18);
        let mut rows = Vec::new();
        for kind in PermissionKind::ALL {
            let row = libadwaita::ActionRow::builder()
                .title(kind.title())
                .subtitle(kind.description())
                .build();
            let icon = gtk4::Image::from_icon_name(status_icon(PermissionStatus::Undetermined));
            row.add_prefix(&icon);
            let button = gtk4::Button::builder()
                .label("Enable")
                .valign(gtk4::Align::Center)
                .build();
            row.add_suffix(&button);
            group.add(&row);
            rows.push(RowWidgets { kind, icon, button });
        }
        root.append(&group);

        let hint = gtk4::Label::new(Some(
            "Recording won't work without permissions. You can grant them later in settings.",
        ));
        hint.add_css_class("caption");
        hint.add_css_class("dim-label");
        hint.set_wrap(true);
        hint.set_margin_top(12);
        root.append(&hint);

        let finish_button = gtk4::Button::builder()
            .label("Finish Setup")
            .halign(gtk4::Align::Center)
            .margin_top(18)
            .build();
        finish_button.add_css_class("suggested-action");
        finish_button.add_css_class("pill");
        root.append(&finish_button);

        let skip_button = gtk4::Button::builder()
            .label("I'll do this later")
            .halign(gtk4::Align::Center)
            .margin_top(6)
            .build();
        skip_button.add_css_class("flat");
        root.append(&skip_button);

        let page = Rc::new(Self {
            root,
            step,
            rows,
            hint,
            finish_button,
            skip_button,
        });
        page.refresh();

        // Row buttons
        for row in &page.rows {
            let weak = Rc::downgrade(&page);
            let bridge = bridge.clone();
            let events = events.clone();
            let kind = row.kind;
            row.button.connect_clicked(move |_| {
                let Some(page) = weak.upgrade() else { return };
                page.set_rows_sensitive(false);
                let step = page.step.clone();
                let weak = weak.clone();
                let bridge = bridge.clone();
                let events = events.clone();
                glib::spawn_future_local(async move {
                    let outcome = PermissionsStep::trigger(&step, bridge.as_ref(), kind).await;
                    if let TriggerOutcome::ShowInstructions(body) = outcome {
                        let _ = events
                            .send(ShellEvent::Alert {
                                heading: "Open Settings",
                                body,
                            })
                            .await;
                    }
                    if let Some(page) = weak.upgrade() {
                        page.refresh();
                    }
                });
            });
        }

        // Finish
        {
            let weak = Rc::downgrade(&page);
            let events = events.clone();
            page.finish_button.connect_clicked(move |_| {
                let Some(page) = weak.upgrade() else { return };
                let outcome = page.step.borrow_mut().finish();
                page.after_finalize(outcome, &events);
            });
        }

        // Skip
        {
            let weak = Rc::downgrade(&page);
            page.skip_button.connect_clicked(move |_| {
                let Some(page) = weak.upgrade() else { return };
                let outcome = page.step.borrow_mut().skip();
                page.after_finalize(outcome, &events);
            });
        }

        page
    }

    fn after_finalize(&self, outcome: FinalizeOutcome, events: &async_channel::Sender<ShellEvent>) {
        match outcome {
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

    fn set_rows_sensitive(&self, sensitive: bool) {
        for row in &self.rows {
            row.button.set_sensitive(sensitive);
        }
    }

    pub fn refresh(&self) {
        let view = self.step.borrow().view();
        for (widgets, row) in self.rows.iter().zip(&view.rows) {
            update_row(widgets, row);
        }
        self.hint.set_visible(view.show_hint);
        self.finish_button.set_sensitive(view.finish_enabled);
        self.skip_button.set_sensitive(view.skip_enabled);
    }
}
