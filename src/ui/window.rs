use std::cell::RefCell;
use std::rc::Rc;

use gtk4::glib;
use gtk4::prelude::*;
use libadwaita::prelude::*;

use meeting_onboarding::notice::NoticeLevel;
use meeting_onboarding::{Notice, OnboardingContext, SharedContext};

use super::download_page::DownloadPage;
use super::permissions_page::PermissionsPage;
use super::{AppState, ShellEvent};

/// Pages currently mounted in a window.
#[derive(Default)]
struct Mounted {
    download: Option<Rc<DownloadPage>>,
    permissions: Option<Rc<PermissionsPage>>,
}

impl Mounted {
    fn teardown(&mut self) {
        if let Some(page) = self.download.take() {
            page.unmount();
        }
        self.permissions = None;
    }
}

fn build_toast(notice: &Notice) -> libadwaita::Toast {
    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 2);
    let title = gtk4::Label::new(Some(&notice.title));
    title.add_css_class("heading");
    if notice.level == NoticeLevel::Error {
        title.add_css_class("error");
    }
    content.append(&title);
    if !notice.description.is_empty() {
        let body = gtk4::Label::new(Some(&notice.description));
        body.add_css_class("caption");
        body.set_wrap(true);
        content.append(&body);
    }

    libadwaita::Toast::builder()
        .custom_title(&content)
        .timeout(notice.duration.as_secs() as u32)
        .build()
}

fn show_alert(parent: &libadwaita::ApplicationWindow, heading: &str, body: &str) {
    let dialog = libadwaita::AlertDialog::builder()
        .heading(heading)
        .body(body)
        .build();
    dialog.add_response("ok", "OK");
    let parent_widget: Option<&gtk4::Widget> = Some(parent.upcast_ref());
    dialog.choose(parent_widget, None::<&gtk4::gio::Cancellable>, |_| {});
}

fn build_completed_page() -> gtk4::Widget {
    libadwaita::StatusPage::builder()
        .icon_name("emblem-ok-symbolic")
        .title("You're all set")
        .description("Setup is complete. Models that are still downloading will finish in the background.")
        .build()
        .upcast()
}

/// Build and show a window for the onboarding state currently on disk.
pub fn present(app: &libadwaita::Application, state: &Rc<AppState>) {
    let ctx = OnboardingContext::load().into_shared();

    let window = libadwaita::ApplicationWindow::builder()
        .application(app)
        .title("Meeting Assistant Setup")
        .default_width(520)
        .default_height(640)
        .build();

    let toolbar_view = libadwaita::ToolbarView::new();
    toolbar_view.add_top_bar(&libadwaita::HeaderBar::new());

    if ctx.borrow().is_completed() {
        log::info!("Onboarding already completed");
        toolbar_view.set_content(Some(&build_completed_page()));
        window.set_content(Some(&toolbar_view));
        window.present();
        return;
    }

    let toast_overlay = libadwaita::ToastOverlay::new();
    let stack = gtk4::Stack::builder()
        .transition_type(gtk4::StackTransitionType::SlideLeft)
        .build();
    let scrolled = gtk4::ScrolledWindow::builder()
        .hscrollbar_policy(gtk4::PolicyType::Never)
        .child(&stack)
        .build();
    toast_overlay.set_child(Some(&scrolled));
    toolbar_view.set_content(Some(&toast_overlay));
    window.set_content(Some(&toolbar_view));

    let (events_tx, events_rx) = async_channel::unbounded::<ShellEvent>();
    let mounted = Rc::new(RefCell::new(Mounted::default()));

    let download = DownloadPage::mount(
        ctx.clone(),
        &state.config,
        &state.hub,
        state.bridge.clone(),
        events_tx.clone(),
    );
    stack.add_named(&download.root, Some("download"));
    mounted.borrow_mut().download = Some(download);

    // Page requests
    let shell = {
        let app = app.clone();
        let state = state.clone();
        let window = window.clone();
        let mounted = mounted.clone();
        glib::spawn_future_local(async move {
            while let Ok(event) = events_rx.recv().await {
                match event {
                    ShellEvent::Notice(notice) => toast_overlay.add_toast(build_toast(&notice)),
                    ShellEvent::Alert { heading, body } => show_alert(&window, heading, body),
                    ShellEvent::ShowPermissions => {
                        show_permissions(&ctx, &state, &stack, &mounted, &events_tx)
                    }
                    ShellEvent::Reload(after) => {
                        let app = app.clone();
                        let state = state.clone();
                        let window = window.clone();
                        glib::timeout_add_local_once(after, move || {
                            reload(&app, &state, &window);
                        });
                    }
                }
            }
        })
    };

    let shell = RefCell::new(Some(shell));
    window.connect_close_request(move |_| {
        mounted.borrow_mut().teardown();
        if let Some(shell) = shell.take() {
            shell.abort();
        }
        glib::Propagation::Proceed
    });

    window.present();
}

fn show_permissions(
    ctx: &SharedContext,
    state: &Rc<AppState>,
    stack: &gtk4::Stack,
    mounted: &Rc<RefCell<Mounted>>,
    events: &async_channel::Sender<ShellEvent>,
) {
    let mut mounted = mounted.borrow_mut();
    if mounted.permissions.is_some() {
        return;
    }
    let page = PermissionsPage::mount(
        ctx.clone(),
        &state.config,
        state.bridge.clone(),
        events.clone(),
    );
    stack.add_named(&page.root, Some("permissions"));
    stack.set_visible_child_name("permissions");
    mounted.permissions = Some(page);

    if let Some(download) = mounted.download.take() {
        download.unmount();
        stack.remove(&download.root);
    }
}

/// Replace `old` with a window rebuilt from the persisted state.
fn reload(app: &libadwaita::Application, state: &Rc<AppState>, old: &libadwaita::ApplicationWindow) {
    log::info!("Reloading onboarding window");
    present(app, state);
    old.close();
}
