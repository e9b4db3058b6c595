mod ui;

use std::rc::Rc;
use std::sync::Arc;

use gtk4::prelude::*;

use meeting_onboarding::bridge::RuntimeBridge;
use meeting_onboarding::simulator::SimulatedBackend;
use meeting_onboarding::{Config, EventHub};

use ui::AppState;

fn main() {
    env_logger::init();
    log::info!("Meeting onboarding starting");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let config = Config::load_or_create();
    log::info!("Platform: {:?}", config.platform());
    let hub = EventHub::new();
    let backend = Arc::new(SimulatedBackend::new(hub.clone(), &config));
    let bridge = Arc::new(RuntimeBridge::new(backend, runtime.handle().clone()));

    let state = Rc::new(AppState {
        config,
        hub,
        bridge,
        _runtime: runtime,
    });

    let application = libadwaita::Application::builder()
        .application_id("io.github.MeetingOnboarding")
        .build();

    application.connect_activate(move |app| on_activate(app, &state));
    application.run();
}

fn on_activate(app: &libadwaita::Application, state: &Rc<AppState>) {
    // A second activation just raises the existing window.
    if let Some(window) = app.active_window() {
        window.present();
        return;
    }
    ui::window::present(app, state);
}
