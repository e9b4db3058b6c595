pub mod download_page;
pub mod permissions_page;
pub mod window;

use std::sync::Arc;
use std::time::Duration;

use meeting_onboarding::{Config, EventHub, NativeBridge, Notice};

/// Requests from a mounted page to the window that hosts it.
#[derive(Debug, Clone)]
pub enum ShellEvent {
    Notice(Notice),
    ShowPermissions,
    Alert {
        heading: &'static str,
        body: &'static str,
    },
    Reload(Duration),
}

/// Process-wide handles. Lives on the GTK main thread inside an `Rc`.
pub struct AppState {
    pub config: Config,
    pub hub: EventHub,
    pub bridge: Arc<dyn NativeBridge>,
    /// Keeps the runtime behind `bridge` alive.
    pub _runtime: tokio::runtime::Runtime,
}
