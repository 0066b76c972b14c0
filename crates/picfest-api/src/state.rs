use std::sync::Arc;

use picfest_gateway::LiveConfig;
use picfest_platform::Platform;

use crate::guest::WizardRegistry;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub platform: Platform,
    pub live: LiveConfig,
    pub wizards: WizardRegistry,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    pub fn new(platform: Platform, live: LiveConfig, wizards: WizardRegistry, max_upload_bytes: usize) -> AppState {
        Arc::new(Self {
            platform,
            live,
            wizards,
            max_upload_bytes,
        })
    }
}
