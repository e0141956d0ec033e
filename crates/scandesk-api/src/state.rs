//! Application state shared by all handlers.

use scandesk_core::Config;
use scandesk_scanner::ScanCoordinator;
use scandesk_services::DocumentLifecycleManager;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub documents: DocumentLifecycleManager,
    pub scanner: Arc<ScanCoordinator>,
}
