use std::sync::Arc;

use crate::config::Config;
use crate::controller::{Controller, SessionStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Owns the gateway, preprocessor and font store; cheap to share.
    pub controller: Arc<Controller>,
    pub sessions: SessionStore,
}
