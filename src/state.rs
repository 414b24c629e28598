//! Shared application state for all routes.

use crate::registry::Api;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Frozen at startup; every request reads it without locking.
    pub api: Arc<Api>,
}

impl AppState {
    pub fn new(api: Arc<Api>) -> Self {
        AppState { api }
    }
}
