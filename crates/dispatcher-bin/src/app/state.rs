//! Shared state for the trigger server.

use email_outbox::Dispatcher;
use std::sync::Arc;

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Runs one claim-and-dispatch invocation per request.
    pub dispatcher: Dispatcher,
    /// Expected value of the `x-cron-secret` header.
    pub cron_secret: Arc<str>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, cron_secret: impl Into<Arc<str>>) -> Self {
        Self {
            dispatcher,
            cron_secret: cron_secret.into(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
