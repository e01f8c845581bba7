//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::reset::Resetter;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Nothing here is mutated after startup, so requests never contend on it.
#[derive(Clone)]
pub struct AppState {
    pub resetter: Arc<Resetter>,
}

impl AppState {
    /// Creates the application state, building the resetter from `config.reset`.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            resetter: Arc::new(Resetter::new(&config.reset)),
        }
    }
}
