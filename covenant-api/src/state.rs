//! Shared application state.

use crate::config::ApiConfig;
use crate::notify::Notifier;
use covenant_core::{Clock, IdGen, SystemClock, UuidV7Gen};
use covenant_storage::Store;
use std::sync::Arc;

/// Everything a handler or service needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGen>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGen>,
        notifier: Arc<dyn Notifier>,
        config: ApiConfig,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            notifier,
            config: Arc::new(config),
        }
    }

    /// Production wiring: system clock and UUIDv7 IDs.
    pub fn with_defaults(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        config: ApiConfig,
    ) -> Self {
        Self::new(
            store,
            Arc::new(SystemClock),
            Arc::new(UuidV7Gen),
            notifier,
            config,
        )
    }
}
