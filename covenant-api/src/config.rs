//! API server configuration.

use std::collections::HashSet;

/// Which store backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-memory store; state dies with the process.
    Memory,
    /// PostgreSQL via `covenant-pg`.
    #[default]
    Postgres,
}

/// Server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub store_backend: StoreBackend,
    /// Requests per minute allowed per API key.
    pub rate_limit_per_minute: u32,
    /// Static admin keys accepted alongside database-issued keys.
    /// Intended for bootstrap: create the first team and its keys, then
    /// unset.
    pub root_api_keys: HashSet<String>,
    /// Webhook endpoint for proposal notifications; None disables them.
    pub webhook_url: Option<String>,
    /// Shared secret for webhook payload signatures.
    pub webhook_secret: Option<String>,
    /// Default and maximum depth for impact lineage traversal.
    pub impact_depth_default: usize,
    pub impact_depth_max: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 3000,
            store_backend: StoreBackend::Postgres,
            rate_limit_per_minute: 120,
            root_api_keys: HashSet::new(),
            webhook_url: None,
            webhook_secret: None,
            impact_depth_default: 3,
            impact_depth_max: 10,
        }
    }
}

impl ApiConfig {
    /// Read configuration from `COVENANT_*` environment variables.
    ///
    /// - `COVENANT_API_BIND` / `COVENANT_API_PORT` (or `PORT`)
    /// - `COVENANT_STORE` - `memory` or `postgres`
    /// - `COVENANT_RATE_LIMIT_PER_MINUTE`
    /// - `COVENANT_ROOT_API_KEYS` - comma separated
    /// - `COVENANT_WEBHOOK_URL` / `COVENANT_WEBHOOK_SECRET`
    /// - `COVENANT_IMPACT_DEPTH_DEFAULT` / `COVENANT_IMPACT_DEPTH_MAX`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_host: std::env::var("COVENANT_API_BIND").unwrap_or(defaults.bind_host),
            bind_port: std::env::var("PORT")
                .ok()
                .or_else(|| std::env::var("COVENANT_API_PORT").ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bind_port),
            store_backend: match std::env::var("COVENANT_STORE").as_deref() {
                Ok("memory") => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            },
            rate_limit_per_minute: std::env::var("COVENANT_RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_per_minute),
            root_api_keys: std::env::var("COVENANT_ROOT_API_KEYS")
                .map(|keys| {
                    keys.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            webhook_url: std::env::var("COVENANT_WEBHOOK_URL").ok(),
            webhook_secret: std::env::var("COVENANT_WEBHOOK_SECRET").ok(),
            impact_depth_default: std::env::var("COVENANT_IMPACT_DEPTH_DEFAULT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.impact_depth_default),
            impact_depth_max: std::env::var("COVENANT_IMPACT_DEPTH_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.impact_depth_max),
        }
    }
}
