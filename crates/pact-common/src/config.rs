//! Client configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables in
//! production. Precedence: env vars > .env file > pact.toml > defaults.
//!
//! Unlike server-side config there is no process-wide global here: the
//! loaded [`ClientConfig`] is handed to the client and injected into the
//! components that need it.

use serde::Deserialize;

/// Load configuration from the environment.
pub fn load() -> Result<ClientConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("api.base_url", "http://localhost:3000/api/v1")?
        .set_default("api.request_timeout_secs", 30)?
        .set_default("cache.grace_secs", 300)? // 5 min
        .set_default("cache.sweep_secs", 60)?
        .set_default("feedback.buffer", 64)?
        // Optional config file
        .add_source(config::File::with_name("pact").required(false))
        // Environment variables (PACT_API__BASE_URL, PACT_CACHE__GRACE_SECS, ...)
        .add_source(
            config::Environment::with_prefix("PACT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    cfg.try_deserialize()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the remote data service, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// How long a zero-subscriber cache entry survives before eviction.
    pub grace_secs: u64,
    /// Interval between background eviction sweeps.
    pub sweep_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    /// Buffered capacity of the feedback broadcast channel.
    pub buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:3000/api/v1".into(),
                request_timeout_secs: 30,
            },
            cache: CacheConfig {
                grace_secs: 300,
                sweep_secs: 60,
            },
            feedback: FeedbackConfig { buffer: 64 },
        }
    }
}
