//! Transport configuration: Telegram credentials and trader-backend settings.

use config::{Config, ConfigError, Environment, File};
use fable_agent_runtime::settings::keys;
use fable_agent_runtime::AgentRuntime;
use serde::{Deserialize, Serialize};

/// Telegram credentials for the transport.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Bot API token used to authenticate with Telegram.
    pub telegram_token: String,
}

impl TelegramSettings {
    /// Load the settings from configuration files and the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the configuration cannot be read or
    /// the token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }
}

/// Build the layered configuration used by the transport.
///
/// # Errors
///
/// Returns a `ConfigError` if any source fails to load.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        // Layering order: files first, then environment overrides
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides stay out of version control
        .add_source(File::with_name("config/local").required(false))
        // Prefixed variables use APP_SECTION__KEY naming
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Bare variables like TELEGRAM_TOKEN apply last; empty values
        // count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Trader-backend settings resolved once from the agent runtime.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    /// Base URL of the recommender backend.
    pub backend_url: Option<String>,
    /// Bearer token for the recommender backend.
    pub backend_token: Option<String>,
    /// Whether trader-mode recommender registration is enabled.
    pub trader_mode: bool,
}

impl BackendSettings {
    /// Resolve backend settings from the runtime.
    ///
    /// Each key is read exactly once; the transport never re-reads the
    /// runtime while running.
    #[must_use]
    pub fn from_runtime(runtime: &dyn AgentRuntime) -> Self {
        let trader_mode = runtime
            .get_setting(keys::TG_TRADER)
            .is_some_and(|v| parse_flag(&v));

        Self {
            backend_url: runtime.get_setting(keys::BACKEND_URL),
            backend_token: runtime.get_setting(keys::BACKEND_TOKEN),
            trader_mode,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    let v = value.trim();
    v == "true" || v == "1"
}

/// Default timeout (seconds) for backend HTTP calls.
pub const BACKEND_HTTP_TIMEOUT_SECS: u64 = 30;

/// Get the backend HTTP timeout from env or default.
///
/// Environment variable: `BACKEND_HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_backend_http_timeout_secs() -> u64 {
    std::env::var("BACKEND_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(BACKEND_HTTP_TIMEOUT_SECS)
}
