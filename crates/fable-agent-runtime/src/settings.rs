//! Runtime settings access.
//!
//! Transports read their configuration through [`AgentRuntime`] once, at
//! construction time; implementations decide where the values come from.

/// Read-only access to named runtime settings.
pub trait AgentRuntime: Send + Sync {
    /// Look up a setting by key.
    ///
    /// Returns `None` when the setting is not configured.
    fn get_setting(&self, key: &str) -> Option<String>;
}

/// Well-known setting keys read by transports.
pub mod keys {
    /// Base URL of the trader recommender backend.
    pub const BACKEND_URL: &str = "BACKEND_URL";
    /// Bearer token for the trader recommender backend.
    pub const BACKEND_TOKEN: &str = "BACKEND_TOKEN";
    /// Enables trader-mode recommender registration.
    pub const TG_TRADER: &str = "TG_TRADER";
}

/// Runtime backed by process environment variables.
///
/// Empty values are treated as unset, matching the behavior of the layered
/// configuration loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvRuntime;

impl EnvRuntime {
    /// Create an environment-backed runtime.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AgentRuntime for EnvRuntime {
    fn get_setting(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}
