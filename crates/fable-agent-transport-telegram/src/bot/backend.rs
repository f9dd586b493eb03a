//! Recommender registration client for the trader backend.
//!
//! In trader mode every message sender is upserted into the backend's
//! recommender registry before the message is delegated.

use crate::config::get_backend_http_timeout_secs;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while talking to the trader backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// Network-level failure (connectivity, timeout)
    #[error("Backend network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Backend answered with a non-success status
    #[error("Backend API error: {0}")]
    Api(String),
}

/// Interface for the recommender registry upsert.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecommenderRegistry: Send + Sync {
    /// Ensure a recommender record exists for the given Telegram user.
    ///
    /// The call is an idempotent upsert; repeating it for the same user
    /// must not fail.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` on connectivity failures or non-success
    /// API responses.
    async fn get_or_create_recommender(
        &self,
        user_id: &str,
        username: &str,
        token: &str,
        backend_url: &str,
    ) -> Result<(), BackendError>;
}

/// Maximum length of an error body kept in a `BackendError::Api` message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// HTTP client for the backend recommender API.
pub struct HttpRecommenderRegistry {
    client: HttpClient,
}

impl HttpRecommenderRegistry {
    /// Creates a client configured with the standard backend timeout.
    ///
    /// Uses the `BACKEND_HTTP_TIMEOUT_SECS` environment variable or the
    /// 30s default. This prevents infinite hangs when the backend is slow
    /// or unresponsive.
    #[must_use]
    pub fn new() -> Self {
        let timeout = Duration::from_secs(get_backend_http_timeout_secs());
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self { client }
    }
}

impl Default for HttpRecommenderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecommenderRegistry for HttpRecommenderRegistry {
    async fn get_or_create_recommender(
        &self,
        user_id: &str,
        username: &str,
        token: &str,
        backend_url: &str,
    ) -> Result<(), BackendError> {
        let url = recommender_url(backend_url);
        let body = json!({
            "telegramId": user_id,
            "username": username,
        });

        debug!("Registering recommender for user {user_id} ({username})");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(clean_api_error(status, &error_text)));
        }

        Ok(())
    }
}

fn recommender_url(backend_url: &str) -> String {
    format!(
        "{}/api/updaters/getOrCreateRecommender",
        backend_url.trim_end_matches('/')
    )
}

/// Builds a readable API error message from a response body.
///
/// HTML error pages from proxies are dropped entirely and very long
/// bodies are truncated.
fn clean_api_error(status: reqwest::StatusCode, error_text: &str) -> String {
    let is_html = error_text.trim_start().starts_with("<!DOCTYPE")
        || error_text.trim_start().starts_with("<html")
        || error_text.trim_start().starts_with("<HTML");

    if is_html {
        return format!("{status} (Server returned HTML error page)");
    }

    if error_text.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = error_text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{status} - {truncated}... (truncated)")
    } else {
        format!("{status} - {error_text}")
    }
}

#[cfg(test)]
mod tests {
    use super::{clean_api_error, recommender_url};
    use reqwest::StatusCode;

    #[test]
    fn test_recommender_url_joins_path() {
        assert_eq!(
            recommender_url("https://backend.example"),
            "https://backend.example/api/updaters/getOrCreateRecommender"
        );
    }

    #[test]
    fn test_recommender_url_trims_trailing_slash() {
        assert_eq!(
            recommender_url("https://backend.example/"),
            "https://backend.example/api/updaters/getOrCreateRecommender"
        );
    }

    #[test]
    fn test_clean_api_error_keeps_short_bodies() {
        let message = clean_api_error(StatusCode::BAD_REQUEST, "missing telegramId");
        assert!(message.contains("400"));
        assert!(message.contains("missing telegramId"));
    }

    #[test]
    fn test_clean_api_error_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let message = clean_api_error(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(message.len() < 600);
        assert!(message.ends_with("... (truncated)"));
    }

    #[test]
    fn test_clean_api_error_drops_html_pages() {
        let message = clean_api_error(
            StatusCode::BAD_GATEWAY,
            "<html><body>nginx error</body></html>",
        );
        assert!(!message.contains("nginx"));
        assert!(message.contains("HTML error page"));
    }
}
