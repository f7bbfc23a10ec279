use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, SlidecastError};

/// Minimal OpenAI REST client shared by the translator and the speech synthesizer.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(endpoint: &str, api_key_env: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let api_key = std::env::var(api_key_env).map_err(|_| {
            SlidecastError::Config(format!("Environment variable {} is not set", api_key_env))
        })?;
        Self::with_api_key(endpoint, api_key, timeout_secs, max_retries)
    }

    pub fn with_api_key(endpoint: &str, api_key: String, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("slidecast/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// POST `body` to `path`, retrying transport errors, rate limits and server errors.
    /// Failures are reported through `error`, e.g. `SlidecastError::Translation`.
    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
        error: fn(String) -> SlidecastError,
    ) -> Result<Response> {
        let url = self.url(path);
        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let backoff = Duration::from_millis(500 * u64::from(attempt - 1));
                debug!("Retrying {} in {:?} (attempt {}/{})", url, backoff, attempt, attempts);
                tokio::time::sleep(backoff).await;
            }

            let response = match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!("Request to {} failed: {}", url, e);
                    last_error = format!("HTTP request failed: {}", e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let text = response.text().await.unwrap_or_default();
            last_error = format!("OpenAI API error {}: {}", status, text);
            if !is_retryable(status) {
                break;
            }
            warn!("{}", last_error);
        }

        Err(error(last_error))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_paths() {
        let client = OpenAiClient::with_api_key("https://api.openai.com/v1/", "key".into(), 5, 0).unwrap();
        assert_eq!(client.url("/audio/speech"), "https://api.openai.com/v1/audio/speech");
        assert_eq!(client.url("chat/completions"), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = OpenAiClient::new("https://example.invalid", "SLIDECAST_TEST_UNSET_KEY", 5, 0);
        assert!(matches!(result, Err(SlidecastError::Config(_))));
    }
}
