//! Webhook transport

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

/// Header naming the developer-client a callback belongs to
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Webhook responded with status {0}")]
    Status(u16),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Posts signed callback tokens to subscriber webhooks
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// One delivery attempt. Any non-2xx answer is an error.
    async fn post(&self, url: &str, client_id: &str, token: &str) -> Result<(), WebhookError>;
}

/// HTTP transport backed by a shared reqwest client
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post(&self, url: &str, client_id: &str, token: &str) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .header(CLIENT_ID_HEADER, client_id)
            .json(&json!({ "token": token }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WebhookError::Timeout(self.timeout)
                } else {
                    WebhookError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status.as_u16()));
        }

        Ok(())
    }
}
