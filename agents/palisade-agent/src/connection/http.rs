//! HTTP Client
//!
//! Signed HTTP client for the control plane endpoints. Every request carries
//! the agent token plus a fresh set of HMAC headers; responses are mapped
//! into the [`RequestError`] taxonomy the loops dispatch on.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::cli::config::Config;
use crate::connection::auth;

pub const HEARTBEAT_PATH: &str = "/functions/v1/heartbeat";
pub const POLL_JOBS_PATH: &str = "/functions/v1/poll-jobs";
pub const ACK_JOB_PATH: &str = "/functions/v1/ack-job";
pub const CHECK_UPDATES_PATH: &str = "/functions/v1/check-agent-updates";

/// Tighter timeout for the post-update health probe
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome taxonomy for a single control plane request
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("authentication failed (HTTP 401)")]
    AuthFailure,

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("unexpected status HTTP {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request signing failed: {0}")]
    Signing(String),
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestError::Timeout
        } else {
            RequestError::Connection(err.to_string())
        }
    }
}

/// HTTP client for control plane communication
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    agent_token: String,
    secret: Vec<u8>,
}

impl ApiClient {
    /// Create a client from the loaded configuration
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.server_url_trimmed().to_string(),
            agent_token: config.agent_token.clone(),
            secret: config.hmac_secret_bytes()?,
        })
    }

    /// Build the full header set for a request carrying `body`
    fn signed_headers(&self, body: &str) -> Result<HeaderMap, RequestError> {
        let signed =
            auth::sign(&self.secret, body).map_err(|e| RequestError::Signing(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in [
            ("X-Agent-Token", self.agent_token.as_str()),
            ("X-HMAC-Signature", signed.signature.as_str()),
            ("X-Timestamp", signed.timestamp.as_str()),
            ("X-Nonce", signed.nonce.as_str()),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|e| RequestError::Signing(e.to_string()))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    /// POST `body` (the exact string that was signed) to `path`
    pub async fn post(&self, path: &str, body: &str) -> Result<String, RequestError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST");

        let headers = self.signed_headers(body)?;
        let response = self
            .client
            .post(&url)
            .headers(headers)
            .body(body.to_string())
            .send()
            .await?;

        Self::map_response(response).await
    }

    /// Signed GET with an empty body
    pub async fn get(&self, path: &str) -> Result<String, RequestError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let headers = self.signed_headers("")?;
        let response = self.client.get(&url).headers(headers).send().await?;

        Self::map_response(response).await
    }

    /// Lightweight authenticated round trip with its own tighter timeout,
    /// used by the update health check
    pub async fn ping(&self) -> Result<(), RequestError> {
        let url = format!("{}{}", self.base_url, POLL_JOBS_PATH);
        let headers = self.signed_headers("")?;

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .timeout(PING_TIMEOUT)
            .send()
            .await?;

        Self::map_response(response).await.map(|_| ())
    }

    async fn map_response(response: reqwest::Response) -> Result<String, RequestError> {
        let status = response.status();
        match status.as_u16() {
            401 => Err(RequestError::AuthFailure),
            429 => Err(RequestError::RateLimited),
            _ if status.is_success() => Ok(response.text().await?),
            code => Err(RequestError::Status(code)),
        }
    }
}
