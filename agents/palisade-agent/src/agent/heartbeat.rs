//! Heartbeat Sender
//!
//! Periodically reports liveness to the control plane, with a capped
//! exponential backoff after consecutive failures.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::config::Config;
use crate::connection::http::{ApiClient, RequestError, HEARTBEAT_PATH};
use crate::connection::protocol::HeartbeatBody;

/// Ceiling for the failure backoff, in seconds
const MAX_BACKOFF_SECS: u64 = 300;

/// Periodic liveness reporter
pub struct HeartbeatLoop {
    config: Arc<Config>,
    client: Arc<ApiClient>,
    shutdown: CancellationToken,
    host_info: HeartbeatBody,
}

impl HeartbeatLoop {
    /// Create a new heartbeat loop; host metadata is collected once here
    pub fn new(config: Arc<Config>, client: Arc<ApiClient>, shutdown: CancellationToken) -> Self {
        Self {
            config,
            client,
            shutdown,
            host_info: HeartbeatBody::collect(),
        }
    }

    /// Run until the cancellation token fires
    pub async fn run(self) {
        info!(
            interval_secs = self.config.heartbeat_interval_secs,
            "Heartbeat sender started"
        );

        let interval = Duration::from_secs(self.config.heartbeat_interval_secs);
        let mut retry_count: u32 = 0;

        while !self.shutdown.is_cancelled() {
            match self.send().await {
                Ok(()) => {
                    retry_count = 0;
                }
                Err(RequestError::AuthFailure) => {
                    // Not retriable; the cycle failed but the counter is not
                    // escalated past the normal interval
                    error!("Heartbeat rejected: authentication failed");
                }
                Err(e) => {
                    retry_count += 1;
                    warn!(error = %e, retries = retry_count, "Heartbeat failed");

                    if retry_count >= self.config.max_retries {
                        let backoff = backoff_secs(
                            self.config.heartbeat_interval_secs,
                            self.config.retry_backoff_multiplier,
                            retry_count,
                        );
                        warn!(
                            retries = retry_count,
                            backoff_secs = backoff,
                            "Consecutive heartbeat failures, backing off"
                        );
                        if !self.wait(Duration::from_secs(backoff)).await {
                            break;
                        }
                        continue;
                    }
                }
            }

            if !self.wait(interval).await {
                break;
            }
        }

        info!("Heartbeat sender stopped");
    }

    async fn send(&self) -> Result<(), RequestError> {
        let body = serde_json::to_string(&self.host_info)
            .map_err(|e| RequestError::Signing(e.to_string()))?;

        self.client.post(HEARTBEAT_PATH, &body).await?;
        debug!("Heartbeat sent");
        Ok(())
    }

    /// Interruptible sleep; returns false when cancelled mid-wait
    async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.cancelled() => false,
        }
    }
}

/// `min(300, interval * multiplier^retries)`
fn backoff_secs(interval: u64, multiplier: u64, retries: u32) -> u64 {
    interval
        .saturating_mul(multiplier.saturating_pow(retries))
        .min(MAX_BACKOFF_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server_url: &str) -> Config {
        Config {
            agent_name: "test-agent".to_string(),
            agent_token: "token-xyz".to_string(),
            hmac_secret: "ab".repeat(32),
            server_url: server_url.to_string(),
            heartbeat_interval_secs: 60,
            poll_interval_secs: 30,
            max_retries: 3,
            retry_backoff_multiplier: 2,
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_backoff_capped_at_five_minutes() {
        // 60 * 2^3 = 480, capped to 300
        assert_eq!(backoff_secs(60, 2, 3), 300);
    }

    #[test]
    fn test_backoff_below_cap() {
        assert_eq!(backoff_secs(10, 2, 3), 80);
        assert_eq!(backoff_secs(10, 2, 4), 160);
    }

    #[test]
    fn test_backoff_saturates_on_large_retry_counts() {
        assert_eq!(backoff_secs(60, 2, 64), 300);
    }

    #[tokio::test]
    async fn test_send_posts_host_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HEARTBEAT_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = Arc::new(test_config(&server.uri()));
        let client = Arc::new(ApiClient::new(&config).unwrap());
        let heartbeat = HeartbeatLoop::new(config, client, CancellationToken::new());

        heartbeat.send().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_wakes_sleep_promptly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HEARTBEAT_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = Arc::new(test_config(&server.uri()));
        let client = Arc::new(ApiClient::new(&config).unwrap());
        let shutdown = CancellationToken::new();
        let heartbeat = HeartbeatLoop::new(config, client, shutdown.clone());

        // Interval is 60s; the loop must exit well before that after cancel
        let handle = tokio::spawn(heartbeat.run());
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop after cancellation")
            .unwrap();
    }
}
