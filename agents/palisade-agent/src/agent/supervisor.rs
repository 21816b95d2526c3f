//! Agent Supervisor
//!
//! Owns the shared cancellation token, runs the startup update check, and
//! supervises the heartbeat, poll, and periodic update tasks as independent
//! concurrent units with a bounded graceful stop.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::heartbeat::HeartbeatLoop;
use crate::agent::poller::JobPollLoop;
use crate::cli::config::Config;
use crate::connection::http::ApiClient;
use crate::runtime::executor::ExecutorRegistry;
use crate::update::manager::UpdateManager;

/// Bound on waiting for each task during shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Top-level orchestrator for the agent process
pub struct AgentSupervisor {
    config: Arc<Config>,
    client: Arc<ApiClient>,
    registry: Arc<ExecutorRegistry>,
    shutdown: CancellationToken,
}

impl AgentSupervisor {
    /// Create a supervisor with the built-in job handlers
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = Arc::new(ApiClient::new(&config)?);
        Ok(Self {
            config,
            client,
            registry: Arc::new(ExecutorRegistry::with_builtin_handlers()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Token observed by every loop; cancelling it stops the agent
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Raise the cancellation signal. Idempotent; safe to call from signal
    /// handlers on any task.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Run the agent until the cancellation token fires.
    ///
    /// Returns early when the startup update check replaced the binary (the
    /// process is about to be relaunched). Otherwise blocks until cancelled,
    /// then waits a bounded grace period for each loop to finish.
    pub async fn run(&self) -> Result<()> {
        // Update check before any loop spawns. A successful update restarts
        // the process inside this call; a failed attempt falls through and
        // the agent keeps running the current version.
        let updater = Arc::new(UpdateManager::new(self.config.clone(), self.client.clone())?);
        if updater.update_if_available().await {
            return Ok(());
        }

        let heartbeat = HeartbeatLoop::new(
            self.config.clone(),
            self.client.clone(),
            self.shutdown.clone(),
        );
        let poller = JobPollLoop::new(
            self.config.clone(),
            self.client.clone(),
            self.registry.clone(),
            self.shutdown.clone(),
        );

        let tasks: Vec<(&str, JoinHandle<()>)> = vec![
            ("heartbeat", tokio::spawn(heartbeat.run())),
            ("poller", tokio::spawn(poller.run())),
            (
                "update-checker",
                tokio::spawn(updater.run_periodic(self.shutdown.clone())),
            ),
        ];

        info!("Agent started");
        self.shutdown.cancelled().await;
        info!("Stopping agent");

        for (name, handle) in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, error = %e, "Task ended with error"),
                Err(_) => warn!(task = name, "Task did not stop in time, abandoning"),
            }
        }

        info!("Agent stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::http::{CHECK_UPDATES_PATH, HEARTBEAT_PATH, POLL_JOBS_PATH};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server_url: &str) -> Arc<Config> {
        Arc::new(Config {
            agent_name: "test-agent".to_string(),
            agent_token: "token-xyz".to_string(),
            hmac_secret: "ab".repeat(32),
            server_url: server_url.to_string(),
            heartbeat_interval_secs: 60,
            poll_interval_secs: 30,
            max_retries: 3,
            retry_backoff_multiplier: 2,
            request_timeout_secs: 5,
        })
    }

    async fn mount_quiet_control_plane(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(CHECK_UPDATES_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"has_update":false}"#),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(HEARTBEAT_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(POLL_JOBS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"jobs":[]}"#))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_run_stops_after_cancellation() {
        let server = MockServer::start().await;
        mount_quiet_control_plane(&server).await;

        let supervisor = Arc::new(AgentSupervisor::new(test_config(&server.uri())).unwrap());
        let runner = supervisor.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(300)).await;
        supervisor.stop();

        // All loops are asleep on long intervals; shutdown must still be fast
        tokio::time::timeout(Duration::from_secs(8), handle)
            .await
            .expect("supervisor did not stop after cancellation")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let server = MockServer::start().await;
        mount_quiet_control_plane(&server).await;

        let supervisor = AgentSupervisor::new(test_config(&server.uri())).unwrap();
        supervisor.stop();
        supervisor.stop();
        assert!(supervisor.shutdown_token().is_cancelled());
    }
}
