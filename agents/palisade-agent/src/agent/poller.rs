//! Job Poller
//!
//! Retrieves pending work items each cycle and dispatches them through the
//! executor registry. Poll failures are logged and skipped; no backoff state
//! carries between cycles. Execution is at-most-once from the agent's side:
//! a job either completes and is acknowledged, or is dropped with a log line.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::config::Config;
use crate::connection::http::{ApiClient, RequestError, ACK_JOB_PATH, POLL_JOBS_PATH};
use crate::connection::protocol::{Job, JobsResponse};
use crate::runtime::executor::{DispatchError, ExecutorRegistry};

/// Periodic job retrieval and dispatch
pub struct JobPollLoop {
    config: Arc<Config>,
    client: Arc<ApiClient>,
    registry: Arc<ExecutorRegistry>,
    shutdown: CancellationToken,
}

impl JobPollLoop {
    pub fn new(
        config: Arc<Config>,
        client: Arc<ApiClient>,
        registry: Arc<ExecutorRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            client,
            registry,
            shutdown,
        }
    }

    /// Run until the cancellation token fires
    pub async fn run(self) {
        info!(
            interval_secs = self.config.poll_interval_secs,
            "Job poller started"
        );

        let interval = Duration::from_secs(self.config.poll_interval_secs);

        while !self.shutdown.is_cancelled() {
            let jobs = self.poll().await;
            if !jobs.is_empty() {
                info!(count = jobs.len(), "Received jobs");
            }

            for job in jobs {
                // A large batch must not delay shutdown
                if self.shutdown.is_cancelled() {
                    break;
                }
                self.process(job).await;
            }

            if !self.wait(interval).await {
                break;
            }
        }

        info!("Job poller stopped");
    }

    /// Fetch pending jobs; any failure yields an empty list for this cycle
    async fn poll(&self) -> Vec<Job> {
        match self.client.get(POLL_JOBS_PATH).await {
            Ok(body) => match serde_json::from_str::<JobsResponse>(&body) {
                Ok(response) => response.jobs,
                Err(e) => {
                    warn!(error = %e, "Failed to parse poll response");
                    Vec::new()
                }
            },
            Err(RequestError::AuthFailure) => {
                error!("Poll rejected: authentication failed");
                Vec::new()
            }
            Err(RequestError::RateLimited) => {
                warn!("Poll rate limited");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Poll failed");
                Vec::new()
            }
        }
    }

    /// Execute one job and acknowledge it on success
    async fn process(&self, job: Job) {
        match self.registry.dispatch(&job).await {
            Ok(()) => {
                info!(job_id = %job.id, "Job executed successfully");
                self.acknowledge(&job.id).await;
            }
            Err(DispatchError::UnknownType(job_type)) => {
                warn!(job_id = %job.id, job_type = %job_type, "Unknown job type");
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Job execution failed");
            }
        }
    }

    /// Best-effort completion ack; failure is logged, the job is not retried
    async fn acknowledge(&self, job_id: &str) {
        let path = format!("{}/{}", ACK_JOB_PATH, job_id);
        match self.client.post(&path, "").await {
            Ok(_) => debug!(job_id, "Job acknowledged"),
            Err(e) => warn!(job_id, error = %e, "Failed to acknowledge job"),
        }
    }

    /// Interruptible sleep; returns false when cancelled mid-wait
    async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.cancelled() => false,
        }
    }
}
