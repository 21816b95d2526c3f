//! Job Executor Registry
//!
//! Capability-indexed dispatch: each job type maps to one [`JobHandler`].
//! Unknown types are a defined failure, reported to the caller and never
//! acknowledged upstream.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::connection::protocol::Job;

/// Dispatch failure
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown job type: {0}")]
    UnknownType(String),

    #[error("job execution failed: {0}")]
    Execution(#[from] anyhow::Error),
}

/// Handler trait - common interface for all job type handlers
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type string this handler owns
    fn job_type(&self) -> &str;

    /// Execute a job; ownership of the job is the handler's for the duration
    async fn execute(&self, job: &Job) -> Result<()>;
}

/// Registry of job handlers keyed by type
pub struct ExecutorRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl ExecutorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Create a registry with the built-in placeholder handlers
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::handlers::ScanHandler));
        registry.register(Arc::new(super::handlers::UpdateHandler));
        registry.register(Arc::new(super::handlers::CustomHandler));
        registry
    }

    /// Register a handler under its declared job type
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers
            .insert(handler.job_type().to_string(), handler);
    }

    /// Dispatch a job to the handler for its type
    pub async fn dispatch(&self, job: &Job) -> Result<(), DispatchError> {
        let handler = self
            .handlers
            .get(&job.job_type)
            .ok_or_else(|| DispatchError::UnknownType(job.job_type.clone()))?;

        info!(job_id = %job.id, job_type = %job.job_type, "Executing job");
        handler.execute(job).await?;
        Ok(())
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_builtin_handlers()
    }
}
