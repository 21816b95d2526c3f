//! Built-in Job Handlers
//!
//! Placeholder implementations for the job types the control plane assigns
//! today. Each one only records the request; the real work is dispatched
//! behind this seam without the poll loop changing.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::connection::protocol::Job;
use crate::runtime::executor::JobHandler;

/// Virus/malware scan job
pub struct ScanHandler;

#[async_trait]
impl JobHandler for ScanHandler {
    fn job_type(&self) -> &str {
        "scan"
    }

    async fn execute(&self, job: &Job) -> Result<()> {
        // TODO: invoke the host scanner once the scan engine ships
        info!(job_id = %job.id, payload = %job.payload, "Scan job received");
        Ok(())
    }
}

/// Agent update job (the periodic update check handles the actual flow)
pub struct UpdateHandler;

#[async_trait]
impl JobHandler for UpdateHandler {
    fn job_type(&self) -> &str {
        "update"
    }

    async fn execute(&self, job: &Job) -> Result<()> {
        info!(job_id = %job.id, "Update job received");
        Ok(())
    }
}

/// Operator-defined custom job
pub struct CustomHandler;

#[async_trait]
impl JobHandler for CustomHandler {
    fn job_type(&self) -> &str {
        "custom"
    }

    async fn execute(&self, job: &Job) -> Result<()> {
        info!(job_id = %job.id, payload = %job.payload, "Custom job received");
        Ok(())
    }
}
