//! Message Protocol
//!
//! Defines the payload types exchanged with the control plane over HTTP.

use serde::{Deserialize, Serialize};

/// Body of a heartbeat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatBody {
    pub os_type: String,
    pub os_version: String,
    pub hostname: String,
}

impl HeartbeatBody {
    /// Collect host OS metadata once; the result is reused for every cycle
    pub fn collect() -> Self {
        Self {
            os_type: os_type_name().to_string(),
            os_version: os_info::get().version().to_string(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }
}

fn os_type_name() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "macos" => "Darwin",
        "linux" => "Linux",
        other => other,
    }
}

/// A work item assigned by the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,

    #[serde(rename = "type")]
    pub job_type: String,

    #[serde(default)]
    pub payload: serde_json::Value,

    #[serde(default)]
    pub approved: bool,
}

/// Response of the poll-jobs endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct JobsResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Response of the check-agent-updates endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCheckResponse {
    #[serde(default)]
    pub has_update: bool,
    pub version: Option<String>,
    pub download_url: Option<String>,
    pub sha256: Option<String>,
    pub size_bytes: Option<u64>,
}

/// Metadata describing an available update build
#[derive(Debug, Clone)]
pub struct UpdateDescriptor {
    pub version: String,
    pub download_url: String,
    /// Expected SHA-256 of the payload, 64 hex characters
    pub sha256: String,
    pub size_bytes: u64,
}

impl UpdateCheckResponse {
    /// Convert into a descriptor, requiring every field to be present
    pub fn into_descriptor(self) -> Option<UpdateDescriptor> {
        if !self.has_update {
            return None;
        }
        Some(UpdateDescriptor {
            version: self.version?,
            download_url: self.download_url?,
            sha256: self.sha256?,
            size_bytes: self.size_bytes?,
        })
    }
}
