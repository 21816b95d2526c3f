//! Configuration module
//!
//! Handles loading and validating agent configuration from TOML files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the Palisade Agent
///
/// Loaded once at process start and shared read-only by every component.
/// The four credential/endpoint fields are mandatory; the tunables fall back
/// to the defaults below but are still bounds-checked by [`Config::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name this agent registered with on the control plane
    pub agent_name: String,

    /// Bearer token sent as `X-Agent-Token`
    pub agent_token: String,

    /// HMAC signing secret: 32 raw bytes as a 64-character hex string
    pub hmac_secret: String,

    /// Base URL of the control plane, e.g. `https://api.example.com`
    pub server_url: String,

    /// Seconds between heartbeats (minimum 10)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Seconds between job polls (minimum 5)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Consecutive heartbeat failures before the capped backoff kicks in
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_multiplier: u64,

    /// Timeout for individual control plane requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

// Default value functions
fn default_heartbeat_interval() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    2
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate all fields; invalid configuration is a terminal error
    pub fn validate(&self) -> Result<()> {
        if self.agent_name.is_empty() {
            bail!("agent_name must not be empty");
        }
        if self.agent_token.is_empty() {
            bail!("agent_token must not be empty");
        }
        if self.hmac_secret.len() != 64 {
            bail!("hmac_secret must be 64 hex characters (32 bytes)");
        }
        if hex::decode(&self.hmac_secret).is_err() {
            bail!("hmac_secret is not valid hex");
        }
        if self.server_url.is_empty() {
            bail!("server_url must not be empty");
        }
        if self.heartbeat_interval_secs < 10 {
            bail!("heartbeat_interval_secs must be >= 10");
        }
        if self.poll_interval_secs < 5 {
            bail!("poll_interval_secs must be >= 5");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be > 0");
        }
        Ok(())
    }

    /// Decode the HMAC secret into its 32 raw bytes
    pub fn hmac_secret_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.hmac_secret).context("hmac_secret is not valid hex")
    }

    /// Server URL with any trailing slash stripped
    pub fn server_url_trimmed(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Create a template configuration with placeholder credentials
    pub fn template() -> Self {
        Self {
            agent_name: "CHANGE_ME".to_string(),
            agent_token: "CHANGE_ME".to_string(),
            hmac_secret: "CHANGE_ME_64_HEX_CHARS".to_string(),
            server_url: "https://your-server.example.com".to_string(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            poll_interval_secs: default_poll_interval(),
            max_retries: default_max_retries(),
            retry_backoff_multiplier: default_retry_backoff(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}
