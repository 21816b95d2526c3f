//! Auto Updater
//!
//! Drives the self-update pipeline: check for a newer build, download and
//! verify it, back up and replace the running executable, health-check the
//! result, and either restart into the new binary or roll back.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::config::Config;
use crate::connection::http::{ApiClient, CHECK_UPDATES_PATH};
use crate::connection::protocol::{UpdateCheckResponse, UpdateDescriptor};
use crate::update::state::{UpdatePhase, UpdateStateMachine};
use crate::update::version::is_newer;

/// How often the periodic update check runs after startup
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Timeout for the payload download as a whole
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Settling delay before the post-apply health check
const HEALTH_CHECK_SETTLE: Duration = Duration::from_secs(2);

/// Progress is logged once per this many downloaded bytes
const DOWNLOAD_LOG_EVERY: u64 = 1024 * 1024;

const SHA256_CHUNK: usize = 8192;

/// Failure taxonomy for an update attempt
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("download failed: {0}")]
    Download(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("apply failed: {0}")]
    Apply(String),

    #[error("health check failed: {0}")]
    HealthCheck(String),

    #[error("rollback failed: {0}")]
    Rollback(String),
}

/// Outcome of one update attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No newer build, or the check itself failed
    UpToDate,
    /// The attempt failed; the agent keeps running its current binary
    /// (possibly broken, if rollback itself failed)
    Failed,
    /// Apply succeeded but the health check did not; the backup was restored
    RolledBack,
    /// The new binary is in place and healthy; restart is next
    ReadyToRestart,
}

/// Path to the previous executable copy, held between apply and the
/// commit/rollback decision
#[derive(Debug)]
pub struct BackupHandle {
    path: PathBuf,
}

impl BackupHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Self-update manager
pub struct UpdateManager {
    config: Arc<Config>,
    client: Arc<ApiClient>,
    download_client: reqwest::Client,
    state: UpdateStateMachine,
    current_version: String,
    current_exe: PathBuf,
    download_dir: PathBuf,
}

impl UpdateManager {
    /// Create a manager for the running executable
    pub fn new(config: Arc<Config>, client: Arc<ApiClient>) -> Result<Self> {
        let current_exe =
            std::env::current_exe().context("Failed to resolve current executable path")?;
        let download_dir = std::env::temp_dir().join("palisade-update");

        Self::with_paths(
            config,
            client,
            env!("CARGO_PKG_VERSION").to_string(),
            current_exe,
            download_dir,
        )
    }

    /// Create a manager with explicit paths and version
    pub fn with_paths(
        config: Arc<Config>,
        client: Arc<ApiClient>,
        current_version: String,
        current_exe: PathBuf,
        download_dir: PathBuf,
    ) -> Result<Self> {
        let download_client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("Failed to build download client")?;

        Ok(Self {
            config,
            client,
            download_client,
            state: UpdateStateMachine::new(),
            current_version,
            current_exe,
            download_dir,
        })
    }

    /// Current phase tracker, shared with callers that want to observe it
    pub fn state(&self) -> &UpdateStateMachine {
        &self.state
    }

    /// Full update flow. On a successful update the process restarts and
    /// this call does not return; it returns false when no update was
    /// applied, including when spawning the new image failed.
    pub async fn update_if_available(&self) -> bool {
        match self.try_update().await {
            UpdateOutcome::ReadyToRestart => self.restart(),
            _ => false,
        }
    }

    /// Periodic update task: check on a long fixed period until cancelled
    pub async fn run_periodic(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(UPDATE_CHECK_INTERVAL) => {}
                _ = shutdown.cancelled() => break,
            }

            info!("Periodic update check");
            if self.update_if_available().await {
                // Restart is underway; nothing left to do here
                return;
            }
        }

        info!("Update checker stopped");
    }

    /// Run one attempt through the state machine
    pub async fn try_update(&self) -> UpdateOutcome {
        self.state.transition_to(UpdatePhase::Checking);
        let descriptor = match self.check().await {
            Ok(Some(descriptor)) => {
                self.state.transition_to(UpdatePhase::UpdateAvailable);
                descriptor
            }
            Ok(None) => {
                self.state.transition_to(UpdatePhase::NoUpdate);
                return UpdateOutcome::UpToDate;
            }
            Err(e) => {
                warn!(error = %e, "Update check failed");
                self.state.transition_to(UpdatePhase::CheckFailed);
                return UpdateOutcome::UpToDate;
            }
        };

        self.state.transition_to(UpdatePhase::Downloading);
        let staged = match self.download(&descriptor).await {
            Ok(path) => {
                self.state.transition_to(UpdatePhase::Downloaded);
                path
            }
            Err(e) => {
                error!(error = %e, "Failed to download update");
                self.state.transition_to(UpdatePhase::DownloadFailed);
                return UpdateOutcome::Failed;
            }
        };

        self.state.transition_to(UpdatePhase::Verifying);
        if let Err(e) = self.verify(&staged, &descriptor) {
            error!(error = %e, "Update payload rejected");
            if let Err(e) = std::fs::remove_file(&staged) {
                warn!(error = %e, "Failed to remove rejected payload");
            }
            self.state.transition_to(UpdatePhase::VerifyFailed);
            return UpdateOutcome::Failed;
        }
        self.state.transition_to(UpdatePhase::Verified);
        info!("Payload integrity verified");

        self.state.transition_to(UpdatePhase::Applying);
        let backup = match self.apply(&staged) {
            Ok(backup) => {
                self.state.transition_to(UpdatePhase::Applied);
                backup
            }
            Err(e) => {
                error!(error = %e, "Failed to apply update");
                self.state.transition_to(UpdatePhase::ApplyFailed);
                return UpdateOutcome::Failed;
            }
        };

        self.state.transition_to(UpdatePhase::HealthChecking);
        if let Err(e) = self.health_check().await {
            error!(error = %e, "New version failed health check, rolling back");
            self.state.transition_to(UpdatePhase::HealthCheckFailed);

            self.state.transition_to(UpdatePhase::RollingBack);
            return match self.rollback(&backup) {
                Ok(()) => {
                    self.state.transition_to(UpdatePhase::RollbackSucceeded);
                    warn!("Rollback complete, staying on current version");
                    UpdateOutcome::RolledBack
                }
                Err(e) => {
                    self.state.transition_to(UpdatePhase::RollbackFailed);
                    error!(
                        error = %e,
                        backup = %backup.path().display(),
                        "ROLLBACK FAILED: host may be left without a working executable"
                    );
                    UpdateOutcome::Failed
                }
            };
        }
        self.state.transition_to(UpdatePhase::HealthCheckPassed);

        info!(version = %descriptor.version, "Update applied successfully");
        self.state.transition_to(UpdatePhase::Restarting);
        UpdateOutcome::ReadyToRestart
    }

    /// Query the update endpoint; None when already up to date
    async fn check(&self) -> Result<Option<UpdateDescriptor>> {
        info!(current_version = %self.current_version, "Checking for updates");

        let body = self
            .client
            .post(CHECK_UPDATES_PATH, "{}")
            .await
            .context("Update check request failed")?;

        let response: UpdateCheckResponse =
            serde_json::from_str(&body).context("Failed to parse update check response")?;

        let Some(descriptor) = response.into_descriptor() else {
            info!("No update available");
            return Ok(None);
        };

        if is_newer(&descriptor.version, &self.current_version) {
            info!(version = %descriptor.version, "New version available");
            Ok(Some(descriptor))
        } else {
            info!(version = %self.current_version, "Current version is up to date");
            Ok(None)
        }
    }

    /// Stream the payload into the staging directory
    async fn download(&self, descriptor: &UpdateDescriptor) -> Result<PathBuf, UpdateError> {
        std::fs::create_dir_all(&self.download_dir)
            .map_err(|e| UpdateError::Download(e.to_string()))?;

        let staged = self
            .download_dir
            .join(format!("palisade-agent-new{}", std::env::consts::EXE_SUFFIX));

        info!(url = %descriptor.download_url, "Downloading update");

        let response = self
            .download_client
            .get(&descriptor.download_url)
            .send()
            .await
            .map_err(|e| UpdateError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UpdateError::Download(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let mut file = tokio::fs::File::create(&staged)
            .await
            .map_err(|e| UpdateError::Download(e.to_string()))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut next_log = DOWNLOAD_LOG_EVERY;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| UpdateError::Download(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| UpdateError::Download(e.to_string()))?;

            downloaded += chunk.len() as u64;
            if downloaded >= next_log {
                info!(
                    downloaded_bytes = downloaded,
                    total_bytes = descriptor.size_bytes,
                    "Download progress"
                );
                next_log += DOWNLOAD_LOG_EVERY;
            }
        }

        file.flush()
            .await
            .map_err(|e| UpdateError::Download(e.to_string()))?;

        info!(bytes = downloaded, path = %staged.display(), "Download complete");
        Ok(staged)
    }

    /// Validate byte count and SHA-256 against the descriptor
    fn verify(&self, staged: &Path, descriptor: &UpdateDescriptor) -> Result<(), UpdateError> {
        let metadata =
            std::fs::metadata(staged).map_err(|e| UpdateError::Integrity(e.to_string()))?;

        if metadata.len() != descriptor.size_bytes {
            return Err(UpdateError::Integrity(format!(
                "size mismatch: expected {}, got {}",
                descriptor.size_bytes,
                metadata.len()
            )));
        }

        let actual = sha256_file(staged)?;
        if !actual.eq_ignore_ascii_case(&descriptor.sha256) {
            return Err(UpdateError::Integrity(format!(
                "sha256 mismatch: expected {}, got {}",
                descriptor.sha256, actual
            )));
        }

        Ok(())
    }

    /// Back up the current executable, then move the verified payload over it.
    ///
    /// The backup must exist before any mutation of the live path; if the
    /// backup copy fails the attempt aborts with the executable untouched.
    fn apply(&self, staged: &Path) -> Result<BackupHandle, UpdateError> {
        let exe_dir = self
            .current_exe
            .parent()
            .ok_or_else(|| UpdateError::Apply("executable has no parent directory".to_string()))?;

        let backup_dir = exe_dir.join("backup");
        std::fs::create_dir_all(&backup_dir).map_err(|e| UpdateError::Apply(e.to_string()))?;

        let backup_path = backup_dir.join(format!(
            "palisade-agent.backup{}",
            std::env::consts::EXE_SUFFIX
        ));

        info!(backup = %backup_path.display(), "Creating backup");
        std::fs::copy(&self.current_exe, &backup_path)
            .map_err(|e| UpdateError::Apply(e.to_string()))?;

        info!(target = %self.current_exe.display(), "Replacing executable");
        move_file(staged, &self.current_exe).map_err(|e| UpdateError::Apply(e.to_string()))?;
        set_executable(&self.current_exe).map_err(|e| UpdateError::Apply(e.to_string()))?;

        Ok(BackupHandle { path: backup_path })
    }

    /// Post-apply self test: runnable executable, valid config, live round trip
    async fn health_check(&self) -> Result<(), UpdateError> {
        tokio::time::sleep(HEALTH_CHECK_SETTLE).await;

        if !self.current_exe.exists() {
            return Err(UpdateError::HealthCheck("executable missing".to_string()));
        }
        if !is_executable(&self.current_exe) {
            return Err(UpdateError::HealthCheck(
                "executable permission not set".to_string(),
            ));
        }

        if self.config.agent_token.is_empty() || self.config.hmac_secret.is_empty() {
            return Err(UpdateError::HealthCheck(
                "configuration is structurally invalid".to_string(),
            ));
        }

        self.client
            .ping()
            .await
            .map_err(|e| UpdateError::HealthCheck(format!("control plane ping failed: {}", e)))?;

        debug!("Health check passed");
        Ok(())
    }

    /// Restore the backup over the current executable
    fn rollback(&self, backup: &BackupHandle) -> Result<(), UpdateError> {
        if !backup.path.exists() {
            return Err(UpdateError::Rollback("backup not found".to_string()));
        }

        warn!(backup = %backup.path.display(), "Rolling back to previous executable");
        std::fs::copy(&backup.path, &self.current_exe)
            .map_err(|e| UpdateError::Rollback(e.to_string()))?;
        set_executable(&self.current_exe).map_err(|e| UpdateError::Rollback(e.to_string()))?;

        info!("Rollback complete");
        Ok(())
    }

    /// Spawn the new process image and terminate this one
    fn restart(&self) -> bool {
        info!("Restarting agent");
        match Command::new(&self.current_exe).spawn() {
            Ok(_) => std::process::exit(0),
            Err(e) => {
                error!(error = %e, "Failed to spawn updated executable");
                false
            }
        }
    }
}

/// Move a file, falling back to copy-and-remove across filesystems
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

fn sha256_file(path: &Path) -> Result<String, UpdateError> {
    let mut file = std::fs::File::open(path).map_err(|e| UpdateError::Integrity(e.to_string()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; SHA256_CHUNK];

    loop {
        let read = file
            .read(&mut buf)
            .map_err(|e| UpdateError::Integrity(e.to_string()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::connection::http::POLL_JOBS_PATH;

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

    fn manager_in(dir: &TempDir, server_url: &str, exe_content: &[u8]) -> UpdateManager {
        let exe_path = dir.path().join("palisade-agent");
        std::fs::write(&exe_path, exe_content).unwrap();
        set_executable(&exe_path).unwrap();

        let config = test_config(server_url);
        let client = Arc::new(ApiClient::new(&config).unwrap());
        UpdateManager::with_paths(
            config,
            client,
            "1.0.0".to_string(),
            exe_path,
            dir.path().join("staging"),
        )
        .unwrap()
    }

    fn descriptor_for(payload: &[u8], url: &str) -> UpdateDescriptor {
        UpdateDescriptor {
            version: "1.0.1".to_string(),
            download_url: url.to_string(),
            sha256: hex::encode(Sha256::digest(payload)),
            size_bytes: payload.len() as u64,
        }
    }

    /// Mount the check/download/ping endpoints for a full pipeline run
    async fn mount_update_server(server: &MockServer, payload: &[u8], ping_status: u16) {
        let descriptor = descriptor_for(payload, &format!("{}/downloads/agent", server.uri()));

        Mock::given(method("POST"))
            .and(path(CHECK_UPDATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "has_update": true,
                "version": descriptor.version,
                "download_url": descriptor.download_url,
                "sha256": descriptor.sha256,
                "size_bytes": descriptor.size_bytes,
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/downloads/agent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.to_vec()))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path(POLL_JOBS_PATH))
            .respond_with(ResponseTemplate::new(ping_status).set_body_string(r#"{"jobs":[]}"#))
            .mount(server)
            .await;
    }

    #[test]
    fn test_verify_accepts_exact_match() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, "http://127.0.0.1:1", b"old");

        let payload = b"new agent build";
        let staged = dir.path().join("staged");
        std::fs::write(&staged, payload).unwrap();

        let descriptor = descriptor_for(payload, "unused");
        manager.verify(&staged, &descriptor).unwrap();
    }

    #[test]
    fn test_verify_rejects_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, "http://127.0.0.1:1", b"old");

        let payload = b"new agent build";
        let staged = dir.path().join("staged");
        std::fs::write(&staged, payload).unwrap();

        let mut descriptor = descriptor_for(payload, "unused");
        descriptor.size_bytes += 1;

        let err = manager.verify(&staged, &descriptor).unwrap_err();
        assert!(matches!(err, UpdateError::Integrity(_)));
    }

    #[test]
    fn test_verify_rejects_single_bit_corruption() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, "http://127.0.0.1:1", b"old");

        let payload = b"new agent build".to_vec();
        let descriptor = descriptor_for(&payload, "unused");

        let mut corrupted = payload.clone();
        corrupted[0] ^= 0x01;
        let staged = dir.path().join("staged");
        std::fs::write(&staged, &corrupted).unwrap();

        let err = manager.verify(&staged, &descriptor).unwrap_err();
        assert!(matches!(err, UpdateError::Integrity(_)));
    }

    #[test]
    fn test_verify_hash_comparison_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, "http://127.0.0.1:1", b"old");

        let payload = b"new agent build";
        let staged = dir.path().join("staged");
        std::fs::write(&staged, payload).unwrap();

        let mut descriptor = descriptor_for(payload, "unused");
        descriptor.sha256 = descriptor.sha256.to_uppercase();
        manager.verify(&staged, &descriptor).unwrap();
    }

    #[test]
    fn test_apply_creates_backup_before_replacing() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, "http://127.0.0.1:1", b"old build");

        let staged = dir.path().join("staged");
        std::fs::write(&staged, b"new build").unwrap();

        let backup = manager.apply(&staged).unwrap();

        assert_eq!(std::fs::read(backup.path()).unwrap(), b"old build");
        assert_eq!(std::fs::read(&manager.current_exe).unwrap(), b"new build");
        assert!(!staged.exists());
    }

    #[test]
    fn test_failed_backup_leaves_executable_untouched() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, "http://127.0.0.1:1", b"old build");

        // A file where the backup directory should go makes the copy fail
        std::fs::write(dir.path().join("backup"), b"in the way").unwrap();

        let staged = dir.path().join("staged");
        std::fs::write(&staged, b"new build").unwrap();

        let err = manager.apply(&staged).unwrap_err();
        assert!(matches!(err, UpdateError::Apply(_)));
        assert_eq!(std::fs::read(&manager.current_exe).unwrap(), b"old build");
    }

    #[test]
    fn test_rollback_restores_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, "http://127.0.0.1:1", b"old build");

        let staged = dir.path().join("staged");
        std::fs::write(&staged, b"new build").unwrap();

        let backup = manager.apply(&staged).unwrap();
        manager.rollback(&backup).unwrap();

        assert_eq!(std::fs::read(&manager.current_exe).unwrap(), b"old build");
    }

    #[test]
    fn test_rollback_without_backup_fails() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, "http://127.0.0.1:1", b"old build");

        let backup = BackupHandle {
            path: dir.path().join("missing"),
        };
        let err = manager.rollback(&backup).unwrap_err();
        assert!(matches!(err, UpdateError::Rollback(_)));
    }

    #[tokio::test]
    async fn test_check_ignores_older_remote_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHECK_UPDATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "has_update": true,
                "version": "0.9.0",
                "download_url": "https://cdn.example.com/agent",
                "sha256": "00",
                "size_bytes": 1,
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, &server.uri(), b"old");
        assert!(manager.check().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_update_reaches_restart() {
        let server = MockServer::start().await;
        let payload = b"version 1.0.1 build".to_vec();
        mount_update_server(&server, &payload, 200).await;

        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, &server.uri(), b"version 1.0.0 build");

        let outcome = manager.try_update().await;
        assert_eq!(outcome, UpdateOutcome::ReadyToRestart);
        assert_eq!(std::fs::read(&manager.current_exe).unwrap(), payload);
        assert_eq!(manager.state().current(), UpdatePhase::Restarting);
    }

    #[tokio::test]
    async fn test_hash_mismatch_aborts_without_touching_executable() {
        let server = MockServer::start().await;
        let payload = b"version 1.0.1 build".to_vec();

        // Served bytes have the advertised size but a different digest
        let mut corrupted = payload.clone();
        corrupted[0] ^= 0x01;

        let descriptor = descriptor_for(&payload, &format!("{}/downloads/agent", server.uri()));
        Mock::given(method("POST"))
            .and(path(CHECK_UPDATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "has_update": true,
                "version": descriptor.version,
                "download_url": descriptor.download_url,
                "sha256": descriptor.sha256,
                "size_bytes": descriptor.size_bytes,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/downloads/agent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(corrupted))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, &server.uri(), b"version 1.0.0 build");

        let outcome = manager.try_update().await;
        assert_eq!(outcome, UpdateOutcome::Failed);
        assert_eq!(
            std::fs::read(&manager.current_exe).unwrap(),
            b"version 1.0.0 build"
        );
        assert_eq!(manager.state().current(), UpdatePhase::VerifyFailed);
    }

    #[tokio::test]
    async fn test_health_check_failure_triggers_rollback() {
        let server = MockServer::start().await;
        let payload = b"version 1.0.1 build".to_vec();
        // Ping endpoint rejects the new binary's round trip
        mount_update_server(&server, &payload, 500).await;

        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, &server.uri(), b"version 1.0.0 build");

        let outcome = manager.try_update().await;
        assert_eq!(outcome, UpdateOutcome::RolledBack);
        assert_eq!(
            std::fs::read(&manager.current_exe).unwrap(),
            b"version 1.0.0 build"
        );
        assert_eq!(manager.state().current(), UpdatePhase::RollbackSucceeded);
    }
}
