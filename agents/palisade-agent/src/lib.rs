//! Palisade Agent Library
//!
//! This crate provides the core functionality for the Palisade host agent,
//! including HMAC-signed control plane communication, the heartbeat and job
//! poll loops, and the integrity-verified self-update pipeline.

pub mod agent;
pub mod cli;
pub mod connection;
pub mod runtime;
pub mod update;

// Re-exports for convenience
pub use agent::heartbeat::HeartbeatLoop;
pub use agent::poller::JobPollLoop;
pub use agent::supervisor::AgentSupervisor;
pub use cli::config::Config;
pub use connection::auth::{sign, verify, SignedHeaders};
pub use connection::http::{ApiClient, RequestError};
pub use connection::protocol::{HeartbeatBody, Job, UpdateDescriptor};
pub use runtime::executor::{ExecutorRegistry, JobHandler};
pub use update::manager::{UpdateManager, UpdateOutcome};
pub use update::state::{UpdatePhase, UpdateStateMachine};
