//! Agent module
//!
//! This module contains the concurrent runtime of the agent: the heartbeat
//! and job poll loops, and the supervisor that owns their lifecycle.

pub mod heartbeat;
pub mod poller;
pub mod supervisor;
