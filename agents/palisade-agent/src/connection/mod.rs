//! Connection module
//!
//! This module handles all communication with the control plane,
//! including request signing, the HTTP client, and payload types.

pub mod auth;
pub mod http;
pub mod protocol;
