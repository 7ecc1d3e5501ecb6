//! HTTP front end for Ldapgate
//!
//! Serves the credential exchange (`POST /auth`) and token review
//! (`POST /token`) endpoints.

pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod test_support;

pub use crate::metrics::MetricsRecorder;
pub use server::{AppState, AuthServer};
