//! Error types for proxy supervision and lifecycle orchestration.
//!
//! Every variant except [`RelayError::Stop`] is fatal to the host action.
//! Stop failures only surface from explicit `stop()` calls; exit-path
//! cleanup logs them instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::proxy::SupervisorState;

/// Errors that can occur while bringing up or tearing down the local proxy.
#[derive(Debug, Error)]
pub enum RelayError {
    // === Setup ===
    /// No local port could be bound within the retry budget.
    #[error("Failed to allocate a local port after {attempts} attempts: {source}")]
    Allocation {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// The subordinate runtime is missing and could not be installed.
    #[error("Proxy runtime '{runtime}' is unavailable: {reason}")]
    DependencyInstall { runtime: String, reason: String },

    /// The proxy was explicitly disabled for this environment.
    #[error("Local proxy is disabled ({flag} is set); unset it or run in direct mode")]
    ProxyDisabled { flag: String },

    /// The routing configuration could not be written.
    #[error("Failed to write proxy config to {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The subordinate process could not be launched.
    #[error("Failed to spawn proxy process '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // === Readiness ===
    /// The HTTP client for health checks could not be constructed.
    #[error("Failed to build health check client: {0}")]
    HealthClient(#[source] reqwest::Error),

    /// The health endpoint never answered 200 within the attempt ceiling.
    #[error("Proxy on port {port} did not become ready after {attempts} health checks")]
    ReadinessTimeout { port: u16, attempts: u32 },

    // === Teardown ===
    /// Signalling the subordinate process failed.
    #[error("Failed to stop proxy process: {0}")]
    Stop(#[source] std::io::Error),

    // === Other ===
    /// A supervisor step was invoked out of order.
    #[error("Supervisor cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: SupervisorState,
    },
}

impl RelayError {
    /// Whether this is the expected "proxy disabled" escape hatch.
    pub const fn is_proxy_disabled(&self) -> bool {
        matches!(self, Self::ProxyDisabled { .. })
    }
}

/// Result type alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
