//! Process runtime for ccrelay.
//!
//! Allocates a loopback port, supervises the local translation proxy, and
//! orchestrates how a host process is pointed at OpenRouter.

#![deny(unsafe_code)]

pub mod error;
pub mod lifecycle;
pub mod process;
pub mod proxy;

pub use error::{RelayError, RelayResult};

// Re-export orchestration entry points
pub use lifecycle::{
    Configured, EXIT_CODE_SIGINT, EXIT_CODE_SIGTERM, InstalledShutdown, RelayLifecycle,
    SHUTDOWN_GRACE, ShutdownHook, ShutdownSignals, apply_direct,
};

// Re-export process helpers for direct use if needed
pub use process::{ReadinessPolicy, allocate_port, check_http_health, wait_for_http_health};

// Re-export proxy supervision types
pub use proxy::{
    InstallCommand, LaunchSpec, LiteLlmBackend, ProxyBackend, ProxyConfig, ProxyHandle,
    ProxyOptions, ProxyProcess, ProxySupervisor, SupervisorState,
};
