//! CLI bootstrap - the composition root.
//!
//! The only place where the concrete proxy backend is chosen and wired
//! into the supervisor and lifecycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ccrelay_runtime::{
    LiteLlmBackend, ProxyBackend, ProxySupervisor, ReadinessPolicy, RelayLifecycle,
};

use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Path to the proxy runtime executable.
    pub litellm_bin: PathBuf,
    /// Install the runtime when it is missing.
    pub auto_install: bool,
    /// Readiness polling policy for the proxy.
    pub readiness: ReadinessPolicy,
}

impl CliConfig {
    /// Build config from parsed global options.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            litellm_bin: cli.litellm_bin.clone(),
            auto_install: !cli.no_install,
            readiness: ReadinessPolicy::new(
                Duration::from_millis(cli.ready_interval_ms),
                cli.ready_attempts,
            ),
        }
    }

    /// The production proxy backend.
    pub fn backend(&self) -> Arc<dyn ProxyBackend> {
        let backend = LiteLlmBackend::new(&self.litellm_bin);
        if self.auto_install {
            Arc::new(backend)
        } else {
            Arc::new(backend.with_installer(None))
        }
    }

    /// A supervisor for a standalone proxy.
    pub fn supervisor(&self) -> ProxySupervisor {
        ProxySupervisor::new(self.backend()).with_readiness(self.readiness)
    }

    /// A lifecycle for configuring a wrapped command.
    pub fn lifecycle(&self) -> RelayLifecycle {
        RelayLifecycle::new(self.backend()).with_readiness(self.readiness)
    }
}
