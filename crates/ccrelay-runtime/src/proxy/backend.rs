//! Backend port for the subordinate proxy runtime.
//!
//! The supervisor drives the proxy through these traits only, so the
//! concrete runtime (LiteLLM in production) can be swapped out in tests.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::RelayResult;

/// Everything needed to launch the proxy process.
#[derive(Clone)]
pub struct LaunchSpec {
    /// Loopback port to bind.
    pub port: u16,
    /// Rendered configuration file.
    pub config_path: PathBuf,
    /// Scoped working directory.
    pub work_dir: PathBuf,
    /// Extra environment for the process (carries the upstream key).
    pub env: Vec<(String, String)>,
}

impl std::fmt::Debug for LaunchSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("LaunchSpec")
            .field("port", &self.port)
            .field("config_path", &self.config_path)
            .field("work_dir", &self.work_dir)
            .field("env", &env_keys)
            .finish()
    }
}

/// A launched proxy process.
#[async_trait]
pub trait ProxyProcess: Send + Sync {
    /// OS process ID, if there is one.
    fn id(&self) -> Option<u32>;

    /// Request graceful termination. Must succeed if the process is already gone.
    fn terminate(&self) -> io::Result<()>;

    /// Force the process to exit. Must succeed if the process is already gone.
    fn kill(&self) -> io::Result<()>;

    /// Resolve once the process has exited.
    async fn wait_exit(&self);
}

/// The subordinate runtime that provides protocol translation.
#[async_trait]
pub trait ProxyBackend: Send + Sync {
    /// Human-readable runtime name for logs and errors.
    fn name(&self) -> &str;

    /// Make sure the runtime is installed. Not retried on failure.
    async fn ensure_installed(&self) -> RelayResult<()>;

    /// Launch the proxy. Exit is observed asynchronously and never raised here.
    fn launch(&self, spec: &LaunchSpec) -> RelayResult<Box<dyn ProxyProcess>>;
}
