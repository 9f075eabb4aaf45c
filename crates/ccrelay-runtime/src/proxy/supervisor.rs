//! Proxy supervisor for managing the local translation proxy lifecycle.
//!
//! The supervisor owns the subordinate process and its scoped working
//! directory. Callers only ever receive a [`ProxyHandle`], a capability to
//! reach and stop the proxy, never the process itself.
//!
//! State machine:
//!
//! ```text
//! Uninitialized -> DependencyReady -> ConfigWritten -> Starting -> Ready -> Stopped
//!        \________________\_________________\_____________\___________> Failed
//! ```
//!
//! Key design decisions:
//! - **Disabled check first**: the disable flag is read before any port is
//!   allocated or file written
//! - **Exit observed, not raised**: a dying proxy is only discovered through
//!   the readiness check
//! - **Stop is idempotent**: repeated stops wait on an already-terminating
//!   process and never fail because it is gone

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ccrelay_core::{Environment, vars};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::backend::{LaunchSpec, ProxyBackend, ProxyProcess};
use super::config::{ProxyConfig, ProxyOptions, synthesize};
use super::render::{UPSTREAM_KEY_ENV, WrittenConfig, write_config};
use crate::error::{RelayError, RelayResult};
use crate::process::{ReadinessPolicy, allocate_port, wait_for_http_health};

/// Grace for a forced stop after failed readiness, and for a kill to be observed.
const KILL_WAIT: Duration = Duration::from_secs(2);

/// Lifecycle state of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Uninitialized,
    DependencyReady,
    ConfigWritten,
    Starting,
    Ready,
    Stopped,
    Failed,
}

impl SupervisorState {
    /// Whether no further transitions are possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::DependencyReady => "dependency ready",
            Self::ConfigWritten => "config written",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the supervisor and the handles it hands out.
struct Shared {
    state: Mutex<SupervisorState>,
    written: Mutex<Option<WrittenConfig>>,
    process: Mutex<Option<Arc<dyn ProxyProcess>>>,
    stop_requested: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SupervisorState::Uninitialized),
            written: Mutex::new(None),
            process: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn state(&self) -> SupervisorState {
        *lock(&self.state)
    }

    fn transition(&self, to: SupervisorState) {
        let mut state = lock(&self.state);
        debug!(from = %*state, to = %to, "Supervisor state change");
        *state = to;
    }

    fn fail(&self) {
        let mut state = lock(&self.state);
        if !state.is_terminal() {
            debug!(from = %*state, "Supervisor failed");
            *state = SupervisorState::Failed;
        }
    }

    fn process(&self) -> Option<Arc<dyn ProxyProcess>> {
        lock(&self.process).clone()
    }

    /// Remove the working directory once the process no longer needs it.
    fn release(&self, to: SupervisorState) {
        lock(&self.written).take();
        let mut state = lock(&self.state);
        if *state != SupervisorState::Failed {
            *state = to;
        }
    }

    /// Terminate the process and wait until its exit is observed.
    async fn stop(&self) -> RelayResult<()> {
        let Some(process) = self.process() else {
            self.release(SupervisorState::Stopped);
            return Ok(());
        };

        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            info!(pid = ?process.id(), "Stopping proxy");
            if let Err(e) = process.terminate() {
                self.stop_requested.store(false, Ordering::SeqCst);
                return Err(RelayError::Stop(e));
            }
        }

        process.wait_exit().await;
        self.release(SupervisorState::Stopped);
        Ok(())
    }

    /// `stop`, bounded by `grace`, escalating to a kill. Never fails; problems are logged.
    async fn shutdown(&self, grace: Duration) {
        match timeout(grace, self.stop()).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => warn!(error = %e, "Failed to stop proxy gracefully, killing"),
            Err(_) => warn!("Proxy did not exit within {grace:?}, killing"),
        }

        let Some(process) = self.process() else {
            return;
        };
        if let Err(e) = process.kill() {
            warn!(error = %e, "Failed to kill proxy process");
            return;
        }
        if timeout(KILL_WAIT, process.wait_exit()).await.is_err() {
            warn!(pid = ?process.id(), "Proxy process still running after kill");
            return;
        }
        self.release(SupervisorState::Stopped);
    }
}

/// Capability to reach and stop a running proxy.
#[derive(Clone)]
pub struct ProxyHandle {
    base_url: String,
    master_key: String,
    port: u16,
    shared: Arc<Shared>,
}

impl ProxyHandle {
    /// Anthropic-compatible base URL, ending in `/anthropic`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-run credential for the proxy.
    pub fn master_key(&self) -> &str {
        &self.master_key
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// OS process ID of the proxy, if known.
    pub fn pid(&self) -> Option<u32> {
        self.shared.process().and_then(|p| p.id())
    }

    pub fn state(&self) -> SupervisorState {
        self.shared.state()
    }

    /// Terminate the proxy and wait for its exit.
    ///
    /// Idempotent. Wrap in a timeout if exit confirmation must be bounded,
    /// or use [`ProxyHandle::shutdown`].
    pub async fn stop(&self) -> RelayResult<()> {
        self.shared.stop().await
    }

    /// Stop with a grace period, then kill. Never fails.
    pub async fn shutdown(&self, grace: Duration) {
        self.shared.shutdown(grace).await;
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("base_url", &self.base_url)
            .field("port", &self.port)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

/// Supervisor for one run of the local proxy.
///
/// # Example
///
/// ```ignore
/// let supervisor = ProxySupervisor::new(Arc::new(LiteLlmBackend::default()));
/// let handle = supervisor.start(&options, &env).await?;
/// println!("Proxy at {}", handle.base_url());
/// handle.stop().await?;
/// ```
pub struct ProxySupervisor {
    backend: Arc<dyn ProxyBackend>,
    readiness: ReadinessPolicy,
    shared: Arc<Shared>,
}

impl ProxySupervisor {
    /// Create a supervisor driving `backend`.
    pub fn new(backend: Arc<dyn ProxyBackend>) -> Self {
        Self {
            backend,
            readiness: ReadinessPolicy::default(),
            shared: Arc::new(Shared::new()),
        }
    }

    /// Override the readiness polling policy.
    #[must_use]
    pub const fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.shared.state()
    }

    fn expect_state(&self, action: &'static str, allowed: &[SupervisorState]) -> RelayResult<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(RelayError::InvalidState { action, state })
        }
    }

    /// Bring the proxy up end to end and return a handle once it is healthy.
    ///
    /// # Errors
    ///
    /// - [`RelayError::ProxyDisabled`] if the disable flag is set in `env`,
    ///   before any side effect
    /// - any error of the individual steps; the supervisor is then `Failed`
    pub async fn start(
        &self,
        options: &ProxyOptions,
        env: &dyn Environment,
    ) -> RelayResult<ProxyHandle> {
        if env.flag(vars::DISABLE_PROXY) {
            return Err(RelayError::ProxyDisabled {
                flag: vars::DISABLE_PROXY.to_string(),
            });
        }
        self.expect_state("start", &[SupervisorState::Uninitialized])?;

        let port = allocate_port().await.inspect_err(|_| self.shared.fail())?;
        let config = synthesize(options, port);
        debug!(?config, "Synthesized proxy config");

        self.ensure_dependency().await?;
        self.write_config(&config)?;
        self.spawn(&config)?;
        self.wait_ready(&config).await?;

        Ok(ProxyHandle {
            base_url: config.anthropic_base_url(),
            master_key: config.master_key,
            port,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Verify or install the proxy runtime. Failure is final.
    pub async fn ensure_dependency(&self) -> RelayResult<()> {
        self.expect_state(
            "ensure dependency",
            &[SupervisorState::Uninitialized, SupervisorState::DependencyReady],
        )?;

        match self.backend.ensure_installed().await {
            Ok(()) => {
                self.shared.transition(SupervisorState::DependencyReady);
                Ok(())
            }
            Err(e) => {
                self.shared.fail();
                Err(e)
            }
        }
    }

    /// Write the routing configuration into a fresh scoped directory.
    pub fn write_config(&self, config: &ProxyConfig) -> RelayResult<()> {
        self.expect_state("write config", &[SupervisorState::DependencyReady])?;

        match write_config(config) {
            Ok(written) => {
                *lock(&self.shared.written) = Some(written);
                self.shared.transition(SupervisorState::ConfigWritten);
                Ok(())
            }
            Err(e) => {
                self.shared.fail();
                Err(e)
            }
        }
    }

    /// Launch the proxy on `config.port` inside the scoped directory.
    pub fn spawn(&self, config: &ProxyConfig) -> RelayResult<()> {
        self.expect_state("spawn", &[SupervisorState::ConfigWritten])?;

        let spec = {
            let written = lock(&self.shared.written);
            let Some(written) = written.as_ref() else {
                return Err(RelayError::InvalidState {
                    action: "spawn",
                    state: self.state(),
                });
            };
            LaunchSpec {
                port: config.port,
                config_path: written.path().to_path_buf(),
                work_dir: written.work_dir().to_path_buf(),
                env: vec![(UPSTREAM_KEY_ENV.to_string(), config.api_key.clone())],
            }
        };

        match self.backend.launch(&spec) {
            Ok(process) => {
                *lock(&self.shared.process) = Some(Arc::from(process));
                self.shared.transition(SupervisorState::Starting);
                Ok(())
            }
            Err(e) => {
                self.shared.fail();
                Err(e)
            }
        }
    }

    /// Poll the health endpoint until ready.
    ///
    /// On timeout the process is terminated (then killed) before the error
    /// is returned.
    pub async fn wait_ready(&self, config: &ProxyConfig) -> RelayResult<()> {
        self.expect_state("wait for readiness", &[SupervisorState::Starting])?;

        match wait_for_http_health(config.port, Some(&config.master_key), self.readiness).await {
            Ok(()) => {
                self.shared.transition(SupervisorState::Ready);
                info!(
                    port = %config.port,
                    backend = self.backend.name(),
                    "Local proxy ready"
                );
                Ok(())
            }
            Err(e) => {
                self.shared.fail();
                self.shared.shutdown(KILL_WAIT).await;
                Err(e)
            }
        }
    }

    /// Stop the proxy if one was launched. Idempotent.
    pub async fn stop(&self) -> RelayResult<()> {
        self.shared.stop().await
    }
}

impl fmt::Debug for ProxySupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySupervisor")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ccrelay_core::{EnvSnapshot, RelayOptions};
    use std::sync::atomic::AtomicU32;

    /// Backend that counts calls and refuses to launch.
    #[derive(Default)]
    struct CountingBackend {
        installs: AtomicU32,
    }

    #[async_trait]
    impl ProxyBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        async fn ensure_installed(&self) -> RelayResult<()> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn launch(&self, _spec: &LaunchSpec) -> RelayResult<Box<dyn ProxyProcess>> {
            Err(RelayError::Spawn {
                program: "counting".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn options() -> ProxyOptions {
        let env = EnvSnapshot::new().with(vars::API_KEY, "sk-or-test");
        ProxyOptions::from_relay(&RelayOptions::from_env(&env), "sk-or-test")
    }

    #[tokio::test]
    async fn disabled_flag_fails_before_any_side_effect() {
        let backend = Arc::new(CountingBackend::default());
        let supervisor = ProxySupervisor::new(backend.clone());
        let env = EnvSnapshot::new().with(vars::DISABLE_PROXY, "true");

        let err = supervisor.start(&options(), &env).await.unwrap_err();
        assert!(err.is_proxy_disabled());
        assert_eq!(backend.installs.load(Ordering::SeqCst), 0);
        assert_eq!(supervisor.state(), SupervisorState::Uninitialized);
    }

    #[tokio::test]
    async fn steps_out_of_order_are_rejected() {
        let supervisor = ProxySupervisor::new(Arc::new(CountingBackend::default()));
        let config = synthesize(&options(), 4000);

        assert!(matches!(
            supervisor.spawn(&config),
            Err(RelayError::InvalidState { action: "spawn", .. })
        ));
        assert!(matches!(
            supervisor.write_config(&config),
            Err(RelayError::InvalidState { .. })
        ));
        assert_eq!(supervisor.state(), SupervisorState::Uninitialized);
    }

    #[tokio::test]
    async fn spawn_failure_marks_failed_and_stop_is_harmless() {
        let root = tempfile::tempdir().unwrap();
        let supervisor = ProxySupervisor::new(Arc::new(CountingBackend::default()));
        let config = synthesize(&options().with_work_root(root.path()), 4000);

        supervisor.ensure_dependency().await.unwrap();
        supervisor.write_config(&config).unwrap();
        assert_eq!(supervisor.state(), SupervisorState::ConfigWritten);

        assert!(matches!(
            supervisor.spawn(&config),
            Err(RelayError::Spawn { .. })
        ));
        assert_eq!(supervisor.state(), SupervisorState::Failed);

        supervisor.stop().await.unwrap();
        supervisor.stop().await.unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Failed);
        // Working directory was released by stop.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn state_display() {
        assert_eq!(SupervisorState::DependencyReady.to_string(), "dependency ready");
        assert!(SupervisorState::Failed.is_terminal());
        assert!(!SupervisorState::Ready.is_terminal());
    }
}
