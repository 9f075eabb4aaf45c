//! Per-process orchestration: decide between direct and proxied mode,
//! publish the Anthropic-facing environment, and wire up teardown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ccrelay_core::{Environment, HeaderSet, REFERER_HEADER, RelayOptions, TITLE_HEADER, vars};
use tracing::{debug, info, warn};

use crate::error::RelayResult;
use crate::process::ReadinessPolicy;
use crate::proxy::{ProxyBackend, ProxyHandle, ProxyOptions, ProxySupervisor};

/// Conventional exit status after SIGINT (128 + 2).
pub const EXIT_CODE_SIGINT: i32 = 130;

/// Conventional exit status after SIGTERM (128 + 15).
pub const EXIT_CODE_SIGTERM: i32 = 143;

/// Grace period for the proxy to exit before it is killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What [`RelayLifecycle::configure`] did.
#[derive(Debug)]
pub enum Configured {
    /// A previous call already configured this process.
    AlreadyInitialized,
    /// OpenRouter mode is not enabled.
    Disabled,
    /// Enabled, but no API key; the environment was left untouched.
    MissingApiKey,
    /// Anthropic variables now point straight at the upstream.
    Direct { base_url: String },
    /// A local proxy is running and the Anthropic variables point at it.
    Proxied {
        handle: ProxyHandle,
        shutdown: ShutdownHook,
    },
}

impl Configured {
    /// Handle of the running proxy, in proxied mode.
    pub const fn proxy(&self) -> Option<&ProxyHandle> {
        match self {
            Self::Proxied { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

/// Entry point for configuring a host process.
pub struct RelayLifecycle {
    backend: Arc<dyn ProxyBackend>,
    readiness: ReadinessPolicy,
    work_root: Option<PathBuf>,
    initialized: bool,
}

impl RelayLifecycle {
    pub fn new(backend: Arc<dyn ProxyBackend>) -> Self {
        Self {
            backend,
            readiness: ReadinessPolicy::default(),
            work_root: None,
            initialized: false,
        }
    }

    #[must_use]
    pub const fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Create scoped working directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Configure the host environment for OpenRouter.
    ///
    /// Runs at most once successfully; later calls return
    /// [`Configured::AlreadyInitialized`]. A failed call leaves the
    /// lifecycle uninitialized so it may be retried.
    ///
    /// # Errors
    ///
    /// Any supervisor error from proxied mode, including
    /// [`RelayError::ProxyDisabled`](crate::RelayError::ProxyDisabled).
    pub async fn configure(
        &mut self,
        env: &mut dyn Environment,
        cli_args: Option<&str>,
    ) -> RelayResult<Configured> {
        if self.initialized {
            debug!("OpenRouter already configured for this process");
            return Ok(Configured::AlreadyInitialized);
        }

        let mut options = RelayOptions::from_env(env);
        if let Some(args) = cli_args {
            options = options.with_cli_args(args);
        }

        if !options.enabled {
            debug!("{} not set, leaving environment untouched", vars::ENABLE);
            return Ok(Configured::Disabled);
        }

        let Some(api_key) = options.api_key.clone() else {
            warn!(
                "{} is set but {} is missing; skipping OpenRouter configuration",
                vars::ENABLE,
                vars::API_KEY
            );
            return Ok(Configured::MissingApiKey);
        };

        let outcome = if options.disable_proxy {
            let base_url = apply_direct(env, &options, &api_key);
            info!(base_url = %base_url, "Using OpenRouter directly");
            Configured::Direct { base_url }
        } else {
            self.start_proxied(env, &options, api_key).await?
        };

        self.initialized = true;
        Ok(outcome)
    }

    async fn start_proxied(
        &self,
        env: &mut dyn Environment,
        options: &RelayOptions,
        api_key: String,
    ) -> RelayResult<Configured> {
        let mut proxy_options = ProxyOptions::from_relay(options, api_key);
        if let Some(root) = &self.work_root {
            proxy_options = proxy_options.with_work_root(root);
        }

        let supervisor =
            ProxySupervisor::new(Arc::clone(&self.backend)).with_readiness(self.readiness);
        let handle = supervisor.start(&proxy_options, &*env).await?;

        env.set_var(vars::ANTHROPIC_BASE_URL, handle.base_url().to_string());
        env.set_var(vars::ANTHROPIC_API_KEY, handle.master_key().to_string());
        env.remove_var(vars::ANTHROPIC_CUSTOM_HEADERS);
        info!(
            base_url = %handle.base_url(),
            models = proxy_options.models.len(),
            "Routing Anthropic traffic through local proxy"
        );

        Ok(Configured::Proxied {
            shutdown: ShutdownHook::new(handle.clone()),
            handle,
        })
    }
}

impl std::fmt::Debug for RelayLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayLifecycle")
            .field("backend", &self.backend.name())
            .field("readiness", &self.readiness)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

/// Point the Anthropic variables straight at the upstream.
///
/// An existing `ANTHROPIC_API_KEY` is kept. Existing custom headers are
/// merged under the upstream `Authorization`, then explicitly configured
/// attribution headers, then extra headers; later entries replace earlier
/// ones case-insensitively. Returns the base URL that was set.
pub fn apply_direct(env: &mut dyn Environment, options: &RelayOptions, api_key: &str) -> String {
    let base_url = options.effective_base_url();
    env.set_var(vars::ANTHROPIC_BASE_URL, base_url.clone());

    if env.non_empty(vars::ANTHROPIC_API_KEY).is_none() {
        env.set_var(vars::ANTHROPIC_API_KEY, api_key.to_string());
    }

    let mut headers = HeaderSet::parse(env.var(vars::ANTHROPIC_CUSTOM_HEADERS).as_deref());
    headers.set("Authorization", format!("Bearer {api_key}"));
    if let Some(site) = &options.site_url {
        headers.set(REFERER_HEADER, site.clone());
    }
    if let Some(title) = &options.app_title {
        headers.set(TITLE_HEADER, title.clone());
    }
    headers.merge(&options.extra_header_set());
    env.set_var(vars::ANTHROPIC_CUSTOM_HEADERS, headers.to_lines());

    base_url
}

/// Teardown for a proxied run.
///
/// Either [`install`](Self::install) the signal handlers and later call
/// [`InstalledShutdown::shutdown`] on normal exit, or call
/// [`shutdown`](Self::shutdown) directly.
#[derive(Debug)]
#[must_use = "the proxy keeps running unless it is shut down"]
pub struct ShutdownHook {
    handle: ProxyHandle,
    grace: Duration,
}

impl ShutdownHook {
    pub const fn new(handle: ProxyHandle) -> Self {
        Self {
            handle,
            grace: SHUTDOWN_GRACE,
        }
    }

    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Stop the proxy when SIGINT or SIGTERM arrives, then exit the
    /// process with 130 or 143.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install(self) -> InstalledShutdown {
        let mut signals = ShutdownSignals::register();
        let handle = self.handle.clone();
        let grace = self.grace;

        let task = tokio::spawn(async move {
            let code = signals.recv().await;
            info!(code, "Stopping proxy before exit");
            handle.shutdown(grace).await;
            std::process::exit(code);
        });

        InstalledShutdown {
            handle: self.handle,
            grace: self.grace,
            task,
        }
    }

    /// Stop the proxy, killing it if it outlives the grace period.
    pub async fn shutdown(self) {
        self.handle.shutdown(self.grace).await;
    }
}

/// Signal handlers installed by [`ShutdownHook::install`].
#[derive(Debug)]
#[must_use = "the proxy keeps running unless it is shut down"]
pub struct InstalledShutdown {
    handle: ProxyHandle,
    grace: Duration,
    task: tokio::task::JoinHandle<()>,
}

impl InstalledShutdown {
    /// Normal-exit teardown: drop the signal handlers and stop the proxy.
    pub async fn shutdown(self) {
        self.task.abort();
        self.handle.shutdown(self.grace).await;
    }
}

/// SIGINT/SIGTERM listener reporting the conventional exit status.
///
/// Handlers are installed by [`register`](Self::register), so a signal that
/// arrives before the first [`recv`](Self::recv) is not lost.
#[cfg(unix)]
#[derive(Debug)]
pub struct ShutdownSignals {
    streams: Option<(tokio::signal::unix::Signal, tokio::signal::unix::Signal)>,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Install the handlers. Must be called from within a Tokio runtime.
    pub fn register() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        let streams = signal(SignalKind::interrupt())
            .and_then(|int| Ok((int, signal(SignalKind::terminate())?)));
        match streams {
            Ok(streams) => Self {
                streams: Some(streams),
            },
            Err(e) => {
                warn!(error = %e, "Failed to install signal handlers");
                Self { streams: None }
            }
        }
    }

    /// Wait for the next signal; 130 for SIGINT, 143 for SIGTERM.
    ///
    /// Never resolves if the handlers could not be installed.
    pub async fn recv(&mut self) -> i32 {
        let Some((interrupt, terminate)) = &mut self.streams else {
            return std::future::pending().await;
        };

        tokio::select! {
            _ = interrupt.recv() => {
                info!("Received SIGINT");
                EXIT_CODE_SIGINT
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM");
                EXIT_CODE_SIGTERM
            }
        }
    }
}

#[cfg(not(unix))]
#[derive(Debug)]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub const fn register() -> Self {
        Self
    }

    pub async fn recv(&mut self) -> i32 {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            return std::future::pending().await;
        }
        info!("Received Ctrl+C");
        EXIT_CODE_SIGINT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccrelay_core::EnvSnapshot;

    fn enabled() -> EnvSnapshot {
        EnvSnapshot::new()
            .with(vars::ENABLE, "1")
            .with(vars::API_KEY, "sk-or-abc")
            .with(vars::DISABLE_PROXY, "1")
    }

    #[test]
    fn direct_mode_sets_upstream_and_authorization() {
        let mut env = enabled();
        let options = RelayOptions::from_env(&env);
        let base_url = apply_direct(&mut env, &options, "sk-or-abc");

        assert_eq!(base_url, "https://openrouter.ai/api/v1");
        assert_eq!(env.var(vars::ANTHROPIC_BASE_URL).as_deref(), Some(base_url.as_str()));
        assert_eq!(env.var(vars::ANTHROPIC_API_KEY).as_deref(), Some("sk-or-abc"));
        assert_eq!(
            env.var(vars::ANTHROPIC_CUSTOM_HEADERS).as_deref(),
            Some("Authorization: Bearer sk-or-abc")
        );
    }

    #[test]
    fn direct_mode_keeps_existing_key_and_merges_headers() {
        let mut env = enabled()
            .with(vars::ANTHROPIC_API_KEY, "sk-ant-existing")
            .with(vars::ANTHROPIC_CUSTOM_HEADERS, "x-trace: 1\nauthorization: old")
            .with(vars::APP_TITLE, "Relay")
            .with(vars::EXTRA_HEADERS, r#"{"X-Trace": "2"}"#);
        let options = RelayOptions::from_env(&env);
        apply_direct(&mut env, &options, "sk-or-abc");

        assert_eq!(
            env.var(vars::ANTHROPIC_API_KEY).as_deref(),
            Some("sk-ant-existing")
        );
        assert_eq!(
            env.var(vars::ANTHROPIC_CUSTOM_HEADERS).as_deref(),
            Some("X-Trace: 2\nAuthorization: Bearer sk-or-abc\nX-Title: Relay")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn delivered_signals_map_to_exit_codes() {
        use nix::sys::signal::{Signal, raise};
        use tokio::time::timeout;

        let mut signals = ShutdownSignals::register();

        raise(Signal::SIGTERM).unwrap();
        let code = timeout(Duration::from_secs(5), signals.recv()).await.unwrap();
        assert_eq!(code, EXIT_CODE_SIGTERM);

        raise(Signal::SIGINT).unwrap();
        let code = timeout(Duration::from_secs(5), signals.recv()).await.unwrap();
        assert_eq!(code, EXIT_CODE_SIGINT);
    }
}
