//! LiteLLM-backed proxy runtime.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{Notify, watch};
use tracing::{debug, info, warn};

use super::backend::{LaunchSpec, ProxyBackend, ProxyProcess};
use crate::error::{RelayError, RelayResult};

/// Executable looked up on `PATH` when no explicit binary is configured.
pub const DEFAULT_PROGRAM: &str = "litellm";

/// Command that installs the runtime when it is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for InstallCommand {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: ["-m", "pip", "install", "litellm[proxy]"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Runs `litellm --config <file> --host 127.0.0.1 --port <port>`.
#[derive(Debug, Clone)]
pub struct LiteLlmBackend {
    program: PathBuf,
    installer: Option<InstallCommand>,
}

impl Default for LiteLlmBackend {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl LiteLlmBackend {
    /// Backend using `program` and the default installer.
    ///
    /// A program given as a path (anything with a separator) is anchored to
    /// the current directory; the proxy itself runs in its scoped working
    /// directory. A bare name is left for `PATH` lookup.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: resolve_program(program.into()),
            installer: Some(InstallCommand::default()),
        }
    }

    /// Executable that will be run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Replace the installer; `None` turns a missing runtime into an error.
    #[must_use]
    pub fn with_installer(mut self, installer: Option<InstallCommand>) -> Self {
        self.installer = installer;
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }

    fn install_error(&self, reason: impl Into<String>) -> RelayError {
        RelayError::DependencyInstall {
            runtime: self.program_name(),
            reason: reason.into(),
        }
    }
}

fn resolve_program(program: PathBuf) -> PathBuf {
    if program.is_absolute() || program.components().count() < 2 {
        return program;
    }
    match std::path::absolute(&program) {
        Ok(absolute) => absolute,
        Err(e) => {
            warn!(program = %program.display(), error = %e, "Could not resolve proxy runtime path");
            program
        }
    }
}

#[async_trait]
impl ProxyBackend for LiteLlmBackend {
    fn name(&self) -> &str {
        "litellm"
    }

    async fn ensure_installed(&self) -> RelayResult<()> {
        if self.is_available().await {
            debug!(program = %self.program.display(), "Proxy runtime available");
            return Ok(());
        }

        let Some(installer) = &self.installer else {
            return Err(self.install_error("not found and automatic installation is disabled"));
        };

        info!(
            installer = %installer.program,
            args = ?installer.args,
            "Proxy runtime not found, installing"
        );
        let status = Command::new(&installer.program)
            .args(&installer.args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| self.install_error(format!("failed to run {}: {e}", installer.program)))?;

        if !status.success() {
            return Err(self.install_error(format!("installer exited with {status}")));
        }
        if !self.is_available().await {
            return Err(self.install_error("still not runnable after installation"));
        }

        info!("Proxy runtime installed");
        Ok(())
    }

    fn launch(&self, spec: &LaunchSpec) -> RelayResult<Box<dyn ProxyProcess>> {
        let mut command = Command::new(&self.program);
        // Terminal SIGINT goes to the foreground group only, not the proxy
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .arg("--config")
            .arg(&spec.config_path)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(spec.port.to_string())
            .current_dir(&spec.work_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| RelayError::Spawn {
                program: self.program_name(),
                source,
            })?;

        info!(pid = ?child.id(), port = %spec.port, "Spawned proxy process");
        Ok(Box::new(ChildProcess::watch(child)))
    }
}

/// A spawned child whose exit is observed by a background task.
#[derive(Debug)]
pub struct ChildProcess {
    pid: Option<u32>,
    exited: watch::Receiver<bool>,
    kill_requested: Arc<Notify>,
}

impl ChildProcess {
    /// Take ownership of `child` and start observing its exit.
    ///
    /// A non-zero exit or a terminating signal is logged, never raised.
    pub fn watch(mut child: Child) -> Self {
        let pid = child.id();
        let (exited_tx, exited) = watch::channel(false);
        let kill_requested = Arc::new(Notify::new());
        let kill_notify = Arc::clone(&kill_requested);

        tokio::spawn(async move {
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    () = kill_notify.notified() => {
                        if let Err(e) = child.start_kill() {
                            debug!(error = %e, "Kill request for proxy process failed");
                        }
                    }
                }
            };

            match status {
                Ok(status) if status.success() => info!(pid = ?pid, "Proxy process exited"),
                Ok(status) => warn!(pid = ?pid, %status, "Proxy process exited abnormally"),
                Err(e) => warn!(pid = ?pid, error = %e, "Failed to observe proxy process exit"),
            }
            let _ = exited_tx.send(true);
        });

        Self {
            pid,
            exited,
            kill_requested,
        }
    }

    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }
}

#[async_trait]
impl ProxyProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn terminate(&self) -> io::Result<()> {
        // A reaped PID may already belong to someone else
        if self.has_exited() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                return crate::process::terminate_pid(pid);
            }
        }

        self.kill_requested.notify_one();
        Ok(())
    }

    fn kill(&self) -> io::Result<()> {
        if self.has_exited() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                return crate::process::kill_pid(pid);
            }
        }

        self.kill_requested.notify_one();
        Ok(())
    }

    async fn wait_exit(&self) {
        let mut exited = self.exited.clone();
        let _ = exited.wait_for(|done| *done).await;
    }
}
