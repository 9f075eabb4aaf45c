//! Run command handler.
//!
//! Configures the environment for OpenRouter, runs the wrapped command with
//! it, and tears the proxy down afterwards.
//!
//! The wrapped command is owned until it exits. SIGTERM is forwarded to it
//! and ends the run with 143 once it has stopped (or been killed after the
//! grace period). SIGINT from a terminal already reaches the whole
//! foreground group, so it is only forwarded when stdin is not a terminal;
//! either way the exit code is the command's own.

use std::io::IsTerminal;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use ccrelay_core::{EnvChange, EnvSnapshot};
use ccrelay_runtime::{
    Configured, EXIT_CODE_SIGINT, EXIT_CODE_SIGTERM, SHUTDOWN_GRACE, ShutdownSignals,
};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::bootstrap::CliConfig;
use crate::error::CliError;

/// Command run when none is given.
pub const DEFAULT_COMMAND: &str = "claude";

/// Execute the run command against the current process environment.
///
/// # Returns
///
/// The wrapped command's exit code, `128 + signal` if it was killed, or
/// 143 after a forwarded SIGTERM.
pub async fn execute(config: &CliConfig, command: &[String]) -> Result<i32, CliError> {
    run_with_env(config, command, EnvSnapshot::from_process()).await
}

/// Execute the run command with `inherited` as the starting environment.
///
/// Only the variables the relay changed relative to `inherited` are applied
/// to the wrapped command; everything else is inherited from this process
/// unchanged.
pub async fn run_with_env(
    config: &CliConfig,
    command: &[String],
    inherited: EnvSnapshot,
) -> Result<i32, CliError> {
    let (program, args) = match command.split_first() {
        Some((program, args)) => (program.as_str(), args),
        None => (DEFAULT_COMMAND, &[][..]),
    };

    let mut signals = ShutdownSignals::register();
    let mut env = inherited.clone();
    let cli_args = args.join(" ");
    let mut lifecycle = config.lifecycle();

    let shutdown = match lifecycle.configure(&mut env, Some(&cli_args)).await? {
        Configured::Proxied { handle, shutdown } => {
            info!(base_url = %handle.base_url(), "Proxy ready");
            Some(shutdown)
        }
        other => {
            debug!(outcome = ?other, "No proxy started");
            None
        }
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    for change in env.changes_since(&inherited) {
        match change {
            EnvChange::Set(key, value) => {
                cmd.env(key, value);
            }
            EnvChange::Remove(key) => {
                cmd.env_remove(key);
            }
        }
    }

    debug!(program, ?args, "Running wrapped command");
    let result = match cmd.spawn() {
        Ok(mut child) => wait_for_child(&mut child, &mut signals).await,
        Err(e) => Err(e),
    };

    if let Some(shutdown) = shutdown {
        shutdown.shutdown().await;
    }

    result.map_err(|e| CliError::Process(format!("failed to run {program}: {e}")))
}

/// Wait for the wrapped command, relaying shutdown signals to it.
async fn wait_for_child(
    child: &mut Child,
    signals: &mut ShutdownSignals,
) -> std::io::Result<i32> {
    let forward_interrupt = !std::io::stdin().is_terminal();

    loop {
        tokio::select! {
            status = child.wait() => return status.map(exit_code),
            code = signals.recv() => {
                if code == EXIT_CODE_SIGINT && !forward_interrupt {
                    debug!("SIGINT delivered to the wrapped command by the terminal");
                    continue;
                }
                forward(child, code)?;
                return stop_child(child, SHUTDOWN_GRACE).await.map(|status| {
                    if code == EXIT_CODE_SIGTERM {
                        EXIT_CODE_SIGTERM
                    } else {
                        exit_code(status)
                    }
                });
            }
        }
    }
}

#[cfg(unix)]
fn forward(child: &Child, code: i32) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    debug!(pid, code, "Forwarding signal to wrapped command");
    if code == EXIT_CODE_SIGINT {
        ccrelay_runtime::process::interrupt_pid(pid)
    } else {
        ccrelay_runtime::process::terminate_pid(pid)
    }
}

#[cfg(not(unix))]
fn forward(child: &mut Child, _code: i32) -> std::io::Result<()> {
    child.start_kill()
}

/// Wait up to `grace` for the command to exit, then kill it.
async fn stop_child(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    if let Ok(status) = timeout(grace, child.wait()).await {
        return status;
    }
    warn!(grace = ?grace, "Wrapped command did not exit in time, killing it");
    child.kill().await?;
    child.wait().await
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use ccrelay_core::vars;
    use ccrelay_runtime::ReadinessPolicy;

    fn config() -> CliConfig {
        CliConfig {
            litellm_bin: PathBuf::from("/nonexistent/litellm"),
            auto_install: false,
            readiness: ReadinessPolicy::default(),
        }
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_exit_code_is_forwarded() {
        let code = run_with_env(&config(), &sh("exit 7"), EnvSnapshot::new())
            .await
            .unwrap();
        assert_eq!(code, 7);
    }

    #[tokio::test]
    async fn test_signal_exit_maps_to_shell_convention() {
        let code = run_with_env(&config(), &sh("kill -TERM $$"), EnvSnapshot::new())
            .await
            .unwrap();
        assert_eq!(code, 143);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_process_error() {
        let err = run_with_env(
            &config(),
            &["/nonexistent/program".to_string()],
            EnvSnapshot::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.exit_code(), 71);
    }

    #[tokio::test]
    async fn test_direct_mode_reaches_wrapped_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("env.txt");
        let env = EnvSnapshot::new()
            .with(vars::ENABLE, "1")
            .with(vars::API_KEY, "sk-or-test")
            .with(vars::DISABLE_PROXY, "1");

        let script = format!(
            "printf '%s\\n%s\\n' \"$ANTHROPIC_BASE_URL\" \"$ANTHROPIC_API_KEY\" > '{}'",
            out.display()
        );
        let code = run_with_env(&config(), &sh(&script), env).await.unwrap();
        assert_eq!(code, 0);

        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written, "https://openrouter.ai/api/v1\nsk-or-test\n");
    }

    #[tokio::test]
    async fn test_untouched_variables_are_inherited() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("path.txt");
        let script = format!("printf '%s' \"$PATH\" > '{}'", out.display());

        // An empty starting snapshot must not clear what the command inherits.
        let code = run_with_env(&config(), &sh(&script), EnvSnapshot::new())
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            std::env::var("PATH").unwrap_or_default()
        );
    }
}
