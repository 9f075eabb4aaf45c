//! Proxy command handler.
//!
//! Starts the local proxy on its own, prints how to reach it, and keeps it
//! running until SIGINT or SIGTERM.

use ccrelay_core::{EnvSnapshot, RelayOptions, vars};
use ccrelay_runtime::{ProxyOptions, SHUTDOWN_GRACE, ShutdownSignals};
use tracing::info;

use crate::bootstrap::CliConfig;
use crate::error::CliError;

/// Execute the proxy command.
///
/// Unlike `run`, this does not require `CLAUDE_CODE_USE_OPENROUTER`; it
/// does honour `OPENROUTER_DISABLE_PROXY`.
///
/// # Returns
///
/// 130 or 143, once a signal has stopped the proxy.
pub async fn execute(config: &CliConfig, model: Option<String>) -> Result<i32, CliError> {
    let mut signals = ShutdownSignals::register();
    let env = EnvSnapshot::from_process();
    let mut options = RelayOptions::from_env(&env);
    if model.is_some() {
        options.preferred_model = model;
    }
    let Some(api_key) = options.api_key.clone() else {
        return Err(CliError::Config(format!("{} is not set", vars::API_KEY)));
    };

    let proxy_options = ProxyOptions::from_relay(&options, api_key);
    let handle = config.supervisor().start(&proxy_options, &env).await?;

    println!("export {}={}", vars::ANTHROPIC_BASE_URL, handle.base_url());
    println!("export {}={}", vars::ANTHROPIC_API_KEY, handle.master_key());
    eprintln!(
        "Proxy listening on port {} with {} models. Press Ctrl+C to stop.",
        handle.port(),
        proxy_options.models.len()
    );

    let code = signals.recv().await;
    info!(code, "Stopping proxy");
    handle.shutdown(SHUTDOWN_GRACE).await;
    Ok(code)
}
