//! Command handlers.
//!
//! Handlers follow the pattern:
//! - Signature: `pub async fn execute(config: &CliConfig, ...) -> Result<i32, CliError>`
//! - The returned value is the process exit code
//! - Relay work is delegated to `ccrelay-runtime`; handlers only format output

pub mod env;
pub mod headers;
pub mod proxy;
pub mod run;
