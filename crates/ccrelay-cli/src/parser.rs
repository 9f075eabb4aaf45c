//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::FalseyValueParser;

use crate::commands::Commands;

/// Run Claude Code against OpenRouter.
///
/// OpenRouter mode itself is configured through `CLAUDE_CODE_USE_OPENROUTER`
/// and the other `OPENROUTER_*` variables; the options here only tune how
/// the local proxy is run.
#[derive(Parser)]
#[command(name = "ccrelay")]
#[command(about = "Run Claude Code against OpenRouter through a local translation proxy")]
#[command(version)]
pub struct Cli {
    /// Proxy runtime executable
    #[arg(
        long = "litellm-bin",
        env = "CCRELAY_LITELLM_BIN",
        default_value = ccrelay_runtime::proxy::litellm::DEFAULT_PROGRAM,
        global = true
    )]
    pub litellm_bin: PathBuf,

    /// Fail instead of installing the proxy runtime when it is missing
    #[arg(
        long = "no-install",
        env = "CCRELAY_NO_INSTALL",
        value_parser = FalseyValueParser::new(),
        global = true
    )]
    pub no_install: bool,

    /// Health checks before the proxy is considered dead
    #[arg(long = "ready-attempts", default_value_t = 30, global = true)]
    pub ready_attempts: u32,

    /// Delay between health checks, in milliseconds
    #[arg(long = "ready-interval-ms", default_value_t = 200, global = true)]
    pub ready_interval_ms: u64,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
