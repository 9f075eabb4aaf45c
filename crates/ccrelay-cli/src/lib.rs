//! Command-line front end for ccrelay.
//!
//! Wraps a command (by default `claude`) so that, when OpenRouter mode is
//! enabled, it talks to OpenRouter either directly or through a local
//! translation proxy.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used only by the binary entry point
use anyhow as _;
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod secrets;

// Re-export primary types for convenient access
pub use bootstrap::CliConfig;
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
