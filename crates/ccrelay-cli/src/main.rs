//! CLI entry point - the composition root.
//!
//! Command dispatch routes to handlers; every handler returns the exit code.

use clap::{CommandFactory, Parser};
use tracing::error;
use tracing_subscriber::EnvFilter;

use ccrelay_cli::{Cli, CliConfig, CliError, Commands, handlers};

async fn dispatch(command: Commands, config: &CliConfig) -> Result<i32, CliError> {
    match command {
        Commands::Run { command } => handlers::run::execute(config, &command).await,
        Commands::Proxy { model } => handlers::proxy::execute(config, model).await,
        Commands::Env { show_secrets } => handlers::env::execute(show_secrets),
        Commands::Headers { raw, json } => handlers::headers::execute(&raw, json),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables first so RUST_LOG and OPENROUTER_* from .env apply
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging on stderr; stdout belongs to the wrapped command
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();

    let config = CliConfig::from_cli(&cli);

    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let code = match dispatch(command, &config).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e.user_message());
            e.exit_code()
        }
    };
    std::process::exit(code);
}
