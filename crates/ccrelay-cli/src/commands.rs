//! Main commands enum.

use clap::Subcommand;

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure the environment, then run a command (default: `claude`)
    Run {
        /// Command and arguments to run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Start the local proxy and keep it running until interrupted
    Proxy {
        /// Preferred model, added to the routing table
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the variables direct mode would set
    Env {
        /// Print keys and credentials unmasked
        #[arg(long)]
        show_secrets: bool,
    },

    /// Parse header directives and print the normalized result
    Headers {
        /// Directives, as `Name: Value` lines or a JSON object
        raw: String,
        /// Print as a JSON object
        #[arg(long)]
        json: bool,
    },
}
