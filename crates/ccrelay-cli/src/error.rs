//! CLI-specific error types and mappings.
//!
//! Maps relay errors to exit codes and operator-facing messages.

use ccrelay_runtime::RelayError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Proxy setup or teardown failed.
    #[error("{0}")]
    Relay(String),

    /// The local proxy was explicitly disabled.
    #[error("{0}")]
    ProxyDisabled(String),

    /// The proxy runtime is missing and could not be installed.
    #[error("{0}")]
    Unavailable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Process execution error.
    #[error("Process error: {0}")]
    Process(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: General error
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Relay(_) => 1,
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Process(_) => 71,     // EX_OSERR
            Self::Io(_) => 74,          // EX_IOERR
            Self::ProxyDisabled(_) | Self::Config(_) => 78, // EX_CONFIG
        }
    }

    /// Message for the terminal, with a hint where one helps.
    pub fn user_message(&self) -> String {
        match self {
            Self::ProxyDisabled(msg) => format!(
                "{msg}\nhint: the local proxy cannot be started in this environment; \
                 direct mode sends requests to OpenRouter without it"
            ),
            Self::Unavailable(msg) => format!(
                "{msg}\nhint: install it with `pip install 'litellm[proxy]'` or pass --litellm-bin"
            ),
            other => other.to_string(),
        }
    }
}

impl From<RelayError> for CliError {
    fn from(err: RelayError) -> Self {
        let msg = err.to_string();
        match err {
            RelayError::ProxyDisabled { .. } => Self::ProxyDisabled(msg),
            RelayError::DependencyInstall { .. } => Self::Unavailable(msg),
            RelayError::Spawn { .. } | RelayError::Stop(_) => Self::Process(msg),
            RelayError::ConfigWrite { .. } | RelayError::Allocation { .. } => Self::Io(msg),
            RelayError::HealthClient(_)
            | RelayError::ReadinessTimeout { .. }
            | RelayError::InvalidState { .. } => Self::Relay(msg),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_disabled_gets_hint_and_config_code() {
        let err = CliError::from(RelayError::ProxyDisabled {
            flag: "OPENROUTER_DISABLE_PROXY".to_string(),
        });
        assert_eq!(err.exit_code(), 78);
        let message = err.user_message();
        assert!(message.contains("OPENROUTER_DISABLE_PROXY"));
        assert!(message.contains("hint:"));
    }

    #[test]
    fn test_relay_error_mapping() {
        let timeout = CliError::from(RelayError::ReadinessTimeout {
            port: 4000,
            attempts: 30,
        });
        assert_eq!(timeout.exit_code(), 1);
        assert_eq!(timeout.user_message(), timeout.to_string());

        let install = CliError::from(RelayError::DependencyInstall {
            runtime: "litellm".to_string(),
            reason: "not found".to_string(),
        });
        assert_eq!(install.exit_code(), 69);

        let spawn = CliError::from(RelayError::Spawn {
            program: "litellm".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(spawn.exit_code(), 71);
    }
}
