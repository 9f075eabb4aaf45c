//! Proxy configuration synthesis.
//!
//! Pure value construction: nothing here touches the filesystem or network.
//! Rendering and writing the config file is the supervisor's job.

use std::fmt;
use std::path::PathBuf;

use ccrelay_core::{HeaderSet, ModelSet, RelayOptions};
use uuid::Uuid;

/// Prefix that makes generated master keys recognizable in logs and configs.
pub const MASTER_KEY_PREFIX: &str = "sk-ccrelay-";

/// Path under which the proxy serves the Anthropic-compatible API.
pub const ANTHROPIC_PATH: &str = "/anthropic";

/// Stream timeout handed to the proxy, long enough for extended generations.
pub const STREAM_TIMEOUT_SECS: u64 = 600;

/// Inputs for synthesizing a proxy configuration.
#[derive(Clone)]
pub struct ProxyOptions {
    /// Upstream API key.
    pub api_key: String,
    /// Upstream base URL, without trailing slash.
    pub base_url: String,
    /// Model identifiers to route, in table order.
    pub models: ModelSet,
    /// Headers injected into every upstream request.
    pub headers: HeaderSet,
    /// Directory under which the scoped working directory is created.
    pub work_root: PathBuf,
}

impl ProxyOptions {
    /// Derive proxy inputs from relay options and a present upstream key.
    pub fn from_relay(options: &RelayOptions, api_key: impl Into<String>) -> Self {
        let preferred = options.preferred_model_hint();
        Self {
            api_key: api_key.into(),
            base_url: options.effective_base_url(),
            models: options.model_set(preferred.as_deref()),
            headers: options.upstream_headers(),
            work_root: std::env::temp_dir(),
        }
    }

    /// Override the working directory root.
    #[must_use]
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }
}

impl fmt::Debug for ProxyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyOptions")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("headers", &self.headers.len())
            .field("work_root", &self.work_root)
            .finish()
    }
}

/// Full routing configuration for one proxy run.
///
/// Created at start time, never reused across runs.
#[derive(Clone)]
pub struct ProxyConfig {
    pub api_key: String,
    pub base_url: String,
    pub models: ModelSet,
    pub headers: HeaderSet,
    /// Per-run credential downstream clients present to the proxy.
    pub master_key: String,
    /// Loopback port the proxy listens on.
    pub port: u16,
    pub work_root: PathBuf,
}

impl ProxyConfig {
    /// `http://127.0.0.1:<port>`
    pub fn listen_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Base URL downstream clients should use.
    pub fn anthropic_base_url(&self) -> String {
        format!("{}{ANTHROPIC_PATH}", self.listen_url())
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("headers", &self.headers.len())
            .field("port", &self.port)
            .field("work_root", &self.work_root)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh master key. Never derived from the upstream key.
pub fn generate_master_key() -> String {
    format!("{MASTER_KEY_PREFIX}{}", Uuid::new_v4().simple())
}

/// Build the routing configuration for a proxy listening on `port`.
pub fn synthesize(options: &ProxyOptions, port: u16) -> ProxyConfig {
    ProxyConfig {
        api_key: options.api_key.clone(),
        base_url: options.base_url.clone(),
        models: options.models.clone(),
        headers: options.headers.clone(),
        master_key: generate_master_key(),
        port,
        work_root: options.work_root.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccrelay_core::{DEFAULT_MODELS, EnvSnapshot, vars};

    fn options() -> ProxyOptions {
        let env = EnvSnapshot::new()
            .with(vars::ENABLE, "1")
            .with(vars::API_KEY, "sk-or-upstream")
            .with(vars::ADDITIONAL_MODELS, "openai/gpt-4.1");
        let relay = RelayOptions::from_env(&env).with_cli_args("--model google/gemini-2.5-pro");
        ProxyOptions::from_relay(&relay, "sk-or-upstream")
    }

    #[test]
    fn test_synthesis_is_deterministic_except_master_key() {
        let opts = options();
        let a = synthesize(&opts, 4000);
        let b = synthesize(&opts, 4000);

        assert_eq!(a.models, b.models);
        assert_eq!(a.headers, b.headers);
        assert_ne!(a.master_key, b.master_key);
    }

    #[test]
    fn test_model_order_defaults_preferred_additional() {
        let config = synthesize(&options(), 4000);
        let ids: Vec<&str> = config.models.iter().collect();
        let n = DEFAULT_MODELS.len();

        assert_eq!(&ids[..n], DEFAULT_MODELS);
        assert_eq!(&ids[n..], ["google/gemini-2.5-pro", "openai/gpt-4.1"]);
    }

    #[test]
    fn test_master_key_shape() {
        let config = synthesize(&options(), 4000);
        assert!(config.master_key.starts_with(MASTER_KEY_PREFIX));
        assert_eq!(config.master_key.len(), MASTER_KEY_PREFIX.len() + 32);
        assert!(!config.master_key.contains(&config.api_key));
    }

    #[test]
    fn test_urls() {
        let config = synthesize(&options(), 4123);
        assert_eq!(config.listen_url(), "http://127.0.0.1:4123");
        assert_eq!(config.anthropic_base_url(), "http://127.0.0.1:4123/anthropic");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = synthesize(&options(), 4000);
        let rendered = format!("{config:?} {:?}", options());
        assert!(!rendered.contains("sk-or-upstream"));
        assert!(!rendered.contains(&config.master_key));
    }
}
