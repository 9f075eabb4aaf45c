//! Relay options and the environment variables they are read from.
//!
//! These are pure domain types: loading happens through the [`Environment`]
//! abstraction so callers decide where values come from.

use crate::env::Environment;
use crate::headers::HeaderSet;
use crate::models::{ModelSet, extract_model_flag, parse_model_list};

/// Default upstream API base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// `HTTP-Referer` sent upstream when no site URL is configured.
pub const DEFAULT_SITE_URL: &str = "https://github.com/anthropics/claude-code";

/// `X-Title` sent upstream when no app title is configured.
pub const DEFAULT_APP_TITLE: &str = "Claude Code";

/// Header carrying the site URL upstream.
pub const REFERER_HEADER: &str = "HTTP-Referer";

/// Header carrying the app title upstream.
pub const TITLE_HEADER: &str = "X-Title";

/// Environment variable names.
pub mod vars {
    // Consumed
    pub const ENABLE: &str = "CLAUDE_CODE_USE_OPENROUTER";
    pub const API_KEY: &str = "OPENROUTER_API_KEY";
    pub const BASE_URL: &str = "OPENROUTER_BASE_URL";
    pub const SITE_URL: &str = "OPENROUTER_SITE_URL";
    pub const APP_TITLE: &str = "OPENROUTER_APP_TITLE";
    pub const EXTRA_HEADERS: &str = "OPENROUTER_EXTRA_HEADERS";
    pub const ADDITIONAL_MODELS: &str = "OPENROUTER_ADDITIONAL_MODELS";
    pub const PREFERRED_MODEL: &str = "OPENROUTER_MODEL";
    pub const DISABLE_PROXY: &str = "OPENROUTER_DISABLE_PROXY";

    // Produced
    pub const ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
    pub const ANTHROPIC_CUSTOM_HEADERS: &str = "ANTHROPIC_CUSTOM_HEADERS";
}

/// Typed view of the relay's environment configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayOptions {
    /// Whether OpenRouter compatibility is switched on at all.
    pub enabled: bool,

    /// Upstream API key. `None` when unset or blank.
    pub api_key: Option<String>,

    /// Upstream base URL override.
    pub base_url: Option<String>,

    /// Site URL sent as `HTTP-Referer`.
    pub site_url: Option<String>,

    /// App title sent as `X-Title`.
    pub app_title: Option<String>,

    /// Raw extra header directives (line or JSON form).
    pub extra_headers: Option<String>,

    /// Raw comma/newline separated list of extra model identifiers.
    pub additional_models: Option<String>,

    /// Explicit preferred model, wins over any `--model` argument.
    pub preferred_model: Option<String>,

    /// Skip the local proxy and inject headers directly.
    pub disable_proxy: bool,

    /// Free-form argument string of the wrapped command.
    pub cli_args: Option<String>,
}

impl RelayOptions {
    /// Read options from an environment.
    pub fn from_env(env: &dyn Environment) -> Self {
        Self {
            enabled: env.flag(vars::ENABLE),
            api_key: env.non_empty(vars::API_KEY),
            base_url: env.non_empty(vars::BASE_URL),
            site_url: env.non_empty(vars::SITE_URL),
            app_title: env.non_empty(vars::APP_TITLE),
            extra_headers: env.var(vars::EXTRA_HEADERS),
            additional_models: env.var(vars::ADDITIONAL_MODELS),
            preferred_model: env.non_empty(vars::PREFERRED_MODEL),
            disable_proxy: env.flag(vars::DISABLE_PROXY),
            cli_args: None,
        }
    }

    /// Attach the wrapped command's argument string.
    #[must_use]
    pub fn with_cli_args(mut self, args: impl Into<String>) -> Self {
        self.cli_args = Some(args.into());
        self
    }

    /// Upstream base URL with the default applied and trailing slashes removed.
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Preferred model: the explicit override, else the first `--model` argument.
    pub fn preferred_model_hint(&self) -> Option<String> {
        self.preferred_model
            .clone()
            .or_else(|| self.cli_args.as_deref().and_then(extract_model_flag))
    }

    /// Extra header directives, parsed.
    pub fn extra_header_set(&self) -> HeaderSet {
        HeaderSet::parse(self.extra_headers.as_deref())
    }

    /// Defaults, then the preferred model, then the additional list.
    pub fn model_set(&self, preferred: Option<&str>) -> ModelSet {
        let mut models = ModelSet::with_defaults();
        if let Some(preferred) = preferred {
            models.insert(preferred);
        }
        if let Some(raw) = self.additional_models.as_deref() {
            models.extend(parse_model_list(raw));
        }
        models
    }

    /// Upstream attribution headers for the proxy: defaults overlaid by
    /// explicit site/title, then by extra headers.
    pub fn upstream_headers(&self) -> HeaderSet {
        let mut headers = HeaderSet::new();
        headers.set(
            REFERER_HEADER,
            self.site_url.as_deref().unwrap_or(DEFAULT_SITE_URL),
        );
        headers.set(
            TITLE_HEADER,
            self.app_title.as_deref().unwrap_or(DEFAULT_APP_TITLE),
        );
        headers.merge(&self.extra_header_set());
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvSnapshot;
    use crate::models::DEFAULT_MODELS;

    fn enabled_env() -> EnvSnapshot {
        EnvSnapshot::new()
            .with(vars::ENABLE, "true")
            .with(vars::API_KEY, "sk-or-test")
    }

    #[test]
    fn test_from_env_reads_flags_and_blanks() {
        let env = enabled_env()
            .with(vars::SITE_URL, "   ")
            .with(vars::DISABLE_PROXY, "1")
            .with(vars::BASE_URL, "https://proxy.example.com/v1/");
        let options = RelayOptions::from_env(&env);

        assert!(options.enabled);
        assert!(options.disable_proxy);
        assert_eq!(options.api_key.as_deref(), Some("sk-or-test"));
        assert_eq!(options.site_url, None);
        assert_eq!(options.effective_base_url(), "https://proxy.example.com/v1");
    }

    #[test]
    fn test_missing_everything_is_disabled() {
        let options = RelayOptions::from_env(&EnvSnapshot::new());
        assert_eq!(options, RelayOptions::default());
        assert_eq!(options.effective_base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_preferred_model_override_beats_cli_args() {
        let options = RelayOptions::from_env(&enabled_env()).with_cli_args("--model cli/model");
        assert_eq!(options.preferred_model_hint().as_deref(), Some("cli/model"));

        let options = RelayOptions::from_env(&enabled_env().with(vars::PREFERRED_MODEL, "env/model"))
            .with_cli_args("--model cli/model");
        assert_eq!(options.preferred_model_hint().as_deref(), Some("env/model"));
    }

    #[test]
    fn test_model_set_order_is_stable() {
        let env = enabled_env().with(vars::ADDITIONAL_MODELS, "x/one, anthropic/claude-opus-4\nx/two");
        let options = RelayOptions::from_env(&env);

        let first = options.model_set(Some("x/preferred"));
        let second = options.model_set(Some("x/preferred"));
        assert_eq!(first, second);

        let ids: Vec<&str> = first.iter().collect();
        let n = DEFAULT_MODELS.len();
        assert_eq!(&ids[..n], DEFAULT_MODELS);
        assert_eq!(&ids[n..], ["x/preferred", "x/one", "x/two"]);
    }

    #[test]
    fn test_upstream_headers_defaults_and_overrides() {
        let options = RelayOptions::from_env(&enabled_env());
        assert_eq!(
            options.upstream_headers().to_lines(),
            format!("HTTP-Referer: {DEFAULT_SITE_URL}\nX-Title: {DEFAULT_APP_TITLE}")
        );

        let env = enabled_env()
            .with(vars::APP_TITLE, "Mine")
            .with(vars::EXTRA_HEADERS, "x-title: Extra\nX-Env: prod");
        let headers = RelayOptions::from_env(&env).upstream_headers();
        assert_eq!(
            headers.to_lines(),
            format!("HTTP-Referer: {DEFAULT_SITE_URL}\nx-title: Extra\nX-Env: prod")
        );
    }
}
