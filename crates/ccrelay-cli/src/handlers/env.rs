//! Env command handler.
//!
//! Prints the variables direct mode would hand to the wrapped command.

use ccrelay_core::{EnvSnapshot, Environment, HeaderSet, RelayOptions, vars};
use ccrelay_runtime::apply_direct;

use crate::error::CliError;
use crate::secrets::{mask_headers, mask_secret};

/// Compute and print the direct-mode environment.
///
/// Nothing is started and the process environment is not modified.
pub fn execute(show_secrets: bool) -> Result<i32, CliError> {
    let env = EnvSnapshot::from_process();
    if !env.flag(vars::DISABLE_PROXY) {
        eprintln!(
            "note: {} is not set, so `run` would start a local proxy; showing direct-mode values",
            vars::DISABLE_PROXY
        );
    }
    for line in render(env, show_secrets)? {
        println!("{line}");
    }
    Ok(0)
}

/// `KEY=value` lines for the Anthropic variables, derived from `env`.
pub fn render(mut env: EnvSnapshot, show_secrets: bool) -> Result<Vec<String>, CliError> {
    let options = RelayOptions::from_env(&env);
    if !options.enabled {
        return Err(CliError::Config(format!("{} is not enabled", vars::ENABLE)));
    }
    let Some(api_key) = options.api_key.clone() else {
        return Err(CliError::Config(format!("{} is not set", vars::API_KEY)));
    };

    apply_direct(&mut env, &options, &api_key);

    let mut lines = Vec::with_capacity(3);
    if let Some(base_url) = env.var(vars::ANTHROPIC_BASE_URL) {
        lines.push(format!("{}={base_url}", vars::ANTHROPIC_BASE_URL));
    }
    if let Some(key) = env.var(vars::ANTHROPIC_API_KEY) {
        let key = if show_secrets { key } else { mask_secret(&key) };
        lines.push(format!("{}={key}", vars::ANTHROPIC_API_KEY));
    }
    if let Some(raw) = env.var(vars::ANTHROPIC_CUSTOM_HEADERS) {
        let headers = HeaderSet::parse(Some(&raw));
        let headers = if show_secrets { headers } else { mask_headers(&headers) };
        lines.push(format!(
            "{}={:?}",
            vars::ANTHROPIC_CUSTOM_HEADERS,
            headers.to_lines()
        ));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "sk-or-v1-abcdef123456";

    fn enabled() -> EnvSnapshot {
        EnvSnapshot::new()
            .with(vars::ENABLE, "1")
            .with(vars::API_KEY, KEY)
    }

    #[test]
    fn test_render_masks_by_default() {
        let lines = render(enabled(), false).unwrap();
        assert_eq!(
            lines,
            [
                "ANTHROPIC_BASE_URL=https://openrouter.ai/api/v1".to_string(),
                "ANTHROPIC_API_KEY=sk-or-...3456".to_string(),
                r#"ANTHROPIC_CUSTOM_HEADERS="Authorization: Bearer sk-or-...3456""#.to_string(),
            ]
        );
    }

    #[test]
    fn test_render_shows_secrets_on_request() {
        let env = enabled().with(vars::SITE_URL, "https://example.com");
        let lines = render(env, true).unwrap();
        assert_eq!(lines[1], format!("ANTHROPIC_API_KEY={KEY}"));
        assert_eq!(
            lines[2],
            format!(
                "ANTHROPIC_CUSTOM_HEADERS={:?}",
                format!("Authorization: Bearer {KEY}\nHTTP-Referer: https://example.com")
            )
        );
    }

    #[test]
    fn test_render_requires_enabled_and_key() {
        assert!(matches!(
            render(EnvSnapshot::new(), false),
            Err(CliError::Config(_))
        ));
        let no_key = EnvSnapshot::new().with(vars::ENABLE, "1");
        assert!(render(no_key, false).unwrap_err().to_string().contains("OPENROUTER_API_KEY"));
    }
}
