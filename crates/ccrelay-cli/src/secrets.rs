//! Masking of credentials in terminal output.

use ccrelay_core::HeaderSet;

/// Headers whose values are credentials.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "x-api-key", "proxy-authorization"];

/// Mask a secret, keeping just enough to tell keys apart.
///
/// Keys longer than 12 characters keep their first 6 and last 4;
/// shorter ones are hidden entirely.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Copy of `headers` with credential values masked.
///
/// A `Bearer` scheme prefix is kept readable.
pub fn mask_headers(headers: &HeaderSet) -> HeaderSet {
    let mut masked = HeaderSet::new();
    for directive in headers {
        let value = if SENSITIVE_HEADERS.contains(&directive.name.to_ascii_lowercase().as_str()) {
            match directive.value.split_once(' ') {
                Some((scheme, token)) => format!("{scheme} {}", mask_secret(token)),
                None => mask_secret(&directive.value),
            }
        } else {
            directive.value.clone()
        };
        masked.set(directive.name.clone(), value);
    }
    masked
}
