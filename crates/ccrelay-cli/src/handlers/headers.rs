//! Headers command handler.
//!
//! Shows how a header directive string is interpreted.

use ccrelay_core::HeaderSet;

use crate::error::CliError;

/// Parse `raw` and print one `Name: Value` line per directive, or a JSON object.
pub fn execute(raw: &str, json: bool) -> Result<i32, CliError> {
    for line in render(raw, json)? {
        println!("{line}");
    }
    Ok(0)
}

/// Output lines for `raw`; empty when no directive was found in line mode.
///
/// Stage diagnostics are logged by [`HeaderSet::parse`] at debug level.
pub fn render(raw: &str, json: bool) -> Result<Vec<String>, CliError> {
    let headers = HeaderSet::parse(Some(raw));
    if json {
        let rendered = serde_json::to_string_pretty(&headers)
            .map_err(|e| CliError::Io(format!("failed to encode headers: {e}")))?;
        return Ok(vec![rendered]);
    }
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![headers.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_json_falls_back_to_lines() {
        // Brace-delimited but not JSON; the line form still yields one header.
        let lines = render("{X-Trace: 1}", false).unwrap();
        assert_eq!(lines, vec!["{X-Trace: 1}".to_string()]);
    }

    #[test]
    fn test_json_output_keeps_order() {
        let lines = render(r#"{"B": "2", "A": "1"}"#, true).unwrap();
        assert_eq!(lines, vec!["{\n  \"B\": \"2\",\n  \"A\": \"1\"\n}".to_string()]);
    }

    #[test]
    fn test_blank_input_prints_nothing() {
        assert!(render("  ", false).unwrap().is_empty());
        assert_eq!(render("", true).unwrap(), vec!["{}".to_string()]);
    }
}
