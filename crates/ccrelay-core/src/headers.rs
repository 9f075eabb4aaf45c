//! Header directive parsing and merging.
//!
//! A [`HeaderSet`] is a case-insensitive, insertion-ordered collection of
//! `Name: Value` directives. Two textual forms are accepted:
//!
//! - **Line form**: `Name: Value` pairs separated by LF or CRLF
//! - **JSON form**: a single object, `{"Name": "Value", ...}`
//!
//! Parsing is a two-stage pipeline. The JSON stage only runs when the input
//! is brace-delimited; when it does not apply or cannot parse the input,
//! the line stage takes over. Neither stage fails: fragments that cannot
//! be understood are dropped.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

/// A single header directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDirective {
    /// Header name as written by whoever set it.
    pub name: String,
    /// Header value, trimmed.
    pub value: String,
}

impl HeaderDirective {
    /// Create a new directive.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    fn matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

impl fmt::Display for HeaderDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Outcome of the JSON parsing stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonStage {
    /// The input was a JSON object; these are its usable entries.
    Parsed(HeaderSet),
    /// The input is not brace-delimited, so the JSON stage does not apply.
    NotJson,
    /// The input looked like JSON but is not a valid object.
    Malformed(String),
}

/// Ordered, case-insensitive set of header directives.
///
/// Setting a name that is already present replaces that entry where it
/// stands: the position is the one first seen, the name casing and value
/// are the latest written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<HeaderDirective>,
}

impl HeaderSet {
    /// Create an empty header set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Parse a raw header description.
    ///
    /// Absent or blank input yields an empty set.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::new();
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::new();
        }

        match Self::parse_json_stage(trimmed) {
            JsonStage::Parsed(set) => set,
            JsonStage::NotJson => Self::parse_line_stage(trimmed),
            JsonStage::Malformed(reason) => {
                debug!(%reason, "Header JSON did not parse, falling back to line form");
                Self::parse_line_stage(trimmed)
            }
        }
    }

    /// First stage: interpret brace-delimited input as a JSON object.
    ///
    /// Only string-valued properties with a non-blank key are kept.
    pub fn parse_json_stage(trimmed: &str) -> JsonStage {
        if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
            return JsonStage::NotJson;
        }

        let object: serde_json::Map<String, serde_json::Value> =
            match serde_json::from_str(trimmed) {
                Ok(object) => object,
                Err(e) => return JsonStage::Malformed(e.to_string()),
            };

        let mut set = Self::new();
        for (key, value) in &object {
            let name = key.trim();
            if name.is_empty() {
                continue;
            }
            if let serde_json::Value::String(value) = value {
                set.set(name, value.trim());
            }
        }
        JsonStage::Parsed(set)
    }

    /// Second stage: `Name: Value` lines.
    ///
    /// Lines without a colon, or with an empty name or value, are skipped.
    pub fn parse_line_stage(raw: &str) -> Self {
        let mut set = Self::new();
        for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some((name, value)) = line.split_once(':') else {
                debug!(line, "Skipping header line without a colon");
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                continue;
            }
            set.set(name, value);
        }
        set
    }

    /// Insert or overwrite a directive.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let directive = HeaderDirective::new(name, value);
        match self.entries.iter_mut().find(|d| d.matches(&directive.name)) {
            Some(existing) => *existing = directive,
            None => self.entries.push(directive),
        }
    }

    /// Overlay every directive of `other` onto this set, in order.
    pub fn merge(&mut self, other: &Self) {
        for directive in &other.entries {
            self.set(directive.name.clone(), directive.value.clone());
        }
    }

    /// Value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|d| d.matches(name))
            .map(|d| d.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderDirective> {
        self.entries.iter()
    }

    /// Serialize back to line form, one `Name: Value` per line.
    pub fn to_lines(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a HeaderDirective;
    type IntoIter = std::slice::Iter<'a, HeaderDirective>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for HeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lines())
    }
}

// Serialized as a map so config renderers keep the insertion order.
impl Serialize for HeaderSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for directive in &self.entries {
            map.serialize_entry(&directive.name, &directive.value)?;
        }
        map.end()
    }
}
