//! Model identifier sets.

/// Models always routed through the local proxy, in routing-table order.
pub const DEFAULT_MODELS: &[&str] = &[
    "anthropic/claude-sonnet-4",
    "anthropic/claude-opus-4",
    "anthropic/claude-3.7-sonnet",
    "anthropic/claude-3.5-haiku",
];

/// Ordered set of model identifiers.
///
/// Iteration order is insertion order; inserting an identifier that is
/// already present is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSet {
    ids: Vec<String>,
}

impl ModelSet {
    #[must_use]
    pub const fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// A set seeded with [`DEFAULT_MODELS`].
    pub fn with_defaults() -> Self {
        let mut set = Self::new();
        set.extend(DEFAULT_MODELS.iter().copied());
        set
    }

    /// Insert a trimmed identifier. Returns `false` for blanks and duplicates.
    pub fn insert(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    pub fn extend<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.insert(id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.ids
    }
}

/// Split a comma- or newline-separated model list into trimmed, non-empty entries.
pub fn parse_model_list(raw: &str) -> Vec<&str> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract the value of the first `--model` flag from a free-form argument string.
///
/// Both `--model <value>` and `--model=<value>` are recognized. A trailing
/// `--model` with no value yields `None`.
pub fn extract_model_flag(args: &str) -> Option<String> {
    let mut tokens = args.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "--model" {
            return tokens.next().map(str::to_string);
        }
        if let Some(value) = token.strip_prefix("--model=") {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}
