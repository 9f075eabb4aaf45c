//! Environment abstraction.
//!
//! Relay configuration is read from, and written back to, an [`Environment`]
//! rather than the live process environment. The host captures an
//! [`EnvSnapshot`], lets the lifecycle mutate it, then hands the result to
//! the command it wraps.

use std::collections::BTreeMap;

/// Key/value environment the relay reads options from and writes results to.
pub trait Environment: Send + Sync {
    /// Value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;

    /// Set `key` to `value`, replacing any previous value.
    fn set_var(&mut self, key: &str, value: String);

    /// Remove `key` if present.
    fn remove_var(&mut self, key: &str);

    /// Value of `key` with surrounding whitespace removed; blank counts as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Whether `key` holds a truthy flag value.
    fn flag(&self, key: &str) -> bool {
        self.var(key).as_deref().is_some_and(is_truthy)
    }
}

/// Interpret a flag value: `1`, `true`, `yes` and `on` (any case) are truthy.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// In-memory environment, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Builder-style setter, mostly for tests.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Edits that turn `before` into `self`, ordered by key.
    ///
    /// Applying these on top of the inherited process environment leaves
    /// every untouched variable alone, including ones a snapshot cannot hold.
    pub fn changes_since(&self, before: &Self) -> Vec<EnvChange> {
        let removed = before
            .vars
            .keys()
            .filter(|key| !self.vars.contains_key(*key))
            .map(|key| EnvChange::Remove(key.clone()));
        let set = self
            .vars
            .iter()
            .filter(|(key, value)| before.vars.get(*key) != Some(*value))
            .map(|(key, value)| EnvChange::Set(key.clone(), value.clone()));

        let mut changes: Vec<EnvChange> = removed.chain(set).collect();
        changes.sort_by(|a, b| a.key().cmp(b.key()));
        changes
    }
}

/// A single edit between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChange {
    Set(String, String),
    Remove(String),
}

impl EnvChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Set(key, _) | Self::Remove(key) => key,
        }
    }
}

impl Environment for EnvSnapshot {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn set_var(&mut self, key: &str, value: String) {
        self.vars.insert(key.to_string(), value);
    }

    fn remove_var(&mut self, key: &str) {
        self.vars.remove(key);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
