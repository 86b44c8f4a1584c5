//! Immutable rule tables
//!
//! A rule table is the parsed form of one flat key → roles map. Keys are
//! normalized and classified once when the table is built; the table is
//! never mutated afterwards, so it can be shared freely between threads.

use crate::access_control::key::{KeyForm, RuleKey, normalize_key};
use crate::access_control::matcher::Matcher;
use crate::access_control::roles::parse_roles;
use tracing::warn;

/// One rule of a table
#[derive(Debug, Clone)]
pub struct RuleEntry {
    /// Normalized key text
    pub key: String,
    pub rule: RuleKey,
    pub roles: Vec<String>,
}

/// A problem found in a rule table; such rules never match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIssue {
    pub key: String,
    pub reason: String,
}

/// Parsed, ordered rule table
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    entries: Vec<RuleEntry>,
}

impl RuleTable {
    /// Build a table from raw keys and already parsed role lists.
    ///
    /// Entries keep the iteration order. When two raw keys normalize to the
    /// same key, the first one wins.
    pub fn new<K: AsRef<str>>(rules: impl IntoIterator<Item = (K, Vec<String>)>) -> Self {
        let mut entries: Vec<RuleEntry> = Vec::new();

        for (raw, roles) in rules {
            let raw = raw.as_ref();
            let key = normalize_key(raw);

            if entries.iter().any(|e| e.key == key) {
                warn!(key = raw, normalized = %key, "Duplicate rule key ignored");
                continue;
            }

            let rule = RuleKey::parse(&key);
            for issue in key_issues(&key, &rule) {
                warn!(key = %issue.key, reason = %issue.reason, "Rule will never match");
            }

            entries.push(RuleEntry { key, rule, roles });
        }

        Self { entries }
    }

    /// Build a table from raw keys and raw role strings
    pub fn from_pairs<K: AsRef<str>, V: AsRef<str>>(
        rules: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::new(
            rules
                .into_iter()
                .map(|(key, value)| (key, parse_roles(value.as_ref()))),
        )
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    /// Entries that can take part in resolution
    pub fn valid_entries(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries.iter().filter(|e| e.rule.is_valid())
    }

    /// Look up the roles of a normalized key
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.roles.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Invalid keys and malformed regexes, in table order
    pub fn issues(&self) -> Vec<RuleIssue> {
        self.entries
            .iter()
            .flat_map(|e| key_issues(&e.key, &e.rule))
            .collect()
    }
}

fn key_issues(key: &str, rule: &RuleKey) -> Vec<RuleIssue> {
    match &rule.form {
        KeyForm::Invalid(reason) => vec![RuleIssue {
            key: key.to_string(),
            reason: reason.clone(),
        }],
        KeyForm::Arguments { matchers, .. } => matchers
            .iter()
            .filter_map(|m| match m {
                Matcher::Regex(regex) => regex.error().map(|e| RuleIssue {
                    key: key.to_string(),
                    reason: format!("malformed regex '{}': {}", regex.source(), e),
                }),
                Matcher::Exact(_) => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
