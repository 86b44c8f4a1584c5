//! Configuration types for rolegate
//!
//! This module defines the application configuration, loaded from TOML
//! files and/or environment variables, and the rule file format.

use crate::access_control::roles::{parse_role_entries, parse_roles};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Resource domains, each with its own rule file
    pub domains: HashMap<String, DomainConfig>,

    /// Directory relative rule file paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Path of a domain's rule file, resolved against the config directory
    pub fn rules_path(&self, domain: &DomainConfig) -> Option<PathBuf> {
        let rules = domain.rules.as_deref()?;
        let expanded = PathBuf::from(shellexpand::tilde(rules).as_ref());
        Some(match &self.base_dir {
            Some(base) if expanded.is_relative() => base.join(expanded),
            _ => expanded,
        })
    }
}

/// One resource domain (management interface, service registry, commands...)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Path to the rule file
    pub rules: Option<String>,

    /// Name of the root rule table, also the prefix of every other table
    pub prefix: String,

    /// Roles required when no rule matches (empty = allow)
    pub compulsory_roles: Vec<String>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            rules: None,
            prefix: "acl".to_string(),
            compulsory_roles: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

/// Contents of a rule file
///
/// ```toml
/// [tables."acl.org.example.bundle"]
/// "start(long)" = "admin"
/// "list*" = ["viewer", "admin"]
///
/// [operations]
/// "org.example:type=bundle" = ["start(long)", "list()"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleFile {
    /// Rule tables by name; each maps a rule key to its roles
    pub tables: BTreeMap<String, BTreeMap<String, RoleValue>>,

    /// Operation catalogs by resource identifier
    pub operations: BTreeMap<String, Vec<String>>,
}

/// Roles as written in a rule file: a role string or a list of roles
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RoleValue {
    Text(String),
    List(Vec<String>),
}

impl RoleValue {
    pub fn roles(&self) -> Vec<String> {
        match self {
            RoleValue::Text(raw) => parse_roles(raw),
            RoleValue::List(entries) => parse_role_entries(entries),
        }
    }
}
