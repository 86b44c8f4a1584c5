//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (ROLEGATE__*)
//! 2. Configuration file (TOML)
//! 3. Default values
//!
//! Rule files are parsed separately with `toml` so that rule keys keep
//! their exact spelling.

use crate::access_control::decision::DecisionPoint;
use crate::access_control::source::{PolicySnapshot, StaticRuleSource};
use crate::access_control::table::RuleTable;
use crate::access_control::types::{OperationQuery, ResourceId};
use crate::config::types::{AppConfig, DomainConfig, RuleFile};
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "rolegate.toml",
    ".rolegate.toml",
    "~/.config/rolegate/config.toml",
    "/etc/rolegate/config.toml",
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();
    let mut base_dir = None;

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        let expanded = shellexpand::tilde(path);
        let path = Path::new(expanded.as_ref());
        if !path.exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
        base_dir = path.parent().map(Path::to_path_buf);
    } else {
        // Try default paths (first existing one wins)
        for candidate in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(candidate);
            let path = Path::new(expanded.as_ref());
            if path.exists() {
                debug!(path = %path.display(), "Using configuration file");
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                base_dir = path.parent().map(Path::to_path_buf);
                break;
            }
        }
    }

    // 3. Add environment variables with ROLEGATE__ prefix
    // e.g., ROLEGATE__LOGGING__LEVEL, ROLEGATE__DOMAINS__SHELL__PREFIX
    // Double underscore (__) maps to nested keys (logging.level)
    builder = builder.add_source(
        Environment::with_prefix("ROLEGATE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let mut app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    app_config.base_dir = base_dir;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "logging.level".to_string(),
        });
    }

    for (name, domain) in &config.domains {
        if domain.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: format!("domains.{}.prefix must not be empty", name),
            });
        }
        if domain.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "domains.{}.prefix must not contain whitespace, got: '{}'",
                    name, domain.prefix
                ),
            });
        }
        if domain.rules.as_deref().is_none_or(|r| r.trim().is_empty()) {
            return Err(ConfigError::Missing {
                field: format!("domains.{}.rules", name),
            });
        }
    }

    Ok(())
}

/// Parse a rule file's contents into a policy snapshot
pub fn load_rules_from_str(toml_str: &str, origin: &str) -> Result<PolicySnapshot, ConfigError> {
    let file: RuleFile = toml::from_str(toml_str).map_err(|e| ConfigError::RuleFile {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;

    let mut snapshot = PolicySnapshot::new();

    for (name, rules) in &file.tables {
        let table = RuleTable::new(rules.iter().map(|(key, value)| (key, value.roles())));
        debug!(table = %name, rules = table.len(), "Loaded rule table");
        snapshot = snapshot.with_table(name.clone(), table);
    }

    for (resource, operations) in &file.operations {
        let id = ResourceId::parse(resource).map_err(|e| ConfigError::Invalid {
            message: format!("operations in {}: {}", origin, e),
        })?;
        let queries = operations
            .iter()
            .map(|op| OperationQuery::parse(op))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Invalid {
                message: format!("operations.\"{}\" in {}: {}", resource, origin, e),
            })?;
        snapshot = snapshot.with_operations(&id, queries);
    }

    Ok(snapshot)
}

/// Read and parse a rule file
pub fn load_rules(path: &Path) -> Result<PolicySnapshot, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::RuleFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_rules_from_str(&contents, &path.display().to_string())
}

/// Build the decision point of a configured domain
pub fn load_domain(config: &AppConfig, name: &str) -> Result<DecisionPoint, ConfigError> {
    let domain: &DomainConfig = config
        .domains
        .get(name)
        .ok_or_else(|| ConfigError::UnknownDomain(name.to_string()))?;
    let path = config.rules_path(domain).ok_or_else(|| ConfigError::Missing {
        field: format!("domains.{}.rules", name),
    })?;

    let snapshot = load_rules(&path)?;
    info!(domain = name, path = %path.display(), "Loaded rules");

    Ok(
        DecisionPoint::new(name, &domain.prefix, Arc::new(StaticRuleSource::new(snapshot)))
            .with_compulsory_roles(domain.compulsory_roles.clone()),
    )
}
