//! Error types for rolegate
//!
//! Library errors are `thiserror` enums; the binary wraps them in `anyhow`
//! at the top level.
//!
//! Note that none of these errors means "access denied". The engine only
//! ever returns data; adapters turn a negative answer into whatever
//! authorization failure their host expects.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Failed to parse rule file '{path}': {reason}")]
    RuleFile { path: String, reason: String },

    #[error("Unknown domain: {0}")]
    UnknownDomain(String),
}

/// A resource identifier that cannot be understood.
///
/// Kept separate from "no rule found": callers must fail closed on this.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed resource identifier '{resource}': {reason}")]
pub struct ResourceError {
    pub resource: String,
    pub reason: String,
}

impl ResourceError {
    pub fn new(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new("", "identifier is empty")
    }

    pub fn empty_domain(resource: impl Into<String>) -> Self {
        Self::new(resource, "domain part is empty")
    }

    pub fn bad_property(resource: impl Into<String>, property: impl Into<String>) -> Self {
        Self::new(
            resource,
            format!("property '{}' is not of the form key=value", property.into()),
        )
    }
}

/// An operation query string (`method(sig)`) that cannot be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed operation query '{query}': {reason}")]
pub struct QueryError {
    pub query: String,
    pub reason: String,
}

impl QueryError {
    pub fn new(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;
