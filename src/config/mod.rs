//! Configuration module
//!
//! Handles loading and validating configuration from TOML files and
//! environment variables, and turning rule files into policy snapshots.

pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_from_str, load_domain, load_rules, load_rules_from_str};
pub use types::*;
