//! rolegate
//!
//! Role-based authorization policy resolution for management interfaces,
//! service registries and command shells.
//!
//! ## Features
//!
//! - **Declarative rule tables** keyed by method name, signature and argument values
//! - **Exact and regex argument matching** to tell overloads and argument values apart
//! - **Hierarchical tables** per resource, from most specific to the domain root
//! - **Batch checks** for listing what a caller may do
//!
//! ## Decision Model
//!
//! ```text
//! argument rules → signature rule → method rule → wildcard → no rule (allow)
//! ```
//!
//! The engine never denies anything itself: it returns role lists and
//! booleans, and the adapter at the host boundary enforces them.
//!
//! ## Example Configuration
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [domains.management]
//! rules = "rules/management.toml"
//! prefix = "jmx.acl"
//! ```

pub mod access_control;
pub mod config;
pub mod error;

// Re-export main types
pub use access_control::{DecisionPoint, Invocation, InvocationGuard, Subject};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
