//! Access control module
//!
//! Resolves the roles required to invoke an operation on a resource from
//! declarative rule tables, and answers allow/deny questions for adapters.
//!
//! ## Rule Keys
//!
//! Rule precedence, highest to lowest:
//!
//! 1. **Argument rules with signature** - `bar(String,int)["cc","17"]` or
//!    `bar(String,int)[/a+/,/\d+/]`
//! 2. **Signature rule** - `bar(String,int)`
//! 3. **Argument rules without signature** - `bar["cc","17"]`
//! 4. **Method rule** - `bar`
//! 5. **Wildcard** - `get*`, the longest matching prefix wins
//!
//! Exact literals beat regexes; the roles of all matching regex rules at a
//! level are combined.
//!
//! ## Example Rule File
//!
//! ```toml
//! [tables."jmx.acl.org.example.bundle"]
//! "start(long)" = "admin"
//! "install(String)[/file:.*/]" = "admin, deployer"
//! "list*" = "viewer, admin  # read-only"
//!
//! [tables."jmx.acl"]
//! "*" = "admin"
//! ```

pub mod decision;
pub mod key;
pub mod matcher;
pub mod resolver;
pub mod roles;
pub mod source;
pub mod table;
pub mod types;

pub use decision::{BatchRow, DecisionPoint, InvocationGuard};
pub use key::{KeyForm, RuleKey, normalize_key};
pub use matcher::{Matcher, evaluate};
pub use resolver::resolve;
pub use roles::parse_roles;
pub use source::{PolicySnapshot, RuleSource, StaticRuleSource};
pub use table::{RuleIssue, RuleTable};
pub use types::{Invocation, OperationQuery, Precedence, ResourceId, RoleMatch, Subject};
