//! Policy snapshots and the rule source seam
//!
//! A decision always reads from exactly one [`PolicySnapshot`], so rules
//! from two configuration generations are never compared with each other.

use crate::access_control::table::RuleTable;
use crate::access_control::types::{OperationQuery, ResourceId};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable set of rule tables and operation catalogs
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    tables: HashMap<String, RuleTable>,
    operations: HashMap<String, Vec<OperationQuery>>,
}

impl PolicySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a named rule table
    pub fn with_table(mut self, name: impl Into<String>, table: RuleTable) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// Declare the operations a resource exposes
    pub fn with_operations(
        mut self,
        resource: &ResourceId,
        operations: Vec<OperationQuery>,
    ) -> Self {
        self.operations.insert(resource.canonical(), operations);
        self
    }

    pub fn table(&self, name: &str) -> Option<&RuleTable> {
        self.tables.get(name)
    }

    /// All tables, sorted by name
    pub fn tables(&self) -> Vec<(&str, &RuleTable)> {
        let mut tables: Vec<_> = self
            .tables
            .iter()
            .map(|(name, table)| (name.as_str(), table))
            .collect();
        tables.sort_by_key(|(name, _)| *name);
        tables
    }

    pub fn operations(&self, resource: &ResourceId) -> Option<&[OperationQuery]> {
        self.operations
            .get(&resource.canonical())
            .map(Vec::as_slice)
    }
}

/// Supplies the rule tables a decision point evaluates against.
///
/// Implementations must hand out immutable snapshots; swapping in a new
/// generation means returning a different `Arc`.
pub trait RuleSource: Send + Sync {
    fn snapshot(&self) -> Arc<PolicySnapshot>;
}

/// A rule source that never changes
#[derive(Debug, Clone, Default)]
pub struct StaticRuleSource {
    snapshot: Arc<PolicySnapshot>,
}

impl StaticRuleSource {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }
}

impl From<PolicySnapshot> for StaticRuleSource {
    fn from(snapshot: PolicySnapshot) -> Self {
        Self::new(snapshot)
    }
}

impl RuleSource for StaticRuleSource {
    fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tables_sorted() {
        let snapshot = PolicySnapshot::new()
            .with_table("b", RuleTable::empty())
            .with_table("a", RuleTable::from_pairs([("x", "r")]));
        let names: Vec<&str> = snapshot.tables().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(snapshot.table("a").map(RuleTable::len), Some(1));
        assert!(snapshot.table("c").is_none());
    }

    #[test]
    fn test_operations_keyed_by_canonical_resource() {
        let id = ResourceId::parse("org.example: type = bundle").unwrap();
        let ops = vec![OperationQuery::parse("start(long)").unwrap()];
        let snapshot = PolicySnapshot::new().with_operations(&id, ops.clone());

        let same = ResourceId::parse("org.example:type=bundle").unwrap();
        assert_eq!(snapshot.operations(&same), Some(ops.as_slice()));
    }

    #[test]
    fn test_operations_ignore_property_order() {
        let written = ResourceId::parse("org.example:type=bundle,name=root").unwrap();
        let ops = vec![OperationQuery::parse("stop(long)").unwrap()];
        let snapshot = PolicySnapshot::new().with_operations(&written, ops.clone());

        let reordered = ResourceId::parse("org.example:name=root,type=bundle").unwrap();
        assert_eq!(snapshot.operations(&reordered), Some(ops.as_slice()));

        let other = ResourceId::parse("org.example:type=bundle,name=core").unwrap();
        assert_eq!(snapshot.operations(&other), None);
    }

    #[test]
    fn test_static_source_shares_snapshot() {
        let source = StaticRuleSource::from(PolicySnapshot::new());
        assert!(Arc::ptr_eq(&source.snapshot(), &source.snapshot()));
    }
}
