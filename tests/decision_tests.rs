//! Decision point integration tests
//!
//! Covers hierarchical table lookup, default and compulsory outcomes,
//! fail-closed handling of bad input, method/resource level checks and
//! batch evaluation.

use rolegate::access_control::{
    BatchRow, DecisionPoint, Invocation, InvocationGuard, PolicySnapshot, Precedence,
    ResourceId, RuleSource, RuleTable, StaticRuleSource, Subject,
};
use rolegate::config::load_rules_from_str;
use rstest::rstest;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const BUNDLE: &str = "org.example:type=bundle,name=root";

fn management_rules() -> PolicySnapshot {
    PolicySnapshot::new()
        .with_table(
            "jmx.acl.org.example.bundle.root",
            RuleTable::from_pairs([("stop(long)", "admin")]),
        )
        .with_table(
            "jmx.acl.org.example.bundle",
            RuleTable::from_pairs([
                ("stop", "manager"),
                (r#"install(String)["mvn:core"]"#, "admin"),
                ("install(String)[/file:.*/]", "deployer"),
                ("list*", "viewer, manager"),
            ]),
        )
        .with_table("jmx.acl", RuleTable::from_pairs([("*", "admin")]))
}

fn decision_point(snapshot: PolicySnapshot) -> DecisionPoint {
    DecisionPoint::new("management", "jmx.acl", Arc::new(StaticRuleSource::new(snapshot)))
}

fn subject(roles: &[&str]) -> Subject {
    Subject::new(roles.iter().copied())
}

// =============================================================================
// Table hierarchy
// =============================================================================

#[test]
fn test_candidate_tables_most_specific_first() {
    let id = ResourceId::parse(BUNDLE).unwrap();
    assert_eq!(
        id.candidate_tables("jmx.acl"),
        vec![
            "jmx.acl.org.example.bundle.root",
            "jmx.acl.org.example.bundle",
            "jmx.acl.org.example",
            "jmx.acl",
        ]
    );
}

#[test]
fn test_type_property_orders_first() {
    let id = ResourceId::parse("org.example:name=root,type=bundle").unwrap();
    assert_eq!(id.segments(), vec!["org.example", "bundle", "root"]);
}

#[rstest]
#[case(Invocation::new("stop").with_signature(&["long"]), "admin")]
#[case(Invocation::new("stop").with_signature(&["String"]), "manager")]
#[case(Invocation::new("listBundles"), "viewer")]
#[case(Invocation::new("refresh"), "admin")]
fn test_most_specific_table_decides(#[case] invocation: Invocation, #[case] first_role: &str) {
    let dp = decision_point(management_rules());
    let found = dp.required_roles(BUNDLE, &invocation).unwrap().unwrap();
    assert_eq!(found.roles[0], first_role, "for {invocation}");
}

#[test]
fn test_fallthrough_to_less_specific_table() {
    let dp = decision_point(management_rules());
    // Nothing in the .root table applies to `install`, the type table does
    let invocation = Invocation::new("install")
        .with_signature(&["String"])
        .with_args(&["file:/tmp/x.jar"]);
    let found = dp.required_roles(BUNDLE, &invocation).unwrap().unwrap();
    assert_eq!(found.roles, vec!["deployer"]);
    assert_eq!(found.precedence, Precedence::Argument);
}

// =============================================================================
// Outcomes
// =============================================================================

#[test]
fn test_allow_and_deny_by_role() {
    let dp = decision_point(management_rules());
    let stop = Invocation::new("stop").with_signature(&["long"]).with_args(&[42]);

    assert!(dp.can_invoke(&subject(&["admin"]), BUNDLE, &stop));
    assert!(!dp.can_invoke(&subject(&["manager"]), BUNDLE, &stop));
    assert!(!dp.can_invoke(&Subject::anonymous(), BUNDLE, &stop));
}

#[test]
fn test_no_rule_allows_by_default() {
    let dp = decision_point(PolicySnapshot::new());
    assert!(dp.can_invoke(&Subject::anonymous(), "org.other", &Invocation::new("anything")));
}

#[test]
fn test_compulsory_roles_replace_default_allow() {
    let dp = decision_point(PolicySnapshot::new()).with_compulsory_roles(vec!["user".to_string()]);
    let invocation = Invocation::new("anything");

    assert!(!dp.can_invoke(&Subject::anonymous(), "org.other", &invocation));
    assert!(dp.can_invoke(&subject(&["user"]), "org.other", &invocation));
}

#[test]
fn test_empty_role_list_denies_everyone() {
    let snapshot = PolicySnapshot::new()
        .with_table("jmx.acl", RuleTable::from_pairs([("shutdown", "# nobody")]));
    let dp = decision_point(snapshot);
    assert!(!dp.can_invoke(&subject(&["admin"]), "org.example", &Invocation::new("shutdown")));
}

#[rstest]
#[case("")]
#[case(":type=bundle")]
#[case("org.example:type")]
#[case("org.example:type=a,type=b")]
fn test_malformed_resource_fails_closed(#[case] resource: &str) {
    let dp = decision_point(PolicySnapshot::new());
    let anyone = subject(&["admin"]);

    assert!(!dp.can_invoke(&anyone, resource, &Invocation::new("op")));
    assert!(!dp.can_invoke_method(&anyone, resource, "op"));
    assert!(!dp.can_invoke_resource(&anyone, resource));
    assert!(dp.required_roles(resource, &Invocation::new("op")).is_err());
}

// =============================================================================
// Method and resource level checks
// =============================================================================

#[test]
fn test_method_check_considers_every_overload() {
    let dp = decision_point(management_rules());

    // stop(long) needs admin, other overloads need manager
    assert!(dp.can_invoke_method(&subject(&["manager"]), BUNDLE, "stop"));
    assert!(dp.can_invoke_method(&subject(&["admin"]), BUNDLE, "stop"));
    assert!(!dp.can_invoke_method(&subject(&["viewer"]), BUNDLE, "stop"));
}

#[test]
fn test_method_check_with_only_qualified_rules() {
    let snapshot = PolicySnapshot::new()
        .with_table("jmx.acl", RuleTable::from_pairs([("stop(long)", "admin")]));
    let dp = decision_point(snapshot);
    let guest = subject(&["guest"]);

    assert!(!dp.can_invoke_method(&guest, "org.example", "stop"));
    assert!(dp.can_invoke_method(&subject(&["admin"]), "org.example", "stop"));

    // Name-only and qualified queries of the same batch must agree
    let mut queries = BTreeMap::new();
    queries.insert(
        "org.example".to_string(),
        vec!["stop".to_string(), "stop(long)".to_string()],
    );
    let rows = dp.can_invoke_batch(&guest, &queries);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| !row.allowed));
}

#[test]
fn test_method_check_with_catalog_signatures() {
    let rules = r#"
[tables."jmx.acl"]
"stop(long)" = "admin"

[operations]
"org.example" = ["stop(long)", "stop(String)"]
"#;
    let dp = decision_point(load_rules_from_str(rules, "inline").unwrap());

    // stop(String) has no rule, so the default outcome allows it
    assert!(dp.can_invoke_method(&subject(&["guest"]), "org.example", "stop"));

    let strict = dp.with_compulsory_roles(vec!["user".to_string()]);
    assert!(!strict.can_invoke_method(&subject(&["guest"]), "org.example", "stop"));
    assert!(strict.can_invoke_method(&subject(&["user"]), "org.example", "stop"));
}

#[test]
fn test_method_check_with_wildcard_and_qualified_rules() {
    let snapshot = PolicySnapshot::new().with_table(
        "jmx.acl",
        RuleTable::from_pairs([("stop(long)", "admin"), ("st*", "operator")]),
    );
    let dp = decision_point(snapshot);

    assert!(dp.can_invoke_method(&subject(&["operator"]), "org.example", "stop"));
    assert!(!dp.can_invoke_method(&subject(&["guest"]), "org.example", "stop"));
}

#[test]
fn test_method_check_with_advisory_argument_roles() {
    let dp = decision_point(management_rules());
    assert!(dp.can_invoke_method(&subject(&["deployer"]), BUNDLE, "install"));
    assert!(!dp.can_invoke_method(&subject(&["viewer"]), BUNDLE, "install"));
}

#[test]
fn test_resource_check_from_rule_keys() {
    let dp = decision_point(management_rules());
    assert!(dp.can_invoke_resource(&subject(&["viewer"]), BUNDLE));
    assert!(!dp.can_invoke_resource(&subject(&["guest"]), BUNDLE));
}

#[test]
fn test_resource_check_uses_operation_catalog() {
    let rules = r#"
[tables."jmx.acl.org.example.bundle"]
"start(long)" = "admin"
"getState()" = "viewer"

[operations]
"org.example:type=bundle" = ["start(long)", "getState()"]
"#;
    let dp = decision_point(load_rules_from_str(rules, "inline").unwrap());
    let resource = "org.example:type=bundle";

    assert!(dp.can_invoke_resource(&subject(&["viewer"]), resource));
    assert!(!dp.can_invoke_resource(&subject(&["guest"]), resource));
}

#[test]
fn test_resource_without_operations_uses_default_outcome() {
    let dp = decision_point(PolicySnapshot::new());
    assert!(dp.can_invoke_resource(&Subject::anonymous(), "org.unknown"));

    let strict = decision_point(PolicySnapshot::new()).with_compulsory_roles(vec!["user".into()]);
    assert!(!strict.can_invoke_resource(&Subject::anonymous(), "org.unknown"));
}

// =============================================================================
// Batch
// =============================================================================

#[test]
fn test_batch_rows() {
    let dp = decision_point(management_rules());
    let mut queries = BTreeMap::new();
    queries.insert(
        BUNDLE.to_string(),
        vec!["stop(long)".to_string(), "listBundles".to_string(), "stop(".to_string()],
    );
    queries.insert("org.example:type=service".to_string(), vec![]);
    queries.insert(":broken".to_string(), vec!["op".to_string()]);

    let rows = dp.can_invoke_batch(&subject(&["viewer"]), &queries);

    assert_eq!(
        rows,
        vec![
            BatchRow {
                resource: ":broken".to_string(),
                query: Some("op".to_string()),
                allowed: false,
            },
            BatchRow {
                resource: BUNDLE.to_string(),
                query: Some("stop(long)".to_string()),
                allowed: false,
            },
            BatchRow {
                resource: BUNDLE.to_string(),
                query: Some("listBundles".to_string()),
                allowed: true,
            },
            BatchRow {
                resource: BUNDLE.to_string(),
                query: Some("stop(".to_string()),
                allowed: false,
            },
            BatchRow {
                resource: "org.example:type=service".to_string(),
                query: None,
                allowed: false,
            },
        ]
    );
}

#[test]
fn test_batch_row_serialization() {
    let row = BatchRow {
        resource: "org.example".to_string(),
        query: None,
        allowed: true,
    };
    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(json["resource"], "org.example");
    assert!(json["query"].is_null());
    assert_eq!(json["allowed"], true);
}

// =============================================================================
// Snapshots
// =============================================================================

/// Hands out a new generation on every call; even generations require
/// `admin`, odd ones `viewer`
#[derive(Default)]
struct GenerationalSource {
    calls: AtomicUsize,
}

impl GenerationalSource {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RuleSource for GenerationalSource {
    fn snapshot(&self) -> Arc<PolicySnapshot> {
        let generation = self.calls.fetch_add(1, Ordering::SeqCst);
        let roles = if generation % 2 == 0 { "admin" } else { "viewer" };
        let table = RuleTable::from_pairs([
            ("stop", roles),
            ("stop(long)", roles),
            ("list*", roles),
        ]);
        Arc::new(PolicySnapshot::new().with_table("jmx.acl", table))
    }
}

#[test]
fn test_each_decision_reads_one_snapshot() {
    let source = Arc::new(GenerationalSource::default());
    let dp = DecisionPoint::new("management", "jmx.acl", source.clone());
    let admin = subject(&["admin"]);
    let stop = Invocation::new("stop").with_signature(&["long"]);

    let found = dp.required_roles(BUNDLE, &stop).unwrap().unwrap();
    assert_eq!(found.roles, vec!["admin"]);
    assert_eq!(source.calls(), 1);

    let found = dp.required_roles(BUNDLE, &stop).unwrap().unwrap();
    assert_eq!(found.roles, vec!["viewer"]);
    assert_eq!(source.calls(), 2);

    dp.can_invoke(&admin, BUNDLE, &stop);
    assert_eq!(source.calls(), 3);

    dp.can_invoke_method(&admin, BUNDLE, "stop");
    assert_eq!(source.calls(), 4);

    dp.can_invoke_resource(&admin, BUNDLE);
    assert_eq!(source.calls(), 5);

    let mut queries = BTreeMap::new();
    queries.insert(BUNDLE.to_string(), vec!["stop".to_string(), "list".to_string()]);
    queries.insert("org.example".to_string(), vec![]);
    let rows = dp.can_invoke_batch(&admin, &queries);
    assert_eq!(rows.len(), 3);
    assert_eq!(source.calls(), 8);
}

#[test]
fn test_resource_check_answers_from_one_generation() {
    let source = Arc::new(GenerationalSource::default());
    let dp = DecisionPoint::new("management", "jmx.acl", source.clone());

    // Generation 0 requires admin everywhere; a viewer must not be let in by
    // rules of generation 1
    assert!(!dp.can_invoke_resource(&subject(&["viewer"]), BUNDLE));
    assert_eq!(source.calls(), 1);
    // Generation 1 requires viewer everywhere
    assert!(dp.can_invoke_resource(&subject(&["viewer"]), BUNDLE));
    assert_eq!(source.calls(), 2);
}

// =============================================================================
// Adapter seam
// =============================================================================

struct CommandAdapter<G: InvocationGuard> {
    guard: G,
}

impl<G: InvocationGuard> CommandAdapter<G> {
    fn run(&self, caller: &Subject, command: &str, args: &[&str]) -> Result<(), String> {
        let invocation = Invocation::new("execute").with_args(args);
        let resource = format!("shell:command={}", command);
        if self.guard.can_invoke(caller, &resource, &invocation) {
            Ok(())
        } else {
            Err(format!("{} denied", command))
        }
    }
}

#[test]
fn test_guard_used_by_adapter() {
    let snapshot = PolicySnapshot::new().with_table(
        "shell.shell.restart",
        RuleTable::from_pairs([(r#"execute["now"]"#, "admin"), ("execute", "operator")]),
    );
    let adapter = CommandAdapter {
        guard: DecisionPoint::new("shell", "shell", Arc::new(StaticRuleSource::new(snapshot))),
    };

    assert!(adapter.run(&subject(&["operator"]), "restart", &["later"]).is_ok());
    assert!(adapter.run(&subject(&["operator"]), "restart", &["now"]).is_err());
    assert!(adapter.run(&subject(&["admin"]), "restart", &["now"]).is_ok());
    assert!(adapter.run(&Subject::anonymous(), "status", &[]).is_ok());
}
