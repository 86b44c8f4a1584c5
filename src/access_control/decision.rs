//! Decision point
//!
//! The per-domain facade adapters call into. A decision point is built
//! once and handed to every adapter that needs it; there is no global
//! instance.
//!
//! Resource identifiers are mapped to an ordered list of candidate rule
//! tables (most specific first, see [`ResourceId::candidate_tables`]). The
//! first table that has a rule for the invocation decides.

use crate::access_control::key::KeyForm;
use crate::access_control::resolver::resolve;
use crate::access_control::source::{PolicySnapshot, RuleSource};
use crate::access_control::types::{Invocation, OperationQuery, ResourceId, RoleMatch, Subject};
use crate::error::ResourceError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// The one question enforcement adapters ask
pub trait InvocationGuard: Send + Sync {
    /// Whether `subject` may perform `invocation` on `resource`.
    ///
    /// Implementations fail closed on anything they cannot evaluate.
    fn can_invoke(&self, subject: &Subject, resource: &str, invocation: &Invocation) -> bool;
}

/// One row of a batch check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRow {
    pub resource: String,
    /// `None` for a resource-level check
    pub query: Option<String>,
    pub allowed: bool,
}

/// Authorization decision point for one resource domain
pub struct DecisionPoint {
    domain: String,
    prefix: String,
    compulsory_roles: Vec<String>,
    source: Arc<dyn RuleSource>,
}

impl DecisionPoint {
    /// Create a decision point; `prefix` names the domain's root table and
    /// prefixes every other table name
    pub fn new(
        domain: impl Into<String>,
        prefix: impl Into<String>,
        source: Arc<dyn RuleSource>,
    ) -> Self {
        Self {
            domain: domain.into(),
            prefix: prefix.into(),
            compulsory_roles: Vec::new(),
            source,
        }
    }

    /// Require one of these roles when no rule matches, instead of allowing
    pub fn with_compulsory_roles(mut self, roles: Vec<String>) -> Self {
        self.compulsory_roles = roles;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn compulsory_roles(&self) -> &[String] {
        &self.compulsory_roles
    }

    /// Current policy snapshot of this domain
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.source.snapshot()
    }

    /// Roles required for an invocation, or `None` if no rule applies
    pub fn required_roles(
        &self,
        resource: &str,
        invocation: &Invocation,
    ) -> Result<Option<RoleMatch>, ResourceError> {
        let id = ResourceId::parse(resource)?;
        let snapshot = self.source.snapshot();
        Ok(self.resolve_in(&snapshot, &id, invocation))
    }

    /// Whether the subject may perform the invocation.
    ///
    /// No matching rule means allowed, unless compulsory roles are set. A
    /// malformed resource identifier always means denied.
    pub fn can_invoke(&self, subject: &Subject, resource: &str, invocation: &Invocation) -> bool {
        match self.required_roles(resource, invocation) {
            Ok(found) => {
                let allowed = self.permits(subject, found.as_ref());
                debug!(
                    domain = %self.domain,
                    resource,
                    operation = %invocation,
                    allowed,
                    "Invocation checked"
                );
                allowed
            }
            Err(e) => {
                warn!(
                    domain = %self.domain,
                    error = %e,
                    "Denying invocation on unresolvable resource"
                );
                false
            }
        }
    }

    /// Whether any overload of `method` is allowed (arguments unknown)
    pub fn can_invoke_method(&self, subject: &Subject, resource: &str, method: &str) -> bool {
        let id = match ResourceId::parse(resource) {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    domain = %self.domain,
                    error = %e,
                    "Denying method check on unresolvable resource"
                );
                return false;
            }
        };
        let snapshot = self.source.snapshot();
        self.method_allowed(&snapshot, &id, subject, method)
    }

    /// Whether at least one operation on the resource is allowed.
    ///
    /// Operations come from the resource's declared catalog, or else from
    /// the rules in its candidate tables. A resource with neither falls
    /// back to the default outcome.
    pub fn can_invoke_resource(&self, subject: &Subject, resource: &str) -> bool {
        let id = match ResourceId::parse(resource) {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    domain = %self.domain,
                    error = %e,
                    "Denying resource check on unresolvable resource"
                );
                return false;
            }
        };
        let snapshot = self.source.snapshot();
        let operations = self.known_operations(&snapshot, &id);

        if operations.is_empty() {
            trace!(resource, "No known operations, using default outcome");
            return self.permits(subject, None);
        }

        operations.iter().any(|op| match op.signature {
            Some(_) => {
                let found = self.resolve_in(&snapshot, &id, &op.to_invocation());
                self.permits(subject, found.as_ref())
            }
            None => self.method_allowed(&snapshot, &id, subject, &op.method),
        })
    }

    /// Evaluate many `(resource, query)` pairs.
    ///
    /// Every pair is evaluated on its own; an empty query list asks for a
    /// resource-level check. Unparseable queries are reported as denied.
    pub fn can_invoke_batch(
        &self,
        subject: &Subject,
        queries: &BTreeMap<String, Vec<String>>,
    ) -> Vec<BatchRow> {
        let mut rows = Vec::new();

        for (resource, operations) in queries {
            if operations.is_empty() {
                rows.push(BatchRow {
                    resource: resource.clone(),
                    query: None,
                    allowed: self.can_invoke_resource(subject, resource),
                });
                continue;
            }

            for raw in operations {
                let allowed = match OperationQuery::parse(raw) {
                    Ok(query) if query.signature.is_some() => {
                        self.can_invoke(subject, resource, &query.to_invocation())
                    }
                    Ok(query) => self.can_invoke_method(subject, resource, &query.method),
                    Err(e) => {
                        warn!(
                            domain = %self.domain,
                            resource = %resource,
                            error = %e,
                            "Denying malformed query"
                        );
                        false
                    }
                };
                rows.push(BatchRow {
                    resource: resource.clone(),
                    query: Some(raw.clone()),
                    allowed,
                });
            }
        }

        rows
    }

    fn resolve_in(
        &self,
        snapshot: &PolicySnapshot,
        id: &ResourceId,
        invocation: &Invocation,
    ) -> Option<RoleMatch> {
        for name in id.candidate_tables(&self.prefix) {
            if let Some(table) = snapshot.table(&name)
                && let Some(found) = resolve(table, invocation)
            {
                trace!(table = %name, roles = ?found.roles, "Rule table decided");
                return Some(found);
            }
        }
        None
    }

    fn permits(&self, subject: &Subject, found: Option<&RoleMatch>) -> bool {
        match found {
            Some(found) => subject.has_any(&found.roles),
            None => self.compulsory_roles.is_empty() || subject.has_any(&self.compulsory_roles),
        }
    }

    fn method_allowed(
        &self,
        snapshot: &PolicySnapshot,
        id: &ResourceId,
        subject: &Subject,
        method: &str,
    ) -> bool {
        self.overloads(snapshot, id, method).iter().any(|invocation| {
            let found = self.resolve_in(snapshot, id, invocation);
            self.permits(subject, found.as_ref())
        })
    }

    /// One invocation per known signature of `method`.
    ///
    /// The signature-less invocation is added when no signature is known,
    /// or when a rule without signature (`name`, `name[...]`, `prefix*`)
    /// also covers the method.
    fn overloads(
        &self,
        snapshot: &PolicySnapshot,
        id: &ResourceId,
        method: &str,
    ) -> Vec<Invocation> {
        let mut signatures: Vec<Vec<String>> = Vec::new();
        let mut unqualified = false;
        let mut add = |signature: &[String]| {
            if !signatures.iter().any(|s| s.as_slice() == signature) {
                signatures.push(signature.to_vec());
            }
        };

        if let Some(operations) = snapshot.operations(id) {
            for op in operations.iter().filter(|op| op.method == method) {
                if let Some(signature) = &op.signature {
                    add(signature);
                }
            }
        }
        for name in id.candidate_tables(&self.prefix) {
            let Some(table) = snapshot.table(&name) else {
                continue;
            };
            for entry in table.valid_entries() {
                match &entry.rule.form {
                    KeyForm::Wildcard => {
                        unqualified |= method.starts_with(entry.rule.name.as_str());
                    }
                    _ if entry.rule.name != method => {}
                    _ => match entry.rule.signature() {
                        Some(signature) => add(signature),
                        None => unqualified = true,
                    },
                }
            }
        }

        let mut invocations = Vec::new();
        if unqualified || signatures.is_empty() {
            invocations.push(Invocation::new(method));
        }
        invocations.extend(signatures.into_iter().map(|signature| Invocation {
            method: method.to_string(),
            signature: Some(signature),
            args: None,
        }));
        invocations
    }

    fn known_operations(&self, snapshot: &PolicySnapshot, id: &ResourceId) -> Vec<OperationQuery> {
        if let Some(operations) = snapshot.operations(id) {
            return operations.to_vec();
        }

        let mut operations: Vec<OperationQuery> = Vec::new();
        for name in id.candidate_tables(&self.prefix) {
            let Some(table) = snapshot.table(&name) else {
                continue;
            };
            for entry in table.valid_entries() {
                let signature = match &entry.rule.form {
                    KeyForm::Signature(signature) => Some(signature.clone()),
                    KeyForm::Arguments { signature, .. } => signature.clone(),
                    _ => None,
                };
                let op = OperationQuery {
                    method: entry.rule.name.clone(),
                    signature,
                };
                if !operations.contains(&op) {
                    operations.push(op);
                }
            }
        }
        operations
    }
}

impl InvocationGuard for DecisionPoint {
    fn can_invoke(&self, subject: &Subject, resource: &str, invocation: &Invocation) -> bool {
        DecisionPoint::can_invoke(self, subject, resource, invocation)
    }
}

impl std::fmt::Debug for DecisionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPoint")
            .field("domain", &self.domain)
            .field("prefix", &self.prefix)
            .field("compulsory_roles", &self.compulsory_roles)
            .finish_non_exhaustive()
    }
}
