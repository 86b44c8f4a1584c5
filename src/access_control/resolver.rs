//! Required-role resolution
//!
//! Implements rule selection with the following precedence (highest to
//! lowest), stopping at the first category that gives an answer:
//! 1. Argument rules qualified by the call's signature (`name(sig)[...]`)
//! 2. Plain signature rule (`name(sig)`)
//! 3. Argument rules without signature (`name[...]`)
//! 4. Bare method rule (`name`)
//! 5. Longest matching method-name wildcard (`prefix*`)
//!
//! Steps 1-2 only run when the signature is known. Exact-literal argument
//! rules win over regex rules; all matching regex rules at one level have
//! their roles unioned.
//!
//! When the actual arguments are unknown (advisory checks), argument rules
//! cannot be evaluated. If a level has argument rules but no plain rule,
//! the union of the argument rules' roles answers for that level.

use crate::access_control::key::KeyForm;
use crate::access_control::matcher::{Matcher, evaluate};
use crate::access_control::roles::union_into;
use crate::access_control::table::{RuleEntry, RuleTable};
use crate::access_control::types::{Invocation, Precedence, RoleMatch};
use tracing::{debug, trace};

/// Resolve the roles required for an invocation.
///
/// Returns `None` when no rule applies, which is different from a rule with
/// an empty role list.
pub fn resolve(table: &RuleTable, invocation: &Invocation) -> Option<RoleMatch> {
    debug!(
        method = %invocation.method,
        signature = ?invocation.signature,
        args_known = invocation.args.is_some(),
        "Resolving required roles"
    );

    // 1-2. Signature-qualified rules
    if let Some(signature) = invocation.signature.as_deref()
        && let Some(found) = resolve_level(table, invocation, Some(signature))
    {
        trace!(precedence = %found.precedence, "Matched signature-level rule");
        return Some(found);
    }

    // 3-4. Rules without signature
    if let Some(found) = resolve_level(table, invocation, None) {
        trace!(precedence = %found.precedence, "Matched name-level rule");
        return Some(found);
    }

    // 5. Wildcards
    if let Some(found) = resolve_wildcard(table, &invocation.method) {
        trace!("Matched wildcard rule");
        return Some(found);
    }

    trace!("No rule found");
    None
}

/// Rules for one method at one signature level
struct LevelRules<'a> {
    plain: Option<&'a RuleEntry>,
    arguments: Vec<(&'a [Matcher], &'a [String])>,
}

impl<'a> LevelRules<'a> {
    fn collect(table: &'a RuleTable, method: &str, level: Option<&[String]>) -> Self {
        let mut rules = LevelRules {
            plain: None,
            arguments: Vec::new(),
        };

        for entry in table.valid_entries().filter(|e| e.rule.name == method) {
            let at_level = match &entry.rule.form {
                KeyForm::Method => level.is_none(),
                KeyForm::Signature(signature) => level == Some(signature.as_slice()),
                KeyForm::Arguments {
                    signature,
                    matchers,
                } => {
                    if signature.as_deref() == level {
                        rules
                            .arguments
                            .push((matchers.as_slice(), entry.roles.as_slice()));
                    }
                    false
                }
                KeyForm::Wildcard | KeyForm::Invalid(_) => false,
            };
            if at_level && rules.plain.is_none() {
                rules.plain = Some(entry);
            }
        }

        rules
    }
}

fn is_exact_list(matchers: &[Matcher]) -> bool {
    !matchers.iter().any(Matcher::is_regex)
}

fn resolve_level(
    table: &RuleTable,
    invocation: &Invocation,
    level: Option<&[String]>,
) -> Option<RoleMatch> {
    let rules = LevelRules::collect(table, &invocation.method, level);

    if let Some(args) = &invocation.args {
        if let Some((_, roles)) = rules
            .arguments
            .iter()
            .find(|(matchers, _)| is_exact_list(matchers) && evaluate(matchers, args))
        {
            return Some(RoleMatch::new(roles.to_vec(), Precedence::Argument));
        }

        let mut union = Vec::new();
        let mut matched = false;
        for (matchers, roles) in &rules.arguments {
            if !is_exact_list(matchers) && evaluate(matchers, args) {
                matched = true;
                union_into(&mut union, roles);
            }
        }
        if matched {
            return Some(RoleMatch::new(union, Precedence::Argument));
        }
    }

    if let Some(entry) = rules.plain {
        let precedence = if level.is_some() {
            Precedence::Signature
        } else {
            Precedence::Name
        };
        return Some(RoleMatch::new(entry.roles.clone(), precedence));
    }

    if invocation.args.is_none() && !rules.arguments.is_empty() {
        let mut accumulated = Vec::new();
        for (_, roles) in &rules.arguments {
            union_into(&mut accumulated, roles);
        }
        return Some(RoleMatch::new(accumulated, Precedence::Advisory));
    }

    None
}

/// Longest `prefix*` rule whose prefix starts the method name; the first
/// one wins among equally long prefixes
fn resolve_wildcard(table: &RuleTable, method: &str) -> Option<RoleMatch> {
    let mut best: Option<&RuleEntry> = None;

    for entry in table.valid_entries() {
        if matches!(entry.rule.form, KeyForm::Wildcard)
            && method.starts_with(entry.rule.name.as_str())
            && best.is_none_or(|b| entry.rule.name.len() > b.rule.name.len())
        {
            best = Some(entry);
        }
    }

    best.map(|entry| RoleMatch::new(entry.roles.clone(), Precedence::Wildcard))
}
