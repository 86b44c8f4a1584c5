//! Access control types
//!
//! Core types used by the resolution algorithm and the decision point.

use crate::access_control::key::{KeyForm, RuleKey, normalize_key};
use crate::error::{QueryError, ResourceError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A protected call as seen by an adapter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    /// Method (operation) name
    pub method: String,
    /// Formal parameter types; `None` means unknown
    pub signature: Option<Vec<String>>,
    /// String forms of the actual arguments; `None` means unknown
    pub args: Option<Vec<String>>,
}

impl Invocation {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            signature: None,
            args: None,
        }
    }

    /// Set the formal signature. Whitespace in type names is dropped to match
    /// the normalized rule keys.
    pub fn with_signature<S: AsRef<str>>(mut self, types: &[S]) -> Self {
        self.signature = Some(
            types
                .iter()
                .map(|ty| ty.as_ref().chars().filter(|c| !c.is_whitespace()).collect())
                .collect(),
        );
        self
    }

    /// Set the actual arguments by their string forms
    pub fn with_args<S: ToString>(mut self, args: &[S]) -> Self {
        self.args = Some(args.iter().map(ToString::to_string).collect());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method)?;
        if let Some(signature) = &self.signature {
            write!(f, "({})", signature.join(","))?;
        }
        Ok(())
    }
}

/// Rule category that produced a resolution, most specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precedence {
    /// Exact or regex argument rule matched the actual arguments
    Argument,
    /// `name(sig)` rule
    Signature,
    /// Bare `name` rule
    Name,
    /// Arguments unknown; answered from the argument rules without evaluating them
    Advisory,
    /// Longest matching `prefix*` rule
    Wildcard,
}

impl Precedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precedence::Argument => "argument",
            Precedence::Signature => "signature",
            Precedence::Name => "name",
            Precedence::Advisory => "advisory",
            Precedence::Wildcard => "wildcard",
        }
    }
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Roles required by a matched rule.
///
/// An empty role list is a real answer: nobody may invoke the operation.
/// "No rule" is expressed as `Option::None` by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleMatch {
    pub roles: Vec<String>,
    pub precedence: Precedence,
}

impl RoleMatch {
    pub fn new(roles: Vec<String>, precedence: Precedence) -> Self {
        Self { roles, precedence }
    }
}

/// The caller's role set, supplied by the host's authentication layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    roles: HashSet<String>,
}

impl Subject {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// A caller without any role
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the caller holds at least one of `roles`
    pub fn has_any<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }
}

/// Parsed resource identifier: `domain` or `domain:key=value,key=value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    domain: String,
    properties: Vec<(String, String)>,
}

impl ResourceId {
    pub fn parse(raw: &str) -> Result<Self, ResourceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ResourceError::empty());
        }

        let (domain, props) = match raw.split_once(':') {
            Some((domain, props)) => (domain.trim(), Some(props)),
            None => (raw, None),
        };
        if domain.is_empty() {
            return Err(ResourceError::empty_domain(raw));
        }

        let mut properties = Vec::new();
        if let Some(props) = props {
            for prop in props.split(',') {
                let (key, value) = prop
                    .split_once('=')
                    .map(|(k, v)| (k.trim(), v.trim()))
                    .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                    .ok_or_else(|| ResourceError::bad_property(raw, prop.trim()))?;
                if properties.iter().any(|(k, _): &(String, String)| k == key) {
                    return Err(ResourceError::new(
                        raw,
                        format!("property '{}' is given twice", key),
                    ));
                }
                properties.push((key.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            properties,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Name segments: the domain, then the `type` value, then the remaining
    /// property values in written order
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = vec![self.domain.as_str()];
        if let Some(ty) = self.property("type") {
            segments.push(ty);
        }
        segments.extend(
            self.properties
                .iter()
                .filter(|(k, _)| k != "type")
                .map(|(_, v)| v.as_str()),
        );
        segments
    }

    /// Identifier text with properties sorted by key; equal for every
    /// spelling of the same resource
    pub fn canonical(&self) -> String {
        let mut properties: Vec<&(String, String)> = self.properties.iter().collect();
        properties.sort_by(|a, b| a.0.cmp(&b.0));

        let mut canonical = self.domain.clone();
        for (idx, (key, value)) in properties.into_iter().enumerate() {
            canonical.push(if idx == 0 { ':' } else { ',' });
            canonical.push_str(key);
            canonical.push('=');
            canonical.push_str(value);
        }
        canonical
    }

    /// Rule table names to consult, most specific first, ending with `prefix`
    pub fn candidate_tables(&self, prefix: &str) -> Vec<String> {
        let mut names = Vec::new();
        let mut name = prefix.to_string();
        for segment in self.segments() {
            if !name.is_empty() {
                name.push('.');
            }
            name.push_str(segment);
            names.push(name.clone());
        }
        names.reverse();
        names.push(prefix.to_string());
        names
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain)?;
        if !self.properties.is_empty() {
            let props: Vec<String> = self
                .properties
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, ":{}", props.join(","))?;
        }
        Ok(())
    }
}

/// An operation query of the form `method` or `method(t1,t2)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationQuery {
    pub method: String,
    /// `None` for a bare method name: any overload
    pub signature: Option<Vec<String>>,
}

impl OperationQuery {
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let key = RuleKey::parse(&normalize_key(raw));
        match key.form {
            KeyForm::Method => Ok(Self {
                method: key.name,
                signature: None,
            }),
            KeyForm::Signature(signature) => Ok(Self {
                method: key.name,
                signature: Some(signature),
            }),
            KeyForm::Arguments { .. } => {
                Err(QueryError::new(raw, "argument lists are not allowed in queries"))
            }
            KeyForm::Wildcard => Err(QueryError::new(raw, "wildcards are not allowed in queries")),
            KeyForm::Invalid(reason) => Err(QueryError::new(raw, reason)),
        }
    }

    pub fn to_invocation(&self) -> Invocation {
        Invocation {
            method: self.method.clone(),
            signature: self.signature.clone(),
            args: None,
        }
    }
}

impl fmt::Display for OperationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_invocation(), f)
    }
}
