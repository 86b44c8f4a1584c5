//! Argument matching for argument-qualified rules
//!
//! A rule such as `bar(String,int)[/aa/,"42"]` carries one matcher per
//! argument. A matcher list applies to a call only when it has exactly as
//! many entries as the call has arguments.

use regex::Regex;

/// A per-argument test
#[derive(Debug, Clone)]
pub enum Matcher {
    /// The trimmed argument must equal this literal
    Exact(String),
    /// The trimmed argument must fully match this pattern
    Regex(RegexMatcher),
}

/// Compiled, anchored regex matcher
///
/// A pattern that fails to compile is kept so it can be reported, but it
/// never matches anything.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    source: String,
    compiled: Result<Regex, regex::Error>,
}

impl RegexMatcher {
    /// Compile a pattern; the whole argument has to match it
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = Regex::new(&format!("^(?:{})$", source));
        Self { source, compiled }
    }

    /// The pattern as written in the rule key
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compilation error, if the pattern is malformed
    pub fn error(&self) -> Option<&regex::Error> {
        self.compiled.as_ref().err()
    }

    pub fn is_valid(&self) -> bool {
        self.compiled.is_ok()
    }

    pub fn is_match(&self, value: &str) -> bool {
        match &self.compiled {
            Ok(regex) => regex.is_match(value),
            Err(_) => false,
        }
    }
}

impl Matcher {
    pub fn exact(value: impl Into<String>) -> Self {
        Matcher::Exact(value.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Matcher::Regex(RegexMatcher::new(pattern))
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Matcher::Regex(_))
    }

    /// Test a single argument's string form
    pub fn matches(&self, arg: &str) -> bool {
        let arg = arg.trim();
        match self {
            Matcher::Exact(value) => arg == value,
            Matcher::Regex(regex) => regex.is_match(arg),
        }
    }
}

/// Check a matcher list against the actual arguments.
///
/// Returns `false` on arity mismatch; that is not an error, the rule simply
/// does not apply to this call.
pub fn evaluate<S: AsRef<str>>(matchers: &[Matcher], args: &[S]) -> bool {
    matchers.len() == args.len()
        && matchers
            .iter()
            .zip(args)
            .all(|(matcher, arg)| matcher.matches(arg.as_ref()))
}
