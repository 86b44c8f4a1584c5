//! Role list parsing
//!
//! Rule values are comma-separated role names with an optional trailing
//! comment, e.g. `admin, manager # operators only`.

/// Parse a raw role string into an ordered list of role names.
///
/// Everything from the first `#` onwards is a comment. The remainder is
/// split on `,`, each piece trimmed, and empty pieces dropped. Order and
/// duplicates are preserved.
pub fn parse_roles(raw: &str) -> Vec<String> {
    let without_comment = match raw.find('#') {
        Some(idx) => &raw[..idx],
        None => raw,
    };

    without_comment
        .split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(String::from)
        .collect()
}

/// Parse role entries that arrive already split (e.g. a TOML array).
///
/// Each entry goes through [`parse_roles`], so `"admin # legacy"` or
/// `"a, b"` inside an array behave the same as in a plain string value.
pub fn parse_role_entries<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|entry| parse_roles(entry.as_ref()))
        .collect()
}

/// Append roles not already present, keeping first-occurrence order.
pub(crate) fn union_into(target: &mut Vec<String>, roles: &[String]) {
    for role in roles {
        if !target.contains(role) {
            target.push(role.clone());
        }
    }
}
