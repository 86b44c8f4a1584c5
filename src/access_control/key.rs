//! Rule key normalization and classification
//!
//! Rule keys follow a small grammar:
//!
//! ```text
//! name                      bare method rule
//! name(t1,t2)               signature-qualified rule
//! name["lit1","lit2"]       exact argument literals
//! name(t1,t2)[/re1/,/re2/]  regex argument matchers (signature optional)
//! prefix*                   method-name wildcard
//! ```
//!
//! Whitespace is insignificant except inside `"..."` and `/.../` spans in
//! an argument list.

use crate::access_control::matcher::Matcher;

/// Remove insignificant whitespace from a raw rule key.
///
/// A `"` or `/` directly after `[` or `,` (ignoring whitespace) opens a
/// literal span, which closes at the next identical delimiter that is
/// followed (again ignoring whitespace) by `,` or `]`. Whitespace inside a
/// span is kept. An unterminated span runs to the end of the key.
pub fn normalize_key(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut normalized = String::with_capacity(raw.len());
    let mut span: Option<char> = None;

    for (idx, &c) in chars.iter().enumerate() {
        match span {
            Some(delim) => {
                normalized.push(c);
                if c == delim && closes_span(&chars[idx + 1..]) {
                    span = None;
                }
            }
            None => {
                if c.is_whitespace() {
                    continue;
                }
                if (c == '"' || c == '/') && matches!(normalized.chars().last(), Some('[' | ','))
                {
                    span = Some(c);
                }
                normalized.push(c);
            }
        }
    }

    normalized
}

fn closes_span(rest: &[char]) -> bool {
    matches!(
        rest.iter().find(|c| !c.is_whitespace()),
        Some(',') | Some(']')
    )
}

/// Shape of a parsed rule key
#[derive(Debug, Clone)]
pub enum KeyForm {
    /// `name`
    Method,
    /// `name(t1,...)`; `name()` has an empty signature
    Signature(Vec<String>),
    /// `name[...]` or `name(sig)[...]`
    Arguments {
        signature: Option<Vec<String>>,
        matchers: Vec<Matcher>,
    },
    /// `prefix*`; the rule key's name holds the prefix
    Wildcard,
    /// Not recognized by the grammar, never matches
    Invalid(String),
}

/// A classified rule key
#[derive(Debug, Clone)]
pub struct RuleKey {
    /// Method name, or the prefix for wildcard keys
    pub name: String,
    pub form: KeyForm,
}

impl RuleKey {
    /// Normalize and classify a raw key
    pub fn parse_raw(raw: &str) -> Self {
        Self::parse(&normalize_key(raw))
    }

    /// Classify an already normalized key
    pub fn parse(key: &str) -> Self {
        let name_end = key.find(['(', '[']).unwrap_or(key.len());
        let name = &key[..name_end];
        let rest = &key[name_end..];

        let form = match Self::classify(name, rest) {
            Ok(form) => form,
            Err(reason) => KeyForm::Invalid(reason),
        };

        let name = match form {
            KeyForm::Wildcard => name.trim_end_matches('*').to_string(),
            _ => name.to_string(),
        };

        Self { name, form }
    }

    fn classify(name: &str, rest: &str) -> Result<KeyForm, String> {
        if name.is_empty() {
            return Err("missing method name".to_string());
        }
        if name.contains([')', ']']) {
            return Err(format!("unexpected bracket in method name '{}'", name));
        }

        let is_wildcard = name.ends_with('*');
        if rest.is_empty() {
            return Ok(if is_wildcard {
                KeyForm::Wildcard
            } else {
                KeyForm::Method
            });
        }
        if is_wildcard {
            return Err("wildcard keys cannot carry a signature or argument list".to_string());
        }

        let (signature, rest) = match rest.strip_prefix('(') {
            Some(after_paren) => {
                let close = after_paren
                    .find(')')
                    .ok_or_else(|| "unclosed signature".to_string())?;
                let signature = parse_signature(&after_paren[..close])?;
                (Some(signature), &after_paren[close + 1..])
            }
            None => (None, rest),
        };

        if rest.is_empty() {
            // Only reachable with a signature, since `rest` was non-empty
            return Ok(KeyForm::Signature(signature.unwrap_or_default()));
        }

        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(|| format!("unexpected text '{}' after method name", rest))?;
        let matchers = parse_matchers(inner)?;

        Ok(KeyForm::Arguments {
            signature,
            matchers,
        })
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self.form, KeyForm::Invalid(_))
    }

    /// Signature this key is qualified with, if any
    pub fn signature(&self) -> Option<&[String]> {
        match &self.form {
            KeyForm::Signature(signature) => Some(signature),
            KeyForm::Arguments {
                signature: Some(signature),
                ..
            } => Some(signature),
            _ => None,
        }
    }
}

fn parse_signature(raw: &str) -> Result<Vec<String>, String> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|ty| {
            if ty.is_empty() {
                Err(format!("empty type in signature '({})'", raw))
            } else {
                Ok(ty.to_string())
            }
        })
        .collect()
}

/// Split an argument list body into matchers.
///
/// Elements are `"literal"` or `/regex/`; an element ends at its delimiter
/// when that is followed by `,` or the end of the list.
fn parse_matchers(inner: &str) -> Result<Vec<Matcher>, String> {
    let mut matchers = Vec::new();
    if inner.is_empty() {
        return Ok(matchers);
    }

    let bytes = inner.as_bytes();
    let mut list_delim: Option<u8> = None;
    let mut start = 0;

    loop {
        let delim = bytes[start];
        if delim != b'"' && delim != b'/' {
            return Err(format!(
                "argument {} must be a \"literal\" or a /regex/",
                matchers.len() + 1
            ));
        }
        match list_delim {
            None => list_delim = Some(delim),
            Some(d) if d != delim => {
                return Err("exact literals and regexes cannot be mixed".to_string());
            }
            Some(_) => {}
        }

        let body_start = start + 1;
        let body_end = (body_start..bytes.len())
            .find(|&j| bytes[j] == delim && (j + 1 == bytes.len() || bytes[j + 1] == b','))
            .ok_or_else(|| format!("unterminated argument {}", matchers.len() + 1))?;

        let body = &inner[body_start..body_end];
        matchers.push(if delim == b'"' {
            Matcher::exact(body)
        } else {
            Matcher::regex(body)
        });

        if body_end + 1 == bytes.len() {
            return Ok(matchers);
        }
        start = body_end + 2;
        if start >= bytes.len() {
            return Err("trailing comma in argument list".to_string());
        }
    }
}
