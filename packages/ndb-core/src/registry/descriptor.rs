//! Descriptor line recognition and tokenization.
//!
//! A record describes a device when its first line starts with `sys=`. That
//! line is a run of whitespace separated `key=value` tokens. There is no
//! quoting, so values can contain neither whitespace nor `=`.

use std::collections::BTreeMap;

/// First-line prefix that marks a device descriptor
pub const DESCRIPTOR_PREFIX: &str = "sys=";

/// Outcome of parsing one content record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// Descriptor line with every well-formed token on it
    Recognized(BTreeMap<String, String>),
    /// Not a descriptor; not an error
    Unrecognized,
}

impl Descriptor {
    pub fn fields(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Descriptor::Recognized(fields) => Some(fields),
            Descriptor::Unrecognized => None,
        }
    }
}

/// Parse the first line of `content`.
pub fn parse(content: &str) -> Descriptor {
    let first_line = content.split('\n').next().unwrap_or(content);
    if !first_line.starts_with(DESCRIPTOR_PREFIX) {
        return Descriptor::Unrecognized;
    }
    Descriptor::Recognized(tokenize(first_line))
}

/// Split a line into `key=value` pairs, dropping malformed tokens.
///
/// A later token overrides an earlier one with the same key.
pub fn tokenize(line: &str) -> BTreeMap<String, String> {
    line.split_whitespace()
        .filter_map(split_token)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn split_token(token: &str) -> Option<(&str, &str)> {
    match token.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.contains('=') => Some((key, value)),
        _ => {
            tracing::trace!("Dropping malformed token {:?}", token);
            None
        }
    }
}
