//! Loose key/value parser for the `kwargs` option of `junos_rpc`.
//!
//! Users write RPC arguments either Ansible-style as comma-separated
//! `key=value` pairs or as a brace-delimited map literal:
//!
//! ```text
//! interface_name=em0,media=True
//! {interface_name:em0,media:True}
//! {interface_name: "em0", media: true}
//! ```
//!
//! Both yield `{interface_name: "em0", media: true}`. The parser is best
//! effort: there is no escaping, nesting or numeric coercion, and anything it
//! cannot match is dropped rather than reported.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Selects the map-literal form: any `{...}` section in the input
static BRACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("Invalid brace regex"));

/// `key:value` inside a map literal, value optionally quoted
static BRACE_PAIR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\w-]+)\s*:\s*['"]?([\w.-]+)['"]?"#).expect("Invalid brace pair regex")
});

/// One `key=value` segment of the comma-separated form
static EQUALS_PAIR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([\w-]+)\s*=\s*([\w./-]+)\s*$").expect("Invalid key=value regex")
});

/// A single parsed argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KwargValue {
    /// Boolean flag (`True`, `true`, `False`, `false`)
    Bool(bool),
    /// Anything else, kept verbatim
    Str(String),
}

impl KwargValue {
    /// Coerce a raw token. Only the four literal spellings become booleans.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "True" | "true" => KwargValue::Bool(true),
            "False" | "false" => KwargValue::Bool(false),
            other => KwargValue::Str(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KwargValue::Str(s) => Some(s),
            KwargValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KwargValue::Bool(b) => Some(*b),
            KwargValue::Str(_) => None,
        }
    }
}

impl fmt::Display for KwargValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KwargValue::Bool(b) => write!(f, "{}", b),
            KwargValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for KwargValue {
    fn from(s: &str) -> Self {
        KwargValue::Str(s.to_string())
    }
}

impl From<String> for KwargValue {
    fn from(s: String) -> Self {
        KwargValue::Str(s)
    }
}

impl From<bool> for KwargValue {
    fn from(b: bool) -> Self {
        KwargValue::Bool(b)
    }
}

/// Parsed arguments, in input order. A repeated key keeps its last value.
pub type KwargsMap = IndexMap<String, KwargValue>;

/// Parse a raw `kwargs` string into a key/value map.
///
/// `None` yields an empty map. Input containing a `{...}` section is read as
/// a map literal, anything else as comma-separated `key=value` pairs (where
/// values may also contain `/`, e.g. `interface_name=ge-0/0/0.0`).
pub fn parse_kwargs(raw: Option<&str>) -> KwargsMap {
    let mut kwargs = KwargsMap::new();
    let raw = match raw {
        Some(raw) => raw,
        None => return kwargs,
    };

    if BRACE_REGEX.is_match(raw) {
        for caps in BRACE_PAIR_REGEX.captures_iter(raw) {
            kwargs.insert(caps[1].to_string(), KwargValue::coerce(&caps[2]));
        }
    } else {
        for segment in raw.split(',') {
            if let Some(caps) = EQUALS_PAIR_REGEX.captures(segment) {
                kwargs.insert(caps[1].to_string(), KwargValue::coerce(&caps[2]));
            }
        }
    }

    if kwargs.is_empty() && !raw.trim().is_empty() {
        debug!(kwargs = %raw, "kwargs string produced no key/value pairs");
    }

    kwargs
}
