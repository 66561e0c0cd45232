//! Resolved label sets
//!
//! A `LabelSet` is the deduplicated view of a series' labels. Its `Display`
//! form is the conventional Prometheus rendering used for family matching:
//! `metric_name{a="1", b="2"}`, labels sorted by name, `__name__` pulled out
//! in front. A set without a name renders as `{a="1"}`, and a set holding
//! only a name renders as the bare name.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::prompb::Label;

/// Reserved label carrying the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Build from wire labels; a repeated name keeps its last value
    pub fn from_labels(labels: &[Label]) -> Self {
        labels
            .iter()
            .map(|l| (l.name.as_str(), l.value.as_str()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of `__name__`, if present
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label set as a JSON object (every label, `__name__` included)
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.metric_name().unwrap_or_default();
        let mut pairs: Vec<String> = self
            .0
            .iter()
            .filter(|(k, _)| *k != METRIC_NAME_LABEL)
            .map(|(k, v)| format!("{}={}", k, QuotedValue(v)))
            .collect();

        if pairs.is_empty() {
            return if self.metric_name().is_some() {
                f.write_str(name)
            } else {
                f.write_str("{}")
            };
        }

        // Rendered pairs are ordered as strings, so `a0="x"` precedes `a="y"`
        pairs.sort_unstable();
        write!(f, "{}{{{}}}", name, pairs.join(", "))
    }
}

/// Double-quoted label value with Prometheus-style escapes
///
/// Control characters below 0x80 become `\xNN`; other unprintable characters
/// become `\uNNNN` or `\UNNNNNNNN`.
struct QuotedValue<'a>(&'a str);

impl fmt::Display for QuotedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\u{07}' => f.write_str("\\a")?,
                '\u{08}' => f.write_str("\\b")?,
                '\u{0C}' => f.write_str("\\f")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                '\u{0B}' => f.write_str("\\v")?,
                c if is_printable(c) => write!(f, "{}", c)?,
                c if (c as u32) < 0x80 => write!(f, "\\x{:02x}", c as u32)?,
                c if (c as u32) < 0x10000 => write!(f, "\\u{:04x}", c as u32)?,
                c => write!(f, "\\U{:08x}", c as u32)?,
            }
        }
        f.write_str("\"")
    }
}

fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !(c.is_control()
        || c.is_whitespace()
        || matches!(
            c,
            '\u{AD}'
                | '\u{200B}'..='\u{200F}'
                | '\u{202A}'..='\u{202E}'
                | '\u{2060}'..='\u{2064}'
                | '\u{FEFF}'
        ))
}
