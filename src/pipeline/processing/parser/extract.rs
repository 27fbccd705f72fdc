//! Field extraction over the loosely-shaped XML tree.
//!
//! Two contracts cover every field in the extract:
//! - scalar text, tolerating the `{text, attributes}` wrapper ([`XmlValue::text`])
//! - lists, tolerating a singleton or an absent element ([`list_of`])
//!
//! Missing optional data never errors; only a structurally wrong record node does.

use super::{XmlNode, XmlValue};
use crate::error::{IngestError, Result};

impl XmlValue {
    /// Text content of the value, preferring the explicit text slot of a wrapped node.
    /// Empty or whitespace-only text reads as absent.
    pub fn text(&self) -> Option<&str> {
        let text = match self {
            XmlValue::Scalar(s) => Some(s.as_str()),
            XmlValue::Node(node) => node.text.as_deref(),
            XmlValue::List(items) => items.first().and_then(|v| v.text()),
        };
        text.map(str::trim).filter(|t| !t.is_empty())
    }

    /// Child element or merged attribute by name.
    /// A singular element that unexpectedly repeats resolves to its first occurrence.
    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        match self {
            XmlValue::Node(node) => node.children.get(key),
            XmlValue::List(items) => items.first().and_then(|v| v.get(key)),
            XmlValue::Scalar(_) => None,
        }
    }

    /// Walks nested children, e.g. `["MainEntity", "NonIndividualName"]`.
    pub fn path(&self, keys: &[&str]) -> Option<&XmlValue> {
        keys.iter().try_fold(self, |value, key| value.get(key))
    }

    /// Shorthand for `path(keys)` followed by `text()`.
    pub fn text_at(&self, keys: &[&str]) -> Option<&str> {
        self.path(keys).and_then(XmlValue::text)
    }

    /// Owned text at `keys`, or an empty string.
    pub fn string_at(&self, keys: &[&str]) -> String {
        self.text_at(keys).map(str::to_string).unwrap_or_default()
    }

    /// Every occurrence of this value: a list yields its items, anything else itself.
    pub fn items(&self) -> Vec<&XmlValue> {
        match self {
            XmlValue::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// The value as an element node. Anything else is not a usable entity record.
    pub fn as_node(&self) -> Result<&XmlNode> {
        match self {
            XmlValue::Node(node) => Ok(node),
            XmlValue::Scalar(s) => Err(IngestError::Parse(format!(
                "expected an element with children, found text {:?}",
                truncate(s, 40)
            ))),
            XmlValue::List(items) => Err(IngestError::Parse(format!(
                "expected a single element, found a list of {}",
                items.len()
            ))),
        }
    }

    /// Compact JSON rendering used as the best-effort fragment in error reports.
    pub fn fragment(&self, max_chars: usize) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        truncate(&json, max_chars).to_string()
    }
}

/// Normalizes an optional repeatable element to a list: absent is empty,
/// a single occurrence is a one-element list.
pub fn list_of(value: Option<&XmlValue>) -> Vec<&XmlValue> {
    value.map(XmlValue::items).unwrap_or_default()
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
