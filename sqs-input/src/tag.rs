//! Routing label resolution

use crate::types::Record;
use serde_json::Value;

/// Where a resolved label came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSource {
    /// Configured fixed tag
    Fixed,
    /// Taken from the record's tag field
    Derived,
}

impl TagSource {
    /// Metric label value
    pub fn as_str(&self) -> &'static str {
        match self {
            TagSource::Fixed => "fixed",
            TagSource::Derived => "derived",
        }
    }
}

/// Derives the routing label for each record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagResolver {
    tag: String,
    tag_key: Option<String>,
}

impl TagResolver {
    /// Create resolver with a fixed tag and optional tag key
    pub fn new(tag: impl Into<String>, tag_key: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            tag_key,
        }
    }

    /// Fixed tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Resolve the label, removing the tag field from the record when present.
    ///
    /// Falls back to the fixed tag when no key is configured, the field is
    /// absent, or the field is `null`.
    pub fn resolve(&self, record: &mut Record) -> String {
        self.resolve_with_source(record).0
    }

    /// Like [`TagResolver::resolve`], also reporting where the label came from
    pub fn resolve_with_source(&self, record: &mut Record) -> (String, TagSource) {
        let derived = self
            .tag_key
            .as_deref()
            .and_then(|key| record.remove(key))
            .and_then(label_of);

        match derived {
            Some(label) => (label, TagSource::Derived),
            None => (self.tag.clone(), TagSource::Fixed),
        }
    }
}

fn label_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
