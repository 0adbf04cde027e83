//! # Node Descriptions
//!
//! Every relational node describes itself as an `OrderedFields` record: an operator name
//! plus an ordered list of `key=value` items. The record is a value, so callers can
//! inspect individual items in tests and tooling instead of parsing explain text.
//!
//! The same record feeds two renderings:
//! - `Display` (`HashAggregate(group={0}, aggs=[COUNT(), SUM($2)])`) used by `Rel::explain`;
//! - `digest_with_inputs`, which prefixes the items with each input's structural
//!   fingerprint so the digest identifies the node within its tree.

use std::fmt;

/// Structured description of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedFields {
    op: String,
    items: Vec<(String, String)>,
}

impl OrderedFields {
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            items: Vec::new(),
        }
    }

    pub fn item(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.items.push((key.into(), value.to_string()));
        self
    }

    pub fn item_if(self, key: impl Into<String>, value: impl fmt::Display, condition: bool) -> Self {
        if condition {
            self.item(key, value)
        } else {
            self
        }
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn items(&self) -> &[(String, String)] {
        &self.items
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `Op(input=#<hex>, ..., key=value, ...)`.
    pub fn digest_with_inputs(&self, input_fingerprints: &[u64]) -> String {
        let mut parts: Vec<String> = input_fingerprints
            .iter()
            .map(|fp| format!("input=#{:016x}", fp))
            .collect();
        parts.extend(self.items.iter().map(|(k, v)| format!("{}={}", k, v)));
        format!("{}({})", self.op, parts.join(", "))
    }
}

impl fmt::Display for OrderedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if self.items.is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        for (i, (k, v)) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, ")")
    }
}

/// Join displayable values as `[a, b, c]`.
pub(crate) fn bracketed<T: fmt::Display>(values: &[T]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
