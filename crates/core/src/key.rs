//! Path keys derived from records.
//!
//! A record is keyed by `(namespace, name, kind)`:
//! - `namespace` comes from `metadata.namespace`, falling back to `"default"`
//! - `name` comes from `metadata.name` and is required
//! - `kind` comes from the top-level `kind` and is required
//!
//! The kind is never interpreted; it is only a key component.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::{FieldError, Record, DEFAULT_NAMESPACE};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub namespace: String,
    pub name: String,
    pub kind: String,
}

impl Triple {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into(), kind: kind.into() }
    }

    pub fn from_record(record: &Record) -> Result<Self, FieldError> {
        Ok(Self {
            namespace: namespace_of(record)?,
            name: name_of(record)?,
            kind: kind_of(record)?,
        })
    }

    /// Flat-mode key: components joined by `separator`.
    pub fn path(&self, separator: &str) -> String {
        [self.namespace.as_str(), self.name.as_str(), self.kind.as_str()].join(separator)
    }

    /// Inverse of [`Triple::path`]. Only succeeds when `path` splits into exactly three parts.
    pub fn split_path(path: &str, separator: &str) -> Option<Self> {
        if separator.is_empty() {
            return None;
        }
        let parts: Vec<&str> = path.split(separator).collect();
        match parts.as_slice() {
            [namespace, name, kind] => Some(Self::new(*namespace, *name, *kind)),
            _ => None,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.kind)
    }
}

pub fn namespace_of(record: &Record) -> Result<String, FieldError> {
    match metadata(record)?.get("namespace") {
        Some(v) => scalar_text(v, "metadata.namespace"),
        None => Ok(DEFAULT_NAMESPACE.to_string()),
    }
}

pub fn name_of(record: &Record) -> Result<String, FieldError> {
    let v = metadata(record)?.get("name").ok_or(FieldError::Missing("metadata.name"))?;
    scalar_text(v, "metadata.name")
}

pub fn kind_of(record: &Record) -> Result<String, FieldError> {
    let v = record.get("kind").ok_or(FieldError::Missing("kind"))?;
    scalar_text(v, "kind")
}

fn metadata(record: &Record) -> Result<&Mapping, FieldError> {
    match record.get("metadata") {
        Some(Value::Mapping(m)) => Ok(m),
        Some(other) => Err(FieldError::Invalid { field: "metadata", expected: "a mapping", found: value_kind(other) }),
        None => Err(FieldError::Missing("metadata")),
    }
}

// Numbers and bools are accepted and rendered the way YAML prints them.
fn scalar_text(v: &Value, field: &'static str) -> Result<String, FieldError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(FieldError::Invalid { field, expected: "a scalar", found: value_kind(other) }),
    }
}

/// Short description of a value's type, for diagnostics.
pub fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
