//! kubemap core types: records, path keys, aggregation modes and errors.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod key;

pub use key::{kind_of, name_of, namespace_of, value_kind, Triple};

/// One input document. Mapping equality is order-independent.
pub type Record = serde_yaml::Value;

/// Namespace used when a record's metadata carries none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Separator used to join triple components in flat mode.
pub const DEFAULT_SEPARATOR: &str = ".";

/// Default cap on the source file size (64 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 64 * 1024 * 1024;

pub mod prelude {
    pub use super::{
        DuplicatePolicy, FieldError, MapError, MapperConfig, Mode, Record, Triple,
        DEFAULT_MAX_INPUT_BYTES, DEFAULT_NAMESPACE, DEFAULT_SEPARATOR,
    };
}

/// Shape of the aggregated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Mode {
    /// `namespace<sep>name<sep>kind` string keys, one level deep.
    Flat { separator: String },
    /// namespace → name → kind, three mapping levels.
    Nested,
}

impl Mode {
    pub fn flat(separator: impl Into<String>) -> Self {
        Mode::Flat { separator: separator.into() }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Mode::Nested)
    }

    pub fn separator(&self) -> Option<&str> {
        match self {
            Mode::Flat { separator } => Some(separator),
            Mode::Nested => None,
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::flat(DEFAULT_SEPARATOR)
    }
}

/// What the aggregator does when a triple shows up twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Later record replaces the earlier one (last-write-wins).
    #[default]
    Overwrite,
    /// Fail aggregation on the first repeated triple.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    pub mode: Mode,
    pub duplicates: DuplicatePolicy,
    /// Re-read and check the written document after conversion.
    pub verify: bool,
    /// Sources larger than this are refused before parsing.
    pub max_input_bytes: u64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            duplicates: DuplicatePolicy::default(),
            verify: true,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl MapperConfig {
    pub fn validate(&self) -> Result<(), MapError> {
        match &self.mode {
            Mode::Flat { separator } if separator.is_empty() => Err(MapError::EmptySeparator),
            _ => Ok(()),
        }
    }
}

/// Problem with a single field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{field}` must be {expected}, found {found}")]
    Invalid { field: &'static str, expected: &'static str, found: &'static str },
}

impl FieldError {
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Missing(f) => f,
            FieldError::Invalid { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// Record `index` (0-based position in the input stream) is malformed.
    #[error("record #{index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: FieldError,
    },
    #[error("duplicate key {triple}: record #{second} repeats record #{first}")]
    DuplicateTriple { triple: Triple, first: usize, second: usize },
    #[error("flat mode separator must not be empty")]
    EmptySeparator,
}

impl MapError {
    pub fn record(index: usize, source: FieldError) -> Self {
        Self::Record { index, source }
    }

    /// True for a record lacking `metadata`, `metadata.name` or `kind`.
    pub fn is_missing_field(&self) -> bool {
        matches!(self, MapError::Record { source: FieldError::Missing(_), .. })
    }
}
