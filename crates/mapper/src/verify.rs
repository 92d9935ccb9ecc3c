//! Verifier: checks that an aggregated document still holds exactly the source records.
//!
//! The comparison is a multiset check. Order does not matter, duplicates do.
//! A record collapsed by a key collision shows up as a missing source record.

#![forbid(unsafe_code)]

use std::path::Path;

use kubemap_core::{value_kind, Mode, Record, Triple};
use rustc_hash::FxHashMap;
use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::Aggregated;
use crate::stream;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("destination holds {found} documents, expected exactly 1")]
    DocumentCount { found: usize },
    #[error("`{at}` must be a mapping, found {found}")]
    Shape { at: String, found: &'static str },
    #[error("aggregated record #{position} ({key}) does not match any remaining source record")]
    UnexpectedRecord { position: usize, key: String },
    #[error("{missing} of {total} source records missing from the aggregated document, first is record #{first_index} ({first_key})")]
    MissingRecords { missing: usize, total: usize, first_index: usize, first_key: String },
}

impl VerifyError {
    pub fn is_missing_records(&self) -> bool {
        matches!(self, VerifyError::MissingRecords { .. })
    }
}

fn describe(record: &Record) -> String {
    Triple::from_record(record).map(|t| t.to_string()).unwrap_or_else(|e| format!("unkeyed: {}", e))
}

fn as_mapping<'a>(v: &'a Value, at: impl FnOnce() -> String) -> Result<&'a serde_yaml::Mapping, VerifyError> {
    v.as_mapping().ok_or_else(|| VerifyError::Shape { at: at(), found: value_kind(v) })
}

fn key_text(k: &Value) -> String {
    match k {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other).map(|s| s.trim_end().to_string()).unwrap_or_default(),
    }
}

/// Flatten a re-read aggregated document back into its leaf records.
///
/// Flat mode takes every top-level value. Nested mode walks namespace, name and kind levels
/// in document order.
pub fn flatten_document<'a>(document: &'a Value, mode: &Mode) -> Result<Vec<&'a Record>, VerifyError> {
    let root = as_mapping(document, || "<root>".to_string())?;
    match mode {
        Mode::Flat { .. } => Ok(root.values().collect()),
        Mode::Nested => {
            let mut out = Vec::new();
            for (ns, names) in root {
                let names = as_mapping(names, || key_text(ns))?;
                for (name, kinds) in names {
                    let kinds = as_mapping(kinds, || format!("{}/{}", key_text(ns), key_text(name)))?;
                    out.extend(kinds.values());
                }
            }
            Ok(out)
        }
    }
}

/// Multiset equality between `source` and the `flattened` leaves.
pub fn verify_records<'a, I>(source: &[Record], flattened: I) -> Result<(), VerifyError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut remaining: FxHashMap<&Record, usize> = FxHashMap::default();
    for rec in source {
        *remaining.entry(rec).or_insert(0) += 1;
    }

    let mut consumed = 0usize;
    for (position, rec) in flattened.into_iter().enumerate() {
        match remaining.get_mut(rec) {
            Some(n) if *n > 0 => {
                *n -= 1;
                consumed += 1;
            }
            _ => return Err(VerifyError::UnexpectedRecord { position, key: describe(rec) }),
        }
    }

    let missing = source.len() - consumed;
    if missing > 0 {
        let first_index = source
            .iter()
            .position(|rec| remaining.get(rec).copied().unwrap_or(0) > 0)
            .unwrap_or(0);
        return Err(VerifyError::MissingRecords {
            missing,
            total: source.len(),
            first_index,
            first_key: describe(&source[first_index]),
        });
    }

    debug!(records = consumed, "multiset check passed");
    Ok(())
}

/// Check an in-memory aggregate against its source records.
pub fn verify(source: &[Record], aggregated: &Aggregated) -> Result<(), VerifyError> {
    verify_records(source, aggregated.records())
}

/// Re-read `source` and `destination` from disk and check the destination document.
///
/// No size cap applies here; the source was already admitted when it was first read.
pub fn verify_files(source: &Path, destination: &Path, mode: &Mode) -> crate::Result<()> {
    let records = stream::read_records(source, None)?;
    let documents = stream::read_documents(destination)?;
    if documents.len() != 1 {
        return Err(VerifyError::DocumentCount { found: documents.len() }.into());
    }
    let flattened = flatten_document(&documents[0], mode)?;
    verify_records(&records, flattened)?;
    info!(records = records.len(), destination = %destination.display(), "verified aggregated document");
    Ok(())
}
