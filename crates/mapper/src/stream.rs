//! YAML document streams in, single YAML document out.

#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use kubemap_core::Record;
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::aggregate::Aggregated;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("reading {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("writing {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },
    #[error("{} is {size} bytes, over the {max} byte input limit", path.display())]
    TooLarge { path: PathBuf, size: u64, max: u64 },
    #[error("decoding YAML document #{index}: {source}")]
    Decode { index: usize, source: serde_yaml::Error },
    #[error("encoding YAML: {0}")]
    Encode(#[source] serde_yaml::Error),
}

/// Decode every document of a YAML stream, empty ones included (as `Null`).
pub fn parse_documents(text: &str) -> Result<Vec<Value>, StreamError> {
    serde_yaml::Deserializer::from_str(text)
        .enumerate()
        .map(|(index, doc)| Value::deserialize(doc).map_err(|source| StreamError::Decode { index, source }))
        .collect()
}

/// Decode a YAML stream into records.
///
/// Null documents (an empty `---` section, `~` or `null`) are skipped with a warning.
pub fn parse_records(text: &str) -> Result<Vec<Record>, StreamError> {
    let mut records = Vec::new();
    for (index, doc) in parse_documents(text)?.into_iter().enumerate() {
        if doc.is_null() {
            warn!(document = index, "skipping null document");
            continue;
        }
        records.push(doc);
    }
    Ok(records)
}

/// Read `path` as text. With `max` set, larger files fail before being read.
fn read_text(path: &Path, max: Option<u64>) -> Result<String, StreamError> {
    if let Some(max) = max {
        let size = fs::metadata(path)
            .map_err(|source| StreamError::Read { path: path.to_path_buf(), source })?
            .len();
        if size > max {
            return Err(StreamError::TooLarge { path: path.to_path_buf(), size, max });
        }
    }
    fs::read_to_string(path).map_err(|source| StreamError::Read { path: path.to_path_buf(), source })
}

/// Read a record stream, refusing files over `max` bytes when a cap is given.
pub fn read_records(path: &Path, max: Option<u64>) -> Result<Vec<Record>, StreamError> {
    let records = parse_records(&read_text(path, max)?)?;
    debug!(path = %path.display(), records = records.len(), "read record stream");
    Ok(records)
}

/// Read every document of `path`. Uncapped: the aggregated output is always
/// larger than the source it came from.
pub fn read_documents(path: &Path) -> Result<Vec<Value>, StreamError> {
    parse_documents(&read_text(path, None)?)
}

pub fn render_document(aggregated: &Aggregated) -> Result<String, StreamError> {
    serde_yaml::to_string(aggregated).map_err(StreamError::Encode)
}

/// Write the aggregated structure as one YAML document, truncating `path`.
pub fn write_document(path: &Path, aggregated: &Aggregated) -> Result<(), StreamError> {
    let text = render_document(aggregated)?;
    fs::write(path, text.as_bytes()).map_err(|source| StreamError::Write { path: path.to_path_buf(), source })?;
    debug!(path = %path.display(), bytes = text.len(), entries = aggregated.len(), "wrote aggregated document");
    Ok(())
}
