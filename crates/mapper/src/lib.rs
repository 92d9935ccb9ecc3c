//! kubemap engine: aggregate a YAML stream of Kubernetes-style records into one
//! document keyed by `namespace/name/kind`, then check the result round-trips.

#![forbid(unsafe_code)]

use std::path::Path;

use kubemap_core::{MapError, MapperConfig, Mode};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub mod aggregate;
pub mod stream;
pub mod verify;

pub use aggregate::{aggregate, AggregateStats, Aggregated, Aggregator};
pub use stream::StreamError;
pub use verify::{flatten_document, verify, verify_files, verify_records, VerifyError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of one conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertReport {
    pub source: String,
    pub destination: String,
    #[serde(flatten)]
    pub mode: Mode,
    #[serde(flatten)]
    pub stats: AggregateStats,
    pub verified: bool,
}

/// Read `source`, aggregate it, write `destination` and (if enabled) verify the written file.
///
/// The destination is written before verification runs; a failed check leaves it in place.
pub fn convert(source: &Path, destination: &Path, config: &MapperConfig) -> Result<ConvertReport> {
    config.validate()?;
    let records = stream::read_records(source, Some(config.max_input_bytes))?;
    info!(source = %source.display(), records = records.len(), nested = config.mode.is_nested(), "aggregating records");

    let (aggregated, stats) = aggregate(records, &config.mode, config.duplicates)?;
    if stats.overwritten > 0 {
        warn!(overwritten = stats.overwritten, "some records were replaced by later records with the same key");
    }
    stream::write_document(destination, &aggregated)?;
    info!(destination = %destination.display(), entries = stats.entries, "wrote aggregated document");

    if config.verify {
        verify_files(source, destination, &config.mode)?;
    }

    Ok(ConvertReport {
        source: source.display().to_string(),
        destination: destination.display().to_string(),
        mode: config.mode.clone(),
        stats,
        verified: config.verify,
    })
}
