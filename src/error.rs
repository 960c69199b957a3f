use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the data source that feeds the pipeline.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("failed to read cached observations from {path}")]
    Cache {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("live source query failed")]
    Database(#[from] sqlx::Error),

    #[error("no data source available: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("validation failed for record {row}: {reason}")]
    Validation { row: usize, reason: String },

    #[error("integrity violation at {date}: {reason}")]
    Integrity { date: NaiveDate, reason: String },

    #[error(transparent)]
    Ingestion(#[from] IngestionError),
}
