use async_trait::async_trait;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::types::ProductRecord;
use crate::stats::RunSummary;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage operation failed: {0}")]
    OperationError(String),

    #[error("Serialization failed: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::OperationError(error.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        StorageError::SerializationError(error.to_string())
    }
}

impl From<csv::Error> for StorageError {
    fn from(error: csv::Error) -> Self {
        if error.is_io_error() {
            StorageError::OperationError(error.to_string())
        } else {
            StorageError::SerializationError(error.to_string())
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for StorageError {
    fn from(error: rust_xlsxwriter::XlsxError) -> Self {
        StorageError::SerializationError(error.to_string())
    }
}

impl From<calamine::XlsxError> for StorageError {
    fn from(error: calamine::XlsxError) -> Self {
        match error {
            calamine::XlsxError::Io(e) => StorageError::OperationError(e.to_string()),
            other => StorageError::SerializationError(other.to_string()),
        }
    }
}

/// Column headers of a dataset file, in order.
pub const HEADER: [&str; 3] = ["Product URL", "EAN", "Price"];

/// `<stem>.summary.json` next to the dataset file.
pub fn summary_path(dataset: &Path) -> PathBuf {
    dataset.with_extension("summary.json")
}

pub(crate) fn create_parent_dir(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub(crate) fn write_summary(dataset: &Path, summary: &RunSummary) -> Result<(), StorageError> {
    let path = summary_path(dataset);
    fs::write(&path, serde_json::to_string_pretty(summary)?)?;
    debug!("Wrote run summary to {}", path.display());
    Ok(())
}

/// Destination for the final dataset of a run.
#[async_trait]
pub trait DatasetSink: Send + Sync {
    async fn save(&self, records: &[ProductRecord], summary: &RunSummary)
        -> Result<(), StorageError>;
}
