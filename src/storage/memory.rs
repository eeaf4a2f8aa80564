use async_trait::async_trait;
use parking_lot::Mutex;

use super::base::{DatasetSink, StorageError};
use crate::core::types::ProductRecord;
use crate::stats::RunSummary;

/// Keeps every saved dataset in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    saved: Mutex<Vec<(Vec<ProductRecord>, RunSummary)>>,
    fail_with: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every save fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn saved(&self) -> Vec<(Vec<ProductRecord>, RunSummary)> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl DatasetSink for MemoryStorage {
    async fn save(
        &self,
        records: &[ProductRecord],
        summary: &RunSummary,
    ) -> Result<(), StorageError> {
        if let Some(message) = &self.fail_with {
            return Err(StorageError::OperationError(message.clone()));
        }
        self.saved.lock().push((records.to_vec(), summary.clone()));
        Ok(())
    }
}
