use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use super::base::{self, DatasetSink, StorageError, HEADER};
use crate::core::types::{Price, ProductRecord};
use crate::stats::RunSummary;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Product URL")]
    url: String,
    #[serde(rename = "EAN", default)]
    ean: Option<String>,
    #[serde(rename = "Price", default)]
    price: Option<String>,
}

/// Tabular dataset file with one header row and one row per product.
/// The run summary is written next to it as `<stem>.summary.json`.
#[derive(Debug, Clone)]
pub struct CsvStorage {
    path: PathBuf,
}

impl CsvStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary_path(&self) -> PathBuf {
        base::summary_path(&self.path)
    }

    /// Writes `records` in iteration order, replacing any existing file.
    pub fn write_records(&self, records: &[ProductRecord]) -> Result<(), StorageError> {
        base::create_parent_dir(&self.path)?;

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(HEADER)?;
        for record in records {
            let price = record.price.map(|p| p.to_string()).unwrap_or_default();
            writer.write_record([
                record.url.as_str(),
                record.code.as_deref().unwrap_or(""),
                price.as_str(),
            ])?;
        }
        writer.flush()?;

        debug!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Reads the file back. Blank codes and unparseable prices come back as
    /// missing; codes are kept verbatim, leading zeros included.
    pub fn load(&self) -> Result<Vec<ProductRecord>, StorageError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();

        for row in reader.deserialize::<CsvRow>() {
            let row = row?;
            let url = Url::parse(row.url.trim()).map_err(|e| {
                StorageError::SerializationError(format!("invalid product URL {}: {}", row.url, e))
            })?;
            let code = row
                .ean
                .map(|ean| ean.trim().to_string())
                .filter(|ean| !ean.is_empty());
            let price = row
                .price
                .and_then(|price| price.trim().parse::<f64>().ok())
                .map(Price::new);
            records.push(ProductRecord::new(url, code, price));
        }

        Ok(records)
    }
}

#[async_trait]
impl DatasetSink for CsvStorage {
    async fn save(
        &self,
        records: &[ProductRecord],
        summary: &RunSummary,
    ) -> Result<(), StorageError> {
        self.write_records(records)?;
        base::write_summary(&self.path, summary)?;
        info!("Saved {} products to {}", records.len(), self.path.display());
        Ok(())
    }
}
