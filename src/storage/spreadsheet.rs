use async_trait::async_trait;
use calamine::{open_workbook, Data, Reader, Xlsx};
use log::{debug, info};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use url::Url;

use super::base::{self, DatasetSink, StorageError, HEADER};
use crate::core::types::{Price, ProductRecord};
use crate::stats::RunSummary;

/// Excel workbook with the dataset on its first sheet. Codes are written as
/// text cells so leading zeros survive a round trip through a spreadsheet
/// application.
#[derive(Debug, Clone)]
pub struct XlsxStorage {
    path: PathBuf,
}

impl XlsxStorage {
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

        let mut workbook = Workbook::new();
        let price_format = Format::new().set_num_format("0.00");
        let worksheet = workbook.add_worksheet();

        for (col, title) in HEADER.iter().enumerate() {
            worksheet.write_string(0, col as u16, *title)?;
        }
        for (index, record) in records.iter().enumerate() {
            let row = index as u32 + 1;
            worksheet.write_string(row, 0, record.url.as_str())?;
            if let Some(code) = &record.code {
                worksheet.write_string(row, 1, code)?;
            }
            if let Some(price) = record.price {
                worksheet.write_number_with_format(row, 2, price.value(), &price_format)?;
            }
        }

        workbook.save(&self.path)?;
        debug!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Reads the first sheet back. Columns are located by their header, so
    /// reordered or extra columns are fine. Numeric code cells are turned
    /// back into digit strings.
    pub fn load(&self) -> Result<Vec<ProductRecord>, StorageError> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let range = workbook.worksheet_range_at(0).ok_or_else(|| {
            StorageError::SerializationError(format!(
                "{} contains no worksheet",
                self.path.display()
            ))
        })??;

        let mut rows = range.rows();
        let header = rows.next().unwrap_or_default();
        let column = |title: &str| {
            header
                .iter()
                .position(|cell| cell_text(cell).as_deref() == Some(title))
        };
        let url_col = column(HEADER[0]).ok_or_else(|| {
            StorageError::SerializationError(format!(
                "{} has no \"{}\" column",
                self.path.display(),
                HEADER[0]
            ))
        })?;
        let code_col = column(HEADER[1]);
        let price_col = column(HEADER[2]);

        let mut records = Vec::new();
        for row in rows {
            let Some(raw_url) = row.get(url_col).and_then(cell_text) else {
                continue;
            };
            let url = Url::parse(&raw_url).map_err(|e| {
                StorageError::SerializationError(format!("invalid product URL {}: {}", raw_url, e))
            })?;
            let code = code_col.and_then(|col| row.get(col)).and_then(cell_text);
            let price = price_col
                .and_then(|col| row.get(col))
                .and_then(cell_number)
                .map(Price::new);
            records.push(ProductRecord::new(url, code, price));
        }

        Ok(records)
    }
}

/// Trimmed, non-blank text of a cell. Whole floats lose their `.0` so codes
/// stored as numbers read back as digits.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{:.0}", f),
        Data::Float(f) => f.to_string(),
        _ => return None,
    };
    Some(text).filter(|text| !text.is_empty())
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl DatasetSink for XlsxStorage {
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
