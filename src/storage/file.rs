use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::base::{DatasetSink, StorageError};
use super::spreadsheet::XlsxStorage;
use super::tabular::CsvStorage;
use crate::core::types::ProductRecord;
use crate::stats::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    /// `.csv` files are plain text, everything else is written as a workbook.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => FileFormat::Csv,
            _ => FileFormat::Xlsx,
        }
    }
}

/// Dataset file whose format follows its extension.
#[derive(Debug, Clone)]
pub enum DatasetFile {
    Csv(CsvStorage),
    Xlsx(XlsxStorage),
}

impl DatasetFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match FileFormat::from_path(path) {
            FileFormat::Csv => DatasetFile::Csv(CsvStorage::new(path)),
            FileFormat::Xlsx => DatasetFile::Xlsx(XlsxStorage::new(path)),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DatasetFile::Csv(storage) => storage.path(),
            DatasetFile::Xlsx(storage) => storage.path(),
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        match self {
            DatasetFile::Csv(storage) => storage.summary_path(),
            DatasetFile::Xlsx(storage) => storage.summary_path(),
        }
    }

    pub fn load(&self) -> Result<Vec<ProductRecord>, StorageError> {
        match self {
            DatasetFile::Csv(storage) => storage.load(),
            DatasetFile::Xlsx(storage) => storage.load(),
        }
    }

    pub fn write_records(&self, records: &[ProductRecord]) -> Result<(), StorageError> {
        match self {
            DatasetFile::Csv(storage) => storage.write_records(records),
            DatasetFile::Xlsx(storage) => storage.write_records(records),
        }
    }
}

#[async_trait]
impl DatasetSink for DatasetFile {
    async fn save(
        &self,
        records: &[ProductRecord],
        summary: &RunSummary,
    ) -> Result<(), StorageError> {
        match self {
            DatasetFile::Csv(storage) => storage.save(records, summary).await,
            DatasetFile::Xlsx(storage) => storage.save(records, summary).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Price;
    use tempfile::TempDir;
    use url::Url;

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(FileFormat::from_path(Path::new("out/a.csv")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("out/a.CSV")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("out/a.xlsx")), FileFormat::Xlsx);
        assert_eq!(FileFormat::from_path(Path::new("out/a")), FileFormat::Xlsx);
    }

    #[test]
    fn test_open_round_trips_both_formats() {
        let dir = TempDir::new().unwrap();
        let records = vec![ProductRecord::new(
            Url::parse("https://www.bol.com/nl/nl/p/a/1/").unwrap(),
            Some("00012345".to_string()),
            Some(Price::new(3.25)),
        )];

        for name in ["products.csv", "products.xlsx"] {
            let file = DatasetFile::open(dir.path().join(name));
            file.write_records(&records).unwrap();
            assert_eq!(file.load().unwrap(), records, "{}", name);
        }

        let csv = std::fs::read_to_string(dir.path().join("products.csv")).unwrap();
        assert!(csv.contains(",00012345,3.25"));
    }
}
