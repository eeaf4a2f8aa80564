pub mod base;
pub mod file;
pub mod memory;
pub mod spreadsheet;
pub mod tabular;

pub use base::{DatasetSink, StorageError};
pub use file::{DatasetFile, FileFormat};
pub use memory::MemoryStorage;
pub use spreadsheet::XlsxStorage;
pub use tabular::CsvStorage;
