pub mod browser;
pub mod core;
pub mod extractors;
pub mod listing;
pub mod runner;
pub mod stats;
pub mod storage;

pub use crate::core::{CrawlPhase, CrawlReport, Crawler};
pub use crate::core::{ScraperError, ScraperResult};
pub use stats::StatsTracker;
pub use storage::{CsvStorage, DatasetFile, DatasetSink, XlsxStorage};
