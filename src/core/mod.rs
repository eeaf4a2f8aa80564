pub mod backfill;
pub mod config;
mod crawler;
mod errors;
pub mod retry;
pub mod types;

pub use backfill::backfill_missing_codes;
pub use crawler::{CrawlPhase, CrawlReport, Crawler};
pub use errors::{ScraperError, ScraperResult};
