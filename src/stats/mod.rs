use chrono::{DateTime, Utc};
use log::info;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::core::types::ProductRecord;

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeStats {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total: usize,
    pub missing_ean_count: usize,
    pub missing_price_count: usize,
    /// Records with both fields missing.
    pub error_count: usize,
}

impl ScrapeStats {
    /// `(total - error_count) / total`, undefined for an empty run.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.total.saturating_sub(self.error_count) as f64 / self.total as f64)
    }
}

/// Serialized alongside the dataset at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub category_url: Option<Url>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total: usize,
    pub missing_ean_count: usize,
    pub missing_price_count: usize,
    pub error_count: usize,
    pub success_rate: Option<f64>,
}

/// Running completeness counters of one scrape.
#[derive(Debug, Clone)]
pub struct StatsTracker {
    stats: Arc<RwLock<ScrapeStats>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(ScrapeStats {
                start_time: Utc::now(),
                end_time: None,
                total: 0,
                missing_ean_count: 0,
                missing_price_count: 0,
                error_count: 0,
            })),
        }
    }

    /// Counts a freshly scraped record.
    pub fn record_outcome(&self, record: &ProductRecord) {
        let mut stats = self.stats.write();
        stats.total += 1;
        if !record.has_code() {
            stats.missing_ean_count += 1;
        }
        if !record.has_price() {
            stats.missing_price_count += 1;
        }
        if record.is_empty() {
            stats.error_count += 1;
        }
    }

    /// Moves counters for a record whose fields were filled in after it was
    /// first counted. Fields never go from present back to missing.
    pub fn record_transition(&self, before: &ProductRecord, after: &ProductRecord) {
        let mut stats = self.stats.write();
        if !before.has_code() && after.has_code() {
            stats.missing_ean_count = stats.missing_ean_count.saturating_sub(1);
        }
        if !before.has_price() && after.has_price() {
            stats.missing_price_count = stats.missing_price_count.saturating_sub(1);
        }
        if before.is_empty() && !after.is_empty() {
            stats.error_count = stats.error_count.saturating_sub(1);
        }
    }

    pub fn finish(&self) {
        self.stats.write().end_time = Some(Utc::now());
    }

    pub fn get_stats(&self) -> ScrapeStats {
        self.stats.read().clone()
    }

    pub fn summary(&self, category_url: Option<&Url>) -> RunSummary {
        let stats = self.stats.read();
        RunSummary {
            run_id: Uuid::now_v7(),
            category_url: category_url.cloned(),
            started_at: stats.start_time,
            finished_at: stats.end_time,
            total: stats.total,
            missing_ean_count: stats.missing_ean_count,
            missing_price_count: stats.missing_price_count,
            error_count: stats.error_count,
            success_rate: stats.success_rate(),
        }
    }

    pub fn log_summary(&self) {
        let stats = self.stats.read();
        let duration = stats
            .end_time
            .unwrap_or_else(Utc::now)
            .signed_duration_since(stats.start_time);
        let rate = stats
            .success_rate()
            .map(|rate| format!("{:.2}%", rate * 100.0))
            .unwrap_or_else(|| "N/A".to_string());

        info!("Scraping summary:");
        info!("  Duration: {} seconds", duration.num_seconds());
        info!("  Total products: {}", stats.total);
        info!("  Missing EAN: {}", stats.missing_ean_count);
        info!("  Missing price: {}", stats.missing_price_count);
        info!("  Errors: {}", stats.error_count);
        info!("  Success rate: {}", rate);
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}
