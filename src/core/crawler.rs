use log::{debug, error, info, warn};
use std::fmt;
use url::Url;

use crate::browser::{navigate, BrowserPage};
use crate::core::config::ScrapeConfig;
use crate::core::retry::{with_retries, RetryPolicy};
use crate::core::types::{Dataset, Extraction, Price, ProductRecord};
use crate::extractors::{CodeExtractor, PriceExtractor};
use crate::listing::collect_all_product_urls;
use crate::stats::{ScrapeStats, StatsTracker};
use crate::storage::DatasetSink;
use crate::ScraperResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Init,
    ResolvingUrls,
    Extracting,
    Retrying,
    Saving,
    Done,
    Error,
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlPhase::Init => "init",
            CrawlPhase::ResolvingUrls => "resolving urls",
            CrawlPhase::Extracting => "extracting",
            CrawlPhase::Retrying => "retrying",
            CrawlPhase::Saving => "saving",
            CrawlPhase::Done => "done",
            CrawlPhase::Error => "error",
        };
        f.write_str(name)
    }
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub phase: CrawlPhase,
    pub records: Vec<ProductRecord>,
    pub stats: ScrapeStats,
    pub saved: bool,
}

/// Scrapes one category on one page: collects product URLs, extracts price
/// and code for each, gives the incomplete ones a single second pass and
/// hands the result to a [`DatasetSink`].
pub struct Crawler<'a, P: BrowserPage + ?Sized> {
    page: &'a P,
    config: &'a ScrapeConfig,
    prices: PriceExtractor,
    codes: CodeExtractor,
    retry: RetryPolicy,
    stats: StatsTracker,
    phase: CrawlPhase,
}

impl<'a, P: BrowserPage + ?Sized> Crawler<'a, P> {
    pub fn new(page: &'a P, config: &'a ScrapeConfig) -> ScraperResult<Self> {
        config.validate()?;
        info!("Initializing crawler");

        Ok(Self {
            page,
            config,
            prices: PriceExtractor::new(config),
            codes: CodeExtractor::new(config)?,
            retry: RetryPolicy::from_config(config),
            stats: StatsTracker::new(),
            phase: CrawlPhase::Init,
        })
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    fn enter(&mut self, phase: CrawlPhase) {
        debug!("Crawl phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs the whole category. Never fails: problems end up as empty fields,
    /// a shorter dataset or an [`CrawlPhase::Error`] report.
    pub async fn run(mut self, category_url: &Url, sink: &dyn DatasetSink) -> CrawlReport {
        info!("Starting category scrape: {}", category_url);

        self.enter(CrawlPhase::ResolvingUrls);
        let urls = collect_all_product_urls(self.page, self.config, category_url).await;
        if urls.is_empty() {
            warn!("No product URLs found for {}", category_url);
            self.stats.finish();
            self.enter(CrawlPhase::Done);
            return self.report(Dataset::new(), false);
        }
        info!("Found {} products to scrape", urls.len());

        self.enter(CrawlPhase::Extracting);
        let mut dataset = Dataset::new();
        let failed = self.extract_all(&urls, &mut dataset).await;

        if !failed.is_empty() {
            self.enter(CrawlPhase::Retrying);
            info!("Retrying {} incomplete products", failed.len());
            self.retry_failed(&failed, &mut dataset).await;
        }

        self.stats.finish();
        self.stats.log_summary();

        self.enter(CrawlPhase::Saving);
        let summary = self.stats.summary(Some(category_url));
        match sink.save(dataset.records(), &summary).await {
            Ok(()) => {
                self.enter(CrawlPhase::Done);
                self.report(dataset, true)
            }
            Err(e) => {
                error!("Saving results for {} failed: {}", category_url, e);
                self.enter(CrawlPhase::Error);
                self.report(dataset, false)
            }
        }
    }

    /// First pass. Returns the URLs of records missing either field.
    async fn extract_all(&self, urls: &[Url], dataset: &mut Dataset) -> Vec<Url> {
        let mut failed = Vec::new();

        for (i, url) in urls.iter().enumerate() {
            info!("[{}/{}] Processing: {}", i + 1, urls.len(), url);
            navigate(self.page, url, self.config.timings.page_settle_delay, &self.config.timings)
                .await;

            let price = self.extract_price(url).await;
            let code = self.extract_code(url).await;
            let record = ProductRecord::new(url.clone(), code, price);

            match (&record.code, &record.price) {
                (Some(code), Some(price)) => info!("EAN: {}, Price: {}", code, price),
                _ => {
                    if !record.has_code() {
                        warn!("Missing EAN for {}", url);
                    }
                    if !record.has_price() {
                        warn!("Missing price for {}", url);
                    }
                }
            }

            self.stats.record_outcome(&record);
            if !record.is_complete() {
                failed.push(url.clone());
            }
            if !dataset.insert(record) {
                debug!("Duplicate product URL skipped: {}", url);
            }
        }

        failed
    }

    /// Second pass over incomplete records. Only fields that are still empty
    /// are attempted again, after a longer settle delay.
    async fn retry_failed(&self, failed: &[Url], dataset: &mut Dataset) {
        for (i, url) in failed.iter().enumerate() {
            let Some(before) = dataset.get(url).cloned() else {
                continue;
            };
            info!("[{}/{}] Retrying: {}", i + 1, failed.len(), url);
            navigate(self.page, url, self.config.timings.retry_settle_delay, &self.config.timings)
                .await;

            let mut after = before.clone();
            if !before.has_price() {
                if let Some(price) = self.extract_price(url).await {
                    info!("[RETRIEVED] Price: {}", price);
                    after.price = Some(price);
                }
            }
            if !before.has_code() {
                if let Some(code) = self.extract_code(url).await {
                    info!("[RETRIEVED] EAN: {}", code);
                    after.code = Some(code);
                }
            }

            self.stats.record_transition(&before, &after);
            if let Some(record) = dataset.get_mut(url) {
                *record = after;
            }
        }
    }

    async fn extract_price(&self, url: &Url) -> Option<Price> {
        let (page, prices) = (self.page, &self.prices);
        settle("price", url, with_retries(&self.retry, || prices.extract(page)).await)
    }

    async fn extract_code(&self, url: &Url) -> Option<String> {
        let (page, codes) = (self.page, &self.codes);
        settle("EAN", url, with_retries(&self.retry, || codes.extract(page)).await)
    }

    fn report(&self, dataset: Dataset, saved: bool) -> CrawlReport {
        CrawlReport {
            phase: self.phase,
            records: dataset.into_records(),
            stats: self.stats.get_stats(),
            saved,
        }
    }
}

fn settle<T>(field: &str, url: &Url, outcome: Extraction<T>) -> Option<T> {
    match outcome {
        Extraction::Found(value) => Some(value),
        Extraction::Absent => None,
        Extraction::Failed(e) => {
            warn!("{} extraction failed for {}: {}", field, url, e);
            None
        }
    }
}
