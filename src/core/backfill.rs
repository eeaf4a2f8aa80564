use log::{info, warn};

use crate::browser::{navigate, BrowserPage};
use crate::core::config::ScrapeConfig;
use crate::core::retry::{with_retries, RetryPolicy};
use crate::core::types::{Extraction, ProductRecord};
use crate::extractors::CodeExtractor;
use crate::ScraperResult;

/// Revisits every record without a code and fills in the ones that can be
/// read now. Returns how many records were updated.
pub async fn backfill_missing_codes<P: BrowserPage + ?Sized>(
    page: &P,
    config: &ScrapeConfig,
    records: &mut [ProductRecord],
) -> ScraperResult<usize> {
    config.validate()?;
    let codes = CodeExtractor::new(config)?;
    let policy = RetryPolicy::from_config(config);

    let missing = records.iter().filter(|record| !record.has_code()).count();
    let mut updated = 0;

    for (i, record) in records
        .iter_mut()
        .filter(|record| !record.has_code())
        .enumerate()
    {
        info!("[{}/{}] Processing: {}", i + 1, missing, record.url);
        navigate(page, &record.url, config.timings.page_settle_delay, &config.timings).await;

        match with_retries(&policy, || codes.extract(page)).await {
            Extraction::Found(code) => {
                info!("[RETRIEVED] EAN: {}", code);
                record.code = Some(code);
                updated += 1;
            }
            Extraction::Absent => warn!("EAN still missing for {}", record.url),
            Extraction::Failed(e) => warn!("EAN extraction failed for {}: {}", record.url, e),
        }
    }

    info!("Updated {} of {} products without EAN", updated, missing);
    Ok(updated)
}
