use log::debug;

use crate::browser::{wait_for_element, BrowserPage, ElementScript};
use crate::core::config::{ScrapeConfig, SiteProfile, Timings};
use crate::core::types::{Extraction, Price};
use crate::ScraperError;

/// Reads the displayed price: the integer part from the price element's
/// leading text node, the fraction from its nested fraction element.
#[derive(Debug, Clone)]
pub struct PriceExtractor {
    site: SiteProfile,
    timings: Timings,
}

impl PriceExtractor {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            site: config.site.clone(),
            timings: config.timings.clone(),
        }
    }

    pub async fn extract<P: BrowserPage + ?Sized>(&self, page: &P) -> Extraction<Price> {
        let price_element =
            match wait_for_element(page, None, &self.site.price_selector, &self.timings).await {
                Ok(element) => element,
                Err(e) if e.is_timeout() => return Extraction::Absent,
                Err(e) => return Extraction::Failed(e),
            };

        let whole = match page.run_script(price_element, ElementScript::LeadingText).await {
            Ok(text) => digits(&text),
            Err(e) => return Extraction::Failed(e),
        };
        if whole.is_empty() {
            return Extraction::Absent;
        }

        let fraction = match page
            .query(Some(price_element), &self.site.price_fraction_selector)
            .await
        {
            Ok(Some(element)) => page
                .rendered_text(element)
                .await
                .map(|text| digits(&text))
                .unwrap_or_default(),
            Ok(None) => String::new(),
            Err(e) => {
                debug!("Price fraction lookup failed: {}", e);
                String::new()
            }
        };
        let fraction = if fraction.is_empty() {
            "00".to_string()
        } else {
            fraction
        };

        match format!("{whole}.{fraction}").parse::<f64>() {
            Ok(value) => Extraction::Found(Price::new(value)),
            Err(e) => Extraction::Failed(ScraperError::ExtractionError(format!(
                "unparseable price {whole}.{fraction}: {e}"
            ))),
        }
    }
}

fn digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}
