use log::{debug, warn};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

use super::page::{BrowserPage, ElementHandle};
use crate::core::config::Timings;
use crate::{ScraperError, ScraperResult};

/// Loads `url` and lets it settle for `settle`. Never fails: a navigation
/// error is logged, followed by a short wait, and `false` is returned so the
/// caller can still work with whatever the page managed to load.
pub async fn navigate<P: BrowserPage + ?Sized>(
    page: &P,
    url: &Url,
    settle: Duration,
    timings: &Timings,
) -> bool {
    match page.goto(url).await {
        Ok(()) => {
            sleep(settle).await;
            true
        }
        Err(e) => {
            warn!("Page load issue for {}: {}", url, e);
            sleep(timings.navigation_error_wait).await;
            false
        }
    }
}

/// Polls for the first element matching `selector` until it shows up or
/// `timings.element_wait_timeout` runs out.
pub async fn wait_for_element<P: BrowserPage + ?Sized>(
    page: &P,
    scope: Option<ElementHandle>,
    selector: &str,
    timings: &Timings,
) -> ScraperResult<ElementHandle> {
    let deadline = Instant::now() + timings.element_wait_timeout;

    loop {
        match page.query(scope, selector).await {
            Ok(Some(element)) => return Ok(element),
            Ok(None) => {}
            Err(ScraperError::SelectorError(msg)) => {
                return Err(ScraperError::SelectorError(msg));
            }
            Err(e) => debug!("Query for {} failed while waiting: {}", selector, e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ScraperError::Timeout(
                timings.element_wait_timeout,
                selector.to_string(),
            ));
        }
        sleep(timings.poll_interval.min(deadline - now)).await;
    }
}
