use log::{debug, error, info, warn};
use url::Url;

use super::{resolve_page_urls, strip_query, OrderedUrlSet};
use crate::browser::{navigate, wait_for_element, BrowserPage};
use crate::core::config::{ScrapeConfig, SiteProfile};
use crate::ScraperResult;

/// Product URLs linked from one listing page, in first-seen order.
///
/// A listing that never shows a product link within the element wait is
/// treated as empty. Links whose `href` cannot be read are skipped.
pub async fn collect_product_urls<P: BrowserPage + ?Sized>(
    page: &P,
    config: &ScrapeConfig,
    listing_url: &Url,
) -> ScraperResult<Vec<Url>> {
    let site = &config.site;
    navigate(page, listing_url, config.timings.page_settle_delay, &config.timings).await;

    let link_selector = site.product_link_selector();
    match wait_for_element(page, None, &link_selector, &config.timings).await {
        Ok(_) => {}
        Err(e) if e.is_timeout() => {
            warn!("No product links appeared on {}", listing_url);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    }

    let mut urls = OrderedUrlSet::new();
    for link in page.query_all(None, &link_selector).await? {
        let href = match page.attribute(link, "href").await {
            Ok(Some(href)) => href,
            Ok(None) => continue,
            Err(e) => {
                debug!("Skipping product link on {}: {}", listing_url, e);
                continue;
            }
        };
        if let Some(url) = product_url(site, &href) {
            urls.insert(url);
        }
    }

    debug!("Found {} product links on {}", urls.len(), listing_url);
    Ok(urls.into_vec())
}

/// Every product URL in the configured page range of a category.
///
/// Failures never propagate: a category without product links yields an
/// empty list, and a listing page that fails is logged and skipped.
pub async fn collect_all_product_urls<P: BrowserPage + ?Sized>(
    page: &P,
    config: &ScrapeConfig,
    category_url: &Url,
) -> Vec<Url> {
    let site = &config.site;
    navigate(page, category_url, config.timings.page_settle_delay, &config.timings).await;

    if let Err(e) = wait_for_element(page, None, &site.product_link_selector(), &config.timings).await {
        error!("Category {} shows no products: {}", category_url, e);
        return Vec::new();
    }

    let page_urls = resolve_page_urls(page, site).await;
    let total_pages = page_urls.len();
    let Some((start, end)) = config.pages.resolve(total_pages) else {
        warn!(
            "Start page {} exceeds the {} available pages",
            config.pages.start_page, total_pages
        );
        return Vec::new();
    };
    info!(
        "Scraping pages {} to {} of {} (limit: {})",
        start, end, total_pages, config.pages.limit
    );

    let mut collected = OrderedUrlSet::new();
    for (offset, listing_url) in page_urls[start - 1..end].iter().enumerate() {
        info!("Collecting page {}: {}", start + offset, listing_url);
        match collect_product_urls(page, config, listing_url).await {
            Ok(urls) => {
                let before = collected.len();
                collected.extend(urls);
                debug!("Page {} added {} new products", start + offset, collected.len() - before);
            }
            Err(e) => error!("Collecting page {} failed: {}", start + offset, e),
        }
    }

    info!("Collected {} unique product URLs", collected.len());
    collected.into_vec()
}

fn product_url(site: &SiteProfile, href: &str) -> Option<Url> {
    let url = strip_query(&site.base_url.join(href).ok()?);
    let path = url.path();
    (path.contains(&site.product_path) && !path.contains(&site.category_path)).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ElementHandle, ElementScript, SnapshotPage};
    use crate::core::config::{PageLimit, PageRange, Timings};
    use crate::ScraperError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    const CATEGORY: &str = "https://www.bol.com/nl/nl/l/analoge-instantcamera-s/20974/";

    fn config(pages: PageRange) -> ScrapeConfig {
        ScrapeConfig::default()
            .with_timings(Timings::instant())
            .with_pages(pages)
    }

    fn listing(links: &[&str], last_page: usize) -> String {
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{href}">product</a>"#))
            .collect();
        let pagination = if last_page > 1 {
            format!(
                r#"<div data-testid="pagination"><ul>
                    <li><a href="?page=2">2</a></li>
                    <li><a href="?page={last_page}">{last_page}</a></li>
                </ul></div>"#
            )
        } else {
            String::new()
        };
        format!("<html><body>{anchors}{pagination}</body></html>")
    }

    #[tokio::test]
    async fn test_collect_dedupes_and_filters() {
        let html = listing(
            &[
                "/nl/nl/p/a/1/?bltgh=x",
                "/nl/nl/p/b/2/",
                "https://www.bol.com/nl/nl/p/a/1/#reviews",
                "/nl/nl/p/c/3/",
                "/nl/nl/l/redirect/nl/nl/p/x/",
            ],
            1,
        );
        let page = SnapshotPage::new().with_page(CATEGORY, &html);

        let urls = collect_product_urls(&page, &config(PageRange::default()), &Url::parse(CATEGORY).unwrap())
            .await
            .unwrap();
        let urls: Vec<String> = urls.into_iter().map(String::from).collect();

        assert_eq!(
            urls,
            vec![
                "https://www.bol.com/nl/nl/p/a/1/",
                "https://www.bol.com/nl/nl/p/b/2/",
                "https://www.bol.com/nl/nl/p/c/3/",
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_without_links_is_empty() {
        let page = SnapshotPage::new().with_page(CATEGORY, "<html><body></body></html>");
        let urls = collect_product_urls(&page, &config(PageRange::default()), &Url::parse(CATEGORY).unwrap())
            .await
            .unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_collect_all_unions_pages_in_range() {
        let page2 = format!("{CATEGORY}?page=2");
        let page3 = format!("{CATEGORY}?page=3");
        let page = SnapshotPage::new()
            .with_page(CATEGORY, &listing(&["/nl/nl/p/a/1/"], 3))
            .with_page(&page2, &listing(&["/nl/nl/p/b/2/", "/nl/nl/p/c/3/"], 3))
            .with_page(&page3, &listing(&["/nl/nl/p/c/3/", "/nl/nl/p/d/4/"], 3));

        let urls = collect_all_product_urls(
            &page,
            &config(PageRange::new(2, PageLimit::All)),
            &Url::parse(CATEGORY).unwrap(),
        )
        .await;
        let urls: Vec<String> = urls.into_iter().map(String::from).collect();

        assert_eq!(
            urls,
            vec![
                "https://www.bol.com/nl/nl/p/b/2/",
                "https://www.bol.com/nl/nl/p/c/3/",
                "https://www.bol.com/nl/nl/p/d/4/",
            ]
        );
        assert_eq!(page.visits(CATEGORY), 1);
        assert_eq!(page.visits(&page2), 1);
        assert_eq!(page.visits(&page3), 1);
    }

    #[tokio::test]
    async fn test_collect_all_start_beyond_last_page() {
        let page = SnapshotPage::new().with_page(CATEGORY, &listing(&["/nl/nl/p/a/1/"], 1));

        let urls = collect_all_product_urls(
            &page,
            &config(PageRange::new(2, PageLimit::Pages(1))),
            &Url::parse(CATEGORY).unwrap(),
        )
        .await;

        assert!(urls.is_empty());
        assert_eq!(page.history().len(), 1);
    }

    #[tokio::test]
    async fn test_collect_all_without_products_aborts() {
        let page = SnapshotPage::new().with_page(CATEGORY, "<html><body><p>Leeg</p></body></html>");
        let urls = collect_all_product_urls(
            &page,
            &config(PageRange::default()),
            &Url::parse(CATEGORY).unwrap(),
        )
        .await;
        assert!(urls.is_empty());
    }

    /// Snapshot page whose DOM misbehaves like a page that re-renders while
    /// it is being read.
    struct UnstablePage {
        inner: SnapshotPage,
        detached_hrefs: HashSet<String>,
        failing_listings: HashSet<String>,
        link_queries: Mutex<HashMap<String, usize>>,
    }

    impl UnstablePage {
        fn new(inner: SnapshotPage) -> Self {
            Self {
                inner,
                detached_hrefs: HashSet::new(),
                failing_listings: HashSet::new(),
                link_queries: Mutex::new(HashMap::new()),
            }
        }

        /// Reading the `href` of a link pointing at `href` fails.
        fn with_detached_link(mut self, href: &str) -> Self {
            self.detached_hrefs.insert(href.to_string());
            self
        }

        /// Harvesting the product links of `url` fails after they appeared.
        fn with_failing_listing(mut self, url: &str) -> Self {
            self.failing_listings.insert(url.to_string());
            self
        }
    }

    #[async_trait]
    impl BrowserPage for UnstablePage {
        async fn goto(&self, url: &Url) -> ScraperResult<()> {
            self.inner.goto(url).await
        }

        async fn current_url(&self) -> ScraperResult<Url> {
            self.inner.current_url().await
        }

        async fn query_all(
            &self,
            scope: Option<ElementHandle>,
            selector: &str,
        ) -> ScraperResult<Vec<ElementHandle>> {
            if scope.is_none() && selector == SiteProfile::default().product_link_selector() {
                let url = self.inner.current_url().await?.to_string();
                let fail = {
                    let mut queries = self.link_queries.lock();
                    let count = queries.entry(url.clone()).or_insert(0);
                    *count += 1;
                    *count == 2 && self.failing_listings.contains(&url)
                };
                if fail {
                    return Err(ScraperError::BrowserError("target closed".to_string()));
                }
            }
            self.inner.query_all(scope, selector).await
        }

        async fn rendered_text(&self, element: ElementHandle) -> ScraperResult<String> {
            self.inner.rendered_text(element).await
        }

        async fn attribute(
            &self,
            element: ElementHandle,
            name: &str,
        ) -> ScraperResult<Option<String>> {
            let value = self.inner.attribute(element, name).await?;
            match &value {
                Some(href) if name == "href" && self.detached_hrefs.contains(href) => {
                    Err(ScraperError::BrowserError("node detached".to_string()))
                }
                _ => Ok(value),
            }
        }

        async fn run_script(
            &self,
            element: ElementHandle,
            script: ElementScript,
        ) -> ScraperResult<String> {
            self.inner.run_script(element, script).await
        }
    }

    fn three_listing_pages() -> SnapshotPage {
        SnapshotPage::new()
            .with_page(CATEGORY, &listing(&["/nl/nl/p/a/1/"], 3))
            .with_page(
                &format!("{CATEGORY}?page=2"),
                &listing(&["/nl/nl/p/re-rendered/9/", "/nl/nl/p/b/2/"], 3),
            )
            .with_page(
                &format!("{CATEGORY}?page=3"),
                &listing(&["/nl/nl/p/d/4/"], 3),
            )
    }

    #[tokio::test]
    async fn test_unreadable_link_is_skipped() {
        let page = UnstablePage::new(three_listing_pages()).with_detached_link("/nl/nl/p/re-rendered/9/");

        let urls = collect_all_product_urls(
            &page,
            &config(PageRange::default()),
            &Url::parse(CATEGORY).unwrap(),
        )
        .await;
        let urls: Vec<String> = urls.into_iter().map(String::from).collect();

        assert_eq!(
            urls,
            vec![
                "https://www.bol.com/nl/nl/p/a/1/",
                "https://www.bol.com/nl/nl/p/b/2/",
                "https://www.bol.com/nl/nl/p/d/4/",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_listing_page_does_not_stop_later_pages() {
        let page2 = format!("{CATEGORY}?page=2");
        let page3 = format!("{CATEGORY}?page=3");
        let page = UnstablePage::new(three_listing_pages()).with_failing_listing(&page2);

        let urls = collect_all_product_urls(
            &page,
            &config(PageRange::default()),
            &Url::parse(CATEGORY).unwrap(),
        )
        .await;
        let urls: Vec<String> = urls.into_iter().map(String::from).collect();

        assert_eq!(
            urls,
            vec![
                "https://www.bol.com/nl/nl/p/a/1/",
                "https://www.bol.com/nl/nl/p/d/4/",
            ]
        );
        assert_eq!(page.inner.visits(&page2), 1);
        assert_eq!(page.inner.visits(&page3), 1);
    }
}
