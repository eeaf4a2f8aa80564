use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use super::{ScraperError, ScraperResult};

const DEFAULT_BASE_URL: &str = "https://www.bol.com";

/// Where things live on the target site: URL shapes and the CSS selectors the
/// extractors rely on.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub base_url: Url,
    pub product_path: String,
    pub category_path: String,
    pub page_param: String,
    pub code_keyword: String,
    pub price_selector: String,
    pub price_fraction_selector: String,
    pub spec_panel_selector: String,
    pub spec_row_selector: String,
    pub spec_label_selector: String,
    pub spec_value_selector: String,
    pub show_more_selector: String,
    pub pagination_selector: String,
}

impl SiteProfile {
    pub fn product_link_selector(&self) -> String {
        format!("a[href*=\"{}\"]", self.product_path)
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            product_path: "/nl/nl/p/".to_string(),
            category_path: "/nl/nl/l/".to_string(),
            page_param: "page".to_string(),
            code_keyword: "EAN".to_string(),
            price_selector: r#"span[data-test="price"]"#.to_string(),
            price_fraction_selector: r#"sup[data-test="price-fraction"]"#.to_string(),
            spec_panel_selector: r#"section[data-group-name="ProductSpecification"]"#.to_string(),
            spec_row_selector: "div.specs__row".to_string(),
            spec_label_selector: "dt.specs__title".to_string(),
            spec_value_selector: "dd.specs__value".to_string(),
            show_more_selector: r#"a[data-test="show-more"]"#.to_string(),
            pagination_selector: r#"div[data-testid="pagination"]"#.to_string(),
        }
    }
}

/// Timeouts and fixed settle delays.
///
/// The settle delays are unconditional sleeps that give client-side rendering
/// time to paint after a navigation, scroll or click. Their values are tunable;
/// nothing depends on the exact numbers.
#[derive(Debug, Clone)]
pub struct Timings {
    pub page_load_timeout: Duration,
    pub element_wait_timeout: Duration,
    pub poll_interval: Duration,
    pub page_settle_delay: Duration,
    pub retry_settle_delay: Duration,
    pub navigation_error_wait: Duration,
    pub scroll_wait: Duration,
    pub show_more_wait: Duration,
    pub attempt_delay: Duration,
}

impl Timings {
    /// No waiting at all. Used when replaying captured HTML snapshots.
    pub fn instant() -> Self {
        Self {
            page_load_timeout: Duration::from_secs(1),
            element_wait_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            page_settle_delay: Duration::ZERO,
            retry_settle_delay: Duration::ZERO,
            navigation_error_wait: Duration::ZERO,
            scroll_wait: Duration::ZERO,
            show_more_wait: Duration::ZERO,
            attempt_delay: Duration::ZERO,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            page_load_timeout: Duration::from_secs(30),
            element_wait_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
            page_settle_delay: Duration::from_secs(1),
            retry_settle_delay: Duration::from_secs(2),
            navigation_error_wait: Duration::from_secs(2),
            scroll_wait: Duration::from_millis(500),
            show_more_wait: Duration::from_secs(3),
            attempt_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageLimit {
    #[default]
    All,
    Pages(usize),
}

impl FromStr for PageLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty()
            || value.eq_ignore_ascii_case("all")
            || value.eq_ignore_ascii_case("none")
            || value.eq_ignore_ascii_case("unbounded")
        {
            return Ok(PageLimit::All);
        }

        match value.parse::<usize>() {
            Ok(0) => Err("max pages must be at least 1 (or \"all\")".to_string()),
            Ok(n) => Ok(PageLimit::Pages(n)),
            Err(_) => Err(format!("invalid max pages value: {value}")),
        }
    }
}

impl fmt::Display for PageLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageLimit::All => write!(f, "all"),
            PageLimit::Pages(n) => write!(f, "{n}"),
        }
    }
}

/// Requested slice of a category's listing pages, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start_page: usize,
    pub limit: PageLimit,
}

impl PageRange {
    pub fn new(start_page: usize, limit: PageLimit) -> Self {
        Self { start_page, limit }
    }

    /// Concrete closed interval of pages once the total is known, or `None`
    /// when the start lies beyond the last page.
    pub fn resolve(&self, total_pages: usize) -> Option<(usize, usize)> {
        let start = self.start_page.max(1);
        if start > total_pages {
            return None;
        }

        let end = match self.limit {
            PageLimit::All => total_pages,
            PageLimit::Pages(n) => (start + n.max(1) - 1).min(total_pages),
        };
        Some((start, end))
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self::new(1, PageLimit::All)
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub language: String,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            language: "nl-NL".to_string(),
            extra_args: vec!["--start-maximized".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub site: SiteProfile,
    pub timings: Timings,
    pub retry_attempts: usize,
    pub pages: PageRange,
    pub browser: BrowserSettings,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            site: SiteProfile::default(),
            timings: Timings::default(),
            retry_attempts: 2,
            pages: PageRange::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn with_site(mut self, site: SiteProfile) -> Self {
        self.site = site;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_pages(mut self, pages: PageRange) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.browser.headless = headless;
        self
    }

    pub fn validate(&self) -> ScraperResult<()> {
        if self.pages.start_page < 1 {
            return Err(ScraperError::ConfigError(
                "start page must be at least 1".to_string(),
            ));
        }
        if self.pages.limit == PageLimit::Pages(0) {
            return Err(ScraperError::ConfigError(
                "max pages must be at least 1".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(ScraperError::ConfigError(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        if self.site.code_keyword.trim().is_empty() {
            return Err(ScraperError::ConfigError(
                "code keyword must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
