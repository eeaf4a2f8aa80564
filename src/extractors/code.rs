use log::debug;
use regex::{Regex, RegexBuilder};
use std::fmt;
use tokio::time::sleep;

use crate::browser::{wait_for_element, BrowserPage, ElementHandle, ElementScript};
use crate::core::config::{ScrapeConfig, SiteProfile, Timings};
use crate::core::types::Extraction;
use crate::{ScraperError, ScraperResult};

/// Valid identifier codes are 8 to 14 digits long.
const CODE_DIGITS: &str = r"(\d{8,14})";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTier {
    /// Row-by-row scan reading the rendered text.
    StructuredScan,
    /// Same traversal, reading `textContent` through a script.
    ScriptScan,
    /// Keyword-then-digits pattern over the whole panel text.
    PatternScan,
}

impl CodeTier {
    pub const ALL: [CodeTier; 3] = [
        CodeTier::StructuredScan,
        CodeTier::ScriptScan,
        CodeTier::PatternScan,
    ];
}

impl fmt::Display for CodeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodeTier::StructuredScan => "structured scan",
            CodeTier::ScriptScan => "script scan",
            CodeTier::PatternScan => "pattern scan",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum TextSource {
    Rendered,
    Script,
}

/// Reads the identifier code from the specification panel, falling back
/// through progressively more tolerant [`CodeTier`]s and, if all of them come
/// up empty, expanding the panel once and trying again.
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    site: SiteProfile,
    timings: Timings,
    keyword: String,
    pattern: Regex,
}

impl CodeExtractor {
    pub fn new(config: &ScrapeConfig) -> ScraperResult<Self> {
        let keyword = config.site.code_keyword.trim().to_string();
        let pattern = RegexBuilder::new(&format!(
            r"{}[:\s\-]*{}",
            regex::escape(&keyword),
            CODE_DIGITS
        ))
        .case_insensitive(true)
        .build()
        .map_err(|e| ScraperError::ConfigError(format!("invalid code pattern: {e}")))?;

        Ok(Self {
            site: config.site.clone(),
            timings: config.timings.clone(),
            keyword: keyword.to_uppercase(),
            pattern,
        })
    }

    /// Digit run following the keyword in free text.
    pub fn match_code(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|digits| digits.as_str().to_string())
    }

    pub async fn extract<P: BrowserPage + ?Sized>(&self, page: &P) -> Extraction<String> {
        let panel =
            match wait_for_element(page, None, &self.site.spec_panel_selector, &self.timings).await
            {
                Ok(panel) => panel,
                Err(e) if e.is_timeout() => return Extraction::Absent,
                Err(e) => return Extraction::Failed(e),
            };

        self.scroll_into_view(page, panel).await;

        if let Extraction::Found(code) = self.run_tiers(page, panel).await {
            return Extraction::Found(code);
        }

        self.expand_and_retry(page, panel).await
    }

    async fn expand_and_retry<P: BrowserPage + ?Sized>(
        &self,
        page: &P,
        panel: ElementHandle,
    ) -> Extraction<String> {
        let show_more = match page.query(Some(panel), &self.site.show_more_selector).await {
            Ok(Some(element)) => element,
            Ok(None) => return Extraction::Absent,
            Err(e) => {
                debug!("Show-more lookup failed: {}", e);
                return Extraction::Absent;
            }
        };

        self.scroll_into_view(page, show_more).await;
        if let Err(e) = page.run_script(show_more, ElementScript::Click).await {
            debug!("Show-more click failed: {}", e);
            return Extraction::Absent;
        }
        sleep(self.timings.show_more_wait).await;

        // The click re-renders the panel; the old handle is stale now.
        let panel = match page.query(None, &self.site.spec_panel_selector).await {
            Ok(Some(panel)) => panel,
            Ok(None) => return Extraction::Absent,
            Err(e) => {
                debug!("Specification panel lookup after expansion failed: {}", e);
                return Extraction::Absent;
            }
        };

        self.run_tiers(page, panel).await
    }

    async fn scroll_into_view<P: BrowserPage + ?Sized>(&self, page: &P, element: ElementHandle) {
        if let Err(e) = page.run_script(element, ElementScript::ScrollIntoView).await {
            debug!("Scroll into view failed: {}", e);
        }
        sleep(self.timings.scroll_wait).await;
    }

    async fn run_tiers<P: BrowserPage + ?Sized>(
        &self,
        page: &P,
        panel: ElementHandle,
    ) -> Extraction<String> {
        for tier in CodeTier::ALL {
            match self.run_tier(page, panel, tier).await {
                Extraction::Found(code) => {
                    debug!("Code {} found by {}", code, tier);
                    return Extraction::Found(code);
                }
                Extraction::Absent => {}
                Extraction::Failed(e) => debug!("{} failed: {}", tier, e),
            }
        }
        Extraction::Absent
    }

    pub async fn run_tier<P: BrowserPage + ?Sized>(
        &self,
        page: &P,
        panel: ElementHandle,
        tier: CodeTier,
    ) -> Extraction<String> {
        match tier {
            CodeTier::StructuredScan => self.scan_rows(page, panel, TextSource::Rendered).await,
            CodeTier::ScriptScan => self.scan_rows(page, panel, TextSource::Script).await,
            CodeTier::PatternScan => match page.run_script(panel, ElementScript::TextContent).await
            {
                Ok(text) => self.match_code(&text).into(),
                Err(e) => Extraction::Failed(e),
            },
        }
    }

    async fn scan_rows<P: BrowserPage + ?Sized>(
        &self,
        page: &P,
        panel: ElementHandle,
        source: TextSource,
    ) -> Extraction<String> {
        let rows = match page.query_all(Some(panel), &self.site.spec_row_selector).await {
            Ok(rows) => rows,
            Err(e) => return Extraction::Failed(e),
        };

        for row in rows {
            match self.read_row(page, row, source).await {
                Ok(Some(code)) => return Extraction::Found(code),
                Ok(None) => {}
                Err(e) => debug!("Skipping specification row: {}", e),
            }
        }
        Extraction::Absent
    }

    async fn read_row<P: BrowserPage + ?Sized>(
        &self,
        page: &P,
        row: ElementHandle,
        source: TextSource,
    ) -> ScraperResult<Option<String>> {
        let Some(label) = page.query(Some(row), &self.site.spec_label_selector).await? else {
            return Ok(None);
        };
        let Some(value) = page.query(Some(row), &self.site.spec_value_selector).await? else {
            return Ok(None);
        };

        let label = read_text(page, label, source).await?;
        if !label.trim().to_uppercase().contains(&self.keyword) {
            return Ok(None);
        }

        let value = read_text(page, value, source).await?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }
}

async fn read_text<P: BrowserPage + ?Sized>(
    page: &P,
    element: ElementHandle,
    source: TextSource,
) -> ScraperResult<String> {
    match source {
        TextSource::Rendered => page.rendered_text(element).await,
        TextSource::Script => page.run_script(element, ElementScript::TextContent).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SnapshotPage;
    use url::Url;

    const URL: &str = "https://www.bol.com/nl/nl/p/instax-mini-12/9300000004/";

    fn extractor() -> CodeExtractor {
        let config = ScrapeConfig::default().with_timings(Timings::instant());
        CodeExtractor::new(&config).unwrap()
    }

    fn panel(rows: &str, extra: &str) -> String {
        format!(
            r#"<html><body>
            <section data-group-name="ProductSpecification">
                <dl>{rows}</dl>
                {extra}
            </section>
            </body></html>"#
        )
    }

    fn row(label: &str, value: &str) -> String {
        format!(
            r#"<div class="specs__row"><dt class="specs__title">{label}</dt><dd class="specs__value">{value}</dd></div>"#
        )
    }

    async fn loaded(page: SnapshotPage) -> SnapshotPage {
        page.goto(&Url::parse(URL).unwrap()).await.unwrap();
        page
    }

    #[test]
    fn test_pattern_accepts_separators_case_insensitively() {
        let codes = extractor();
        assert_eq!(
            codes.match_code("ean: 08718468778"),
            Some("08718468778".to_string())
        );
        assert_eq!(
            codes.match_code("Merk Fujifilm EAN-8718468778123 Kleur"),
            Some("8718468778123".to_string())
        );
        assert_eq!(
            codes.match_code("EAN 12345678"),
            Some("12345678".to_string())
        );
        assert_eq!(
            codes.match_code("EAN87184687781Kleur"),
            Some("87184687781".to_string())
        );
    }

    #[test]
    fn test_pattern_rejects_short_runs() {
        assert_eq!(extractor().match_code("EAN-1234567"), None);
        assert_eq!(extractor().match_code("no code here"), None);
    }

    #[tokio::test]
    async fn test_structured_scan_wins_without_touching_later_tiers() {
        let html = panel(
            &format!("{}{}", row("Merk", "Fujifilm"), row("EAN", " 8718468778 ")),
            "",
        );
        let page = loaded(SnapshotPage::new().with_page(URL, &html)).await;

        let result = extractor().extract(&page).await;

        assert_eq!(result.into_option(), Some("8718468778".to_string()));
        assert_eq!(page.script_calls(ElementScript::TextContent), 0);
        assert_eq!(page.script_calls(ElementScript::Click), 0);
    }

    #[tokio::test]
    async fn test_script_scan_reads_unpainted_values() {
        let html = panel(
            &row("EAN", r#"<span style="display:none">8718468778</span>"#),
            "",
        );
        let page = loaded(SnapshotPage::new().with_page(URL, &html)).await;

        let codes = extractor();
        let panel_handle = page
            .query(None, r#"section[data-group-name="ProductSpecification"]"#)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            codes.run_tier(&page, panel_handle, CodeTier::StructuredScan).await,
            Extraction::Absent
        ));

        let result = codes.extract(&page).await;
        assert_eq!(result.into_option(), Some("8718468778".to_string()));
    }

    #[tokio::test]
    async fn test_pattern_scan_falls_back_to_free_text() {
        let html = panel("", "<p>Productcode ean: 08718468778 (verpakking)</p>");
        let page = loaded(SnapshotPage::new().with_page(URL, &html)).await;

        let result = extractor().extract(&page).await;
        assert_eq!(result.into_option(), Some("08718468778".to_string()));
    }

    #[tokio::test]
    async fn test_short_code_is_absent() {
        let html = panel("", "<p>EAN-1234567</p>");
        let page = loaded(SnapshotPage::new().with_page(URL, &html)).await;

        assert!(matches!(extractor().extract(&page).await, Extraction::Absent));
    }

    #[tokio::test]
    async fn test_show_more_expands_and_requeries_panel() {
        let collapsed = panel(
            &row("Merk", "Fujifilm"),
            r#"<a data-test="show-more">Toon meer</a>"#,
        );
        let expanded = panel(&format!("{}{}", row("Merk", "Fujifilm"), row("EAN", "4547410489118")), "");
        let page = loaded(
            SnapshotPage::new()
                .with_page(URL, &collapsed)
                .with_expansion(URL, &expanded),
        )
        .await;

        let result = extractor().extract(&page).await;

        assert_eq!(result.into_option(), Some("4547410489118".to_string()));
        assert_eq!(page.script_calls(ElementScript::Click), 1);
    }

    #[tokio::test]
    async fn test_absent_without_show_more() {
        let html = panel(&row("Merk", "Fujifilm"), "");
        let page = loaded(SnapshotPage::new().with_page(URL, &html)).await;

        assert!(matches!(extractor().extract(&page).await, Extraction::Absent));
        assert_eq!(page.script_calls(ElementScript::Click), 0);
    }

    #[tokio::test]
    async fn test_missing_panel_is_absent() {
        let page = loaded(
            SnapshotPage::new().with_page(URL, "<html><body><p>EAN 8718468778</p></body></html>"),
        )
        .await;

        assert!(matches!(extractor().extract(&page).await, Extraction::Absent));
    }
}
