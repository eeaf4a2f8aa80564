use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

use super::page::{BrowserPage, ElementHandle, ElementScript, HandleRegistry};
use crate::core::config::{BrowserSettings, Timings};
use crate::{ScraperError, ScraperResult};

impl From<CdpError> for ScraperError {
    fn from(err: CdpError) -> Self {
        ScraperError::BrowserError(err.to_string())
    }
}

/// One Chrome process driven over the DevTools protocol. Owned exclusively by
/// a single category scrape; call [`ChromeSession::close`] on every exit path.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page_load_timeout: Duration,
}

impl ChromeSession {
    pub async fn launch(settings: &BrowserSettings, timings: &Timings) -> ScraperResult<Self> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(timings.page_load_timeout)
            .arg(format!("--lang={}", settings.language));
        if !settings.headless {
            builder = builder.with_head();
        }
        for arg in &settings.extra_args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder.build().map_err(ScraperError::BrowserError)?;

        info!(
            "Launching Chrome (headless={}, lang={})",
            settings.headless, settings.language
        );
        let (browser, mut handler) = Browser::launch(config).await?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            page_load_timeout: timings.page_load_timeout,
        })
    }

    pub async fn open_page(&self) -> ScraperResult<ChromePage> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(ChromePage::new(page, self.page_load_timeout))
    }

    /// Closes the browser and waits for the process to exit.
    pub async fn close(mut self) -> ScraperResult<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!("Failed waiting for Chrome to exit: {}", e);
        }
        self.handler.abort();
        closed?;
        info!("Chrome session closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

pub struct ChromePage {
    page: Page,
    elements: HandleRegistry<Arc<Element>>,
    page_load_timeout: Duration,
}

impl ChromePage {
    pub fn new(page: Page, page_load_timeout: Duration) -> Self {
        Self {
            page,
            elements: HandleRegistry::new(),
            page_load_timeout,
        }
    }

    fn register_all(&self, elements: Vec<Element>) -> Vec<ElementHandle> {
        elements
            .into_iter()
            .map(|element| self.elements.register(Arc::new(element)))
            .collect()
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn goto(&self, url: &Url) -> ScraperResult<()> {
        self.elements.invalidate();
        match tokio::time::timeout(self.page_load_timeout, self.page.goto(url.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScraperError::NavigationError(e.to_string())),
            Err(_) => Err(ScraperError::Timeout(
                self.page_load_timeout,
                url.to_string(),
            )),
        }
    }

    async fn current_url(&self) -> ScraperResult<Url> {
        let url = self
            .page
            .url()
            .await?
            .ok_or_else(|| ScraperError::NavigationError("page has no URL".to_string()))?;
        Ok(Url::parse(&url)?)
    }

    async fn query_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> ScraperResult<Vec<ElementHandle>> {
        let found = match scope {
            Some(handle) => self.elements.resolve(handle)?.find_elements(selector).await,
            None => self.page.find_elements(selector).await,
        };

        match found {
            Ok(elements) => Ok(self.register_all(elements)),
            // CDP reports an empty match set as a missing node.
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn rendered_text(&self, element: ElementHandle) -> ScraperResult<String> {
        let element = self.elements.resolve(element)?;
        Ok(element.inner_text().await?.unwrap_or_default())
    }

    async fn attribute(&self, element: ElementHandle, name: &str) -> ScraperResult<Option<String>> {
        let element = self.elements.resolve(element)?;
        Ok(element.attribute(name).await?)
    }

    async fn run_script(
        &self,
        element: ElementHandle,
        script: ElementScript,
    ) -> ScraperResult<String> {
        let element = self.elements.resolve(element)?;
        let returns = element
            .call_js_fn(script.function_declaration(), false)
            .await?;

        if script.mutates_dom() {
            self.elements.invalidate();
        }

        Ok(match returns.result.value {
            Some(serde_json::Value::String(text)) => text,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
    }
}
