use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use url::Url;

use crate::{ScraperError, ScraperResult};

/// Capability token for an element on the current page.
///
/// A handle is only valid until the page navigates or a DOM-mutating script
/// runs; after that it resolves to [`ScraperError::StaleElement`] and the
/// element has to be queried again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: u64,
    epoch: u64,
}

impl ElementHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Scripts evaluated directly against one element, bypassing the rendering
/// layer's computed text and simulated pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementScript {
    /// Raw `textContent`, including content that is not painted yet.
    TextContent,
    /// Trimmed text of the first child node only.
    LeadingText,
    ScrollIntoView,
    Click,
}

impl ElementScript {
    pub fn function_declaration(&self) -> &'static str {
        match self {
            ElementScript::TextContent => {
                "function() { return this.textContent || this.innerText || ''; }"
            }
            ElementScript::LeadingText => {
                "function() { const node = this.childNodes[0]; return node ? node.textContent.trim() : ''; }"
            }
            ElementScript::ScrollIntoView => {
                "function() { this.scrollIntoView({behavior: 'smooth', block: 'center'}); return ''; }"
            }
            ElementScript::Click => "function() { this.click(); return ''; }",
        }
    }

    /// Whether running the script may change the DOM subtree.
    pub fn mutates_dom(&self) -> bool {
        matches!(self, ElementScript::Click)
    }
}

/// The browser collaborator: one loaded page plus element queries and script
/// evaluation.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &Url) -> ScraperResult<()>;

    async fn current_url(&self) -> ScraperResult<Url>;

    /// All elements matching `selector`, searched under `scope` or the whole
    /// document.
    async fn query_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> ScraperResult<Vec<ElementHandle>>;

    async fn query(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> ScraperResult<Option<ElementHandle>> {
        Ok(self.query_all(scope, selector).await?.into_iter().next())
    }

    /// Text as the rendering layer shows it. Content that is not painted yet
    /// comes back empty.
    async fn rendered_text(&self, element: ElementHandle) -> ScraperResult<String>;

    async fn attribute(&self, element: ElementHandle, name: &str) -> ScraperResult<Option<String>>;

    async fn run_script(&self, element: ElementHandle, script: ElementScript)
        -> ScraperResult<String>;
}

struct RegistryState<T> {
    epoch: u64,
    next_id: u64,
    entries: HashMap<u64, T>,
}

/// Issues [`ElementHandle`]s for backend element values and resolves them
/// back while they are still current.
pub(crate) struct HandleRegistry<T> {
    state: Mutex<RegistryState<T>>,
}

impl<T: Clone> HandleRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                epoch: 0,
                next_id: 0,
                entries: HashMap::new(),
            }),
        }
    }

    pub(crate) fn register(&self, value: T) -> ElementHandle {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.entries.insert(id, value);
        ElementHandle {
            id,
            epoch: state.epoch,
        }
    }

    pub(crate) fn resolve(&self, handle: ElementHandle) -> ScraperResult<T> {
        let state = self.state.lock();
        if handle.epoch != state.epoch {
            return Err(ScraperError::StaleElement);
        }
        state
            .entries
            .get(&handle.id)
            .cloned()
            .ok_or(ScraperError::StaleElement)
    }

    /// Drops every outstanding handle.
    pub(crate) fn invalidate(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.entries.clear();
    }
}
