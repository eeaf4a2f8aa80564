//! Offline [`BrowserPage`] that serves captured HTML instead of driving a
//! real browser.
//!
//! Each URL maps to one or more recorded documents; successive visits walk
//! through the versions and the last one is served from then on. A route can
//! also carry an "expanded" document that replaces the current one when any
//! element is clicked, and can be marked as a failing navigation that still
//! leaves its content loaded.
//!
//! Rendered text skips `hidden` and `display:none` subtrees the way a
//! browser's computed text does, while [`ElementScript::TextContent`] sees
//! everything. The page records its navigation history and how often each
//! operation ran, so callers can assert on access patterns.

use async_trait::async_trait;
use parking_lot::Mutex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, VecDeque};
use url::Url;

use super::page::{BrowserPage, ElementHandle, ElementScript, HandleRegistry};
use crate::{ScraperError, ScraperResult};

const BLANK_DOCUMENT: &str = "<html><head></head><body></body></html>";

/// Position of a node as child indices from the document root. Stable across
/// re-parses of the same document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NodePath(Vec<usize>);

#[derive(Debug, Default)]
struct Route {
    versions: VecDeque<String>,
    expanded: Option<String>,
    fail_navigation: bool,
}

#[derive(Debug, Default)]
struct Counters {
    scripts: HashMap<ElementScript, usize>,
}

struct SnapshotState {
    routes: HashMap<String, Route>,
    current_url: Option<Url>,
    document: String,
    history: Vec<Url>,
}

pub struct SnapshotPage {
    state: Mutex<SnapshotState>,
    elements: HandleRegistry<NodePath>,
    counters: Mutex<Counters>,
}

impl Default for SnapshotPage {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotPage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SnapshotState {
                routes: HashMap::new(),
                current_url: None,
                document: BLANK_DOCUMENT.to_string(),
                history: Vec::new(),
            }),
            elements: HandleRegistry::new(),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_visits(url, vec![html])
    }

    /// Serves `versions` on successive visits to `url`, repeating the last.
    pub fn with_visits(self, url: &str, versions: Vec<&str>) -> Self {
        self.state.lock().routes.entry(route_key(url)).or_default().versions =
            versions.into_iter().map(str::to_string).collect();
        self
    }

    /// Document that replaces the current one for `url` after a click.
    pub fn with_expansion(self, url: &str, html: &str) -> Self {
        self.state
            .lock()
            .routes
            .entry(route_key(url))
            .or_default()
            .expanded = Some(html.to_string());
        self
    }

    /// Navigation to `url` reports an error but still loads its document.
    pub fn with_failing_navigation(self, url: &str) -> Self {
        self.state
            .lock()
            .routes
            .entry(route_key(url))
            .or_default()
            .fail_navigation = true;
        self
    }

    pub fn history(&self) -> Vec<Url> {
        self.state.lock().history.clone()
    }

    pub fn visits(&self, url: &str) -> usize {
        let key = route_key(url);
        self.state
            .lock()
            .history
            .iter()
            .filter(|visited| visited.as_str() == key)
            .count()
    }

    pub fn script_calls(&self, script: ElementScript) -> usize {
        self.counters
            .lock()
            .scripts
            .get(&script)
            .copied()
            .unwrap_or(0)
    }

    fn inspect<R>(&self, f: impl FnOnce(&Html) -> ScraperResult<R>) -> ScraperResult<R> {
        let document = self.state.lock().document.clone();
        let html = Html::parse_document(&document);
        f(&html)
    }

    fn inspect_element<R>(
        &self,
        element: ElementHandle,
        f: impl FnOnce(ElementRef<'_>) -> R,
    ) -> ScraperResult<R> {
        let path = self.elements.resolve(element)?;
        self.inspect(|html| {
            resolve_path(html, &path)
                .map(f)
                .ok_or(ScraperError::StaleElement)
        })
    }

    fn expand_current(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let expanded = state
            .current_url
            .as_ref()
            .and_then(|url| state.routes.get(url.as_str()))
            .and_then(|route| route.expanded.clone());
        if let Some(html) = expanded {
            state.document = html;
        }
    }
}

#[async_trait]
impl BrowserPage for SnapshotPage {
    async fn goto(&self, url: &Url) -> ScraperResult<()> {
        self.elements.invalidate();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.history.push(url.clone());
        state.current_url = Some(url.clone());

        let Some(route) = state.routes.get_mut(url.as_str()) else {
            state.document = BLANK_DOCUMENT.to_string();
            return Err(ScraperError::NavigationError(format!(
                "no snapshot recorded for {url}"
            )));
        };

        let html = if route.versions.len() > 1 {
            route.versions.pop_front()
        } else {
            route.versions.front().cloned()
        };
        state.document = html.unwrap_or_else(|| BLANK_DOCUMENT.to_string());

        if route.fail_navigation {
            return Err(ScraperError::NavigationError(format!(
                "timed out loading {url}"
            )));
        }
        Ok(())
    }

    async fn current_url(&self) -> ScraperResult<Url> {
        self.state
            .lock()
            .current_url
            .clone()
            .ok_or_else(|| ScraperError::NavigationError("no page loaded".to_string()))
    }

    async fn query_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> ScraperResult<Vec<ElementHandle>> {
        let scope = scope.map(|handle| self.elements.resolve(handle)).transpose()?;
        let paths = self.inspect(|html| {
            let selector = parse_selector(selector)?;
            match &scope {
                Some(path) => {
                    let root = resolve_path(html, path).ok_or(ScraperError::StaleElement)?;
                    Ok(root.select(&selector).map(node_path).collect::<Vec<_>>())
                }
                None => Ok(html.select(&selector).map(node_path).collect()),
            }
        })?;

        Ok(paths
            .into_iter()
            .map(|path| self.elements.register(path))
            .collect())
    }

    async fn rendered_text(&self, element: ElementHandle) -> ScraperResult<String> {
        self.inspect_element(element, visible_text)
    }

    async fn attribute(&self, element: ElementHandle, name: &str) -> ScraperResult<Option<String>> {
        self.inspect_element(element, |el| el.value().attr(name).map(str::to_string))
    }

    async fn run_script(
        &self,
        element: ElementHandle,
        script: ElementScript,
    ) -> ScraperResult<String> {
        *self.counters.lock().scripts.entry(script).or_insert(0) += 1;

        match script {
            ElementScript::TextContent => {
                self.inspect_element(element, |el| el.text().collect::<String>())
            }
            ElementScript::LeadingText => self.inspect_element(element, leading_text),
            ElementScript::ScrollIntoView => self.inspect_element(element, |_| String::new()),
            ElementScript::Click => {
                self.inspect_element(element, |_| ())?;
                self.expand_current();
                self.elements.invalidate();
                Ok(String::new())
            }
        }
    }
}

fn route_key(url: &str) -> String {
    Url::parse(url)
        .map(|parsed| parsed.to_string())
        .unwrap_or_else(|_| url.to_string())
}

fn parse_selector(selector: &str) -> ScraperResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ScraperError::SelectorError(format!("{selector}: {e:?}")))
}

fn node_path(element: ElementRef<'_>) -> NodePath {
    let mut indices = Vec::new();
    let mut current = *element;
    while let Some(parent) = current.parent() {
        indices.push(current.prev_siblings().count());
        current = parent;
    }
    indices.reverse();
    NodePath(indices)
}

fn resolve_path<'a>(html: &'a Html, path: &NodePath) -> Option<ElementRef<'a>> {
    let mut node = html.tree.root();
    for &index in &path.0 {
        node = node.children().nth(index)?;
    }
    ElementRef::wrap(node)
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let attrs = element.value();
    attrs.attr("hidden").is_some()
        || attrs
            .attr("style")
            .map(|style| {
                style
                    .replace(char::is_whitespace, "")
                    .to_ascii_lowercase()
                    .contains("display:none")
            })
            .unwrap_or(false)
}

fn visible_text(element: ElementRef<'_>) -> String {
    let hidden = is_hidden(element) || element.ancestors().filter_map(ElementRef::wrap).any(is_hidden);
    if hidden {
        return String::new();
    }

    let mut text = String::new();
    collect_visible(element, &mut text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_visible(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !is_hidden(child_element) {
                collect_visible(child_element, out);
            }
        }
    }
}

fn leading_text(element: ElementRef<'_>) -> String {
    match element.first_child() {
        Some(child) => match child.value().as_text() {
            Some(text) => text.trim().to_string(),
            None => ElementRef::wrap(child)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
        },
        None => String::new(),
    }
}
