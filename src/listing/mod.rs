pub mod collector;
pub mod pagination;

use std::collections::HashSet;
use url::Url;

pub use collector::{collect_all_product_urls, collect_product_urls};
pub use pagination::resolve_page_urls;

/// Insertion-ordered set of URLs.
#[derive(Debug, Clone, Default)]
pub struct OrderedUrlSet {
    seen: HashSet<String>,
    urls: Vec<Url>,
}

impl OrderedUrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: Url) -> bool {
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        self.urls.push(url);
        true
    }

    pub fn extend<I: IntoIterator<Item = Url>>(&mut self, urls: I) {
        for url in urls {
            self.insert(url);
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_vec(self) -> Vec<Url> {
        self.urls
    }
}

/// Drops query string and fragment.
pub(crate) fn strip_query(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped
}
