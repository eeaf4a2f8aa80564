use log::{debug, warn};
use url::Url;

use super::strip_query;
use crate::browser::BrowserPage;
use crate::core::config::SiteProfile;
use crate::ScraperResult;

/// URLs of every listing page of the category currently loaded in `page`.
///
/// The pagination control collapses middle pages behind an ellipsis, so the
/// highest page index is read from the control and the intermediate URLs are
/// synthesized. Page 1 is the bare base URL. If the control cannot be read,
/// only the current page is returned.
pub async fn resolve_page_urls<P: BrowserPage + ?Sized>(
    page: &P,
    site: &SiteProfile,
) -> Vec<Url> {
    let base = match page.current_url().await {
        Ok(url) => strip_query(&url),
        Err(e) => {
            warn!("Could not read the current page URL: {}", e);
            return Vec::new();
        }
    };

    match max_page(page, site, &base).await {
        Ok(max) => page_urls(&base, &site.page_param, max),
        Err(e) => {
            warn!("Error extracting pagination: {}", e);
            vec![base]
        }
    }
}

async fn max_page<P: BrowserPage + ?Sized>(
    page: &P,
    site: &SiteProfile,
    base: &Url,
) -> ScraperResult<usize> {
    let Some(control) = page.query(None, &site.pagination_selector).await? else {
        debug!("No pagination control, assuming a single page");
        return Ok(1);
    };
    let Some(list) = page.query(Some(control), "ul").await? else {
        return Ok(1);
    };
    let items = page.query_all(Some(list), "li").await?;

    // The highest page link is rendered last.
    for item in items.into_iter().rev() {
        let link = match page.query(Some(item), "a").await {
            Ok(Some(link)) => link,
            Ok(None) => continue,
            Err(e) => {
                debug!("Skipping pagination item: {}", e);
                continue;
            }
        };
        let Ok(Some(href)) = page.attribute(link, "href").await else {
            continue;
        };
        if let Some(index) = page_index(base, &href, &site.page_param) {
            return Ok(index);
        }
    }

    Ok(1)
}

fn page_index(base: &Url, href: &str, page_param: &str) -> Option<usize> {
    let target = base.join(href).ok()?;
    target
        .query_pairs()
        .find(|(key, _)| key == page_param)
        .and_then(|(_, value)| value.parse::<usize>().ok())
}

fn page_urls(base: &Url, page_param: &str, max_page: usize) -> Vec<Url> {
    let mut urls = vec![base.clone()];
    for index in 2..=max_page {
        let mut url = base.clone();
        url.set_query(Some(&format!("{page_param}={index}")));
        urls.push(url);
    }
    urls
}
