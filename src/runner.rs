use log::{error, info};
use std::path::{Path, PathBuf};
use url::Url;

use crate::browser::ChromeSession;
use crate::core::config::ScrapeConfig;
use crate::core::{backfill_missing_codes, CrawlReport, Crawler};
use crate::storage::DatasetFile;
use crate::{ScraperError, ScraperResult};

/// Scrapes one category in its own browser session and saves the result to
/// `output`. The session is closed on every path.
pub async fn run_category(
    config: &ScrapeConfig,
    category_url: &Url,
    output: &Path,
) -> ScraperResult<CrawlReport> {
    config.validate()?;

    let session = ChromeSession::launch(&config.browser, &config.timings).await?;
    let result = async {
        let page = session.open_page().await?;
        let crawler = Crawler::new(&page, config)?;
        let storage = DatasetFile::open(output);
        Ok::<_, ScraperError>(crawler.run(category_url, &storage).await)
    }
    .await;

    if let Err(e) = session.close().await {
        error!("Closing the browser failed: {}", e);
    }
    result
}

/// Fills in missing codes of a previously written dataset file. The file is
/// only rewritten when at least one row changed. Returns the number of
/// updated rows. A file that does not exist is logged and leaves nothing to
/// do.
pub async fn backfill_file(config: &ScrapeConfig, path: &Path) -> ScraperResult<usize> {
    if !path.exists() {
        error!("File not found: {}", path.display());
        return Ok(0);
    }

    let storage = DatasetFile::open(path);
    let mut records = storage.load()?;

    let missing = records.iter().filter(|record| !record.has_code()).count();
    if missing == 0 {
        info!("No rows without EAN in {}", path.display());
        return Ok(0);
    }
    info!("Found {} rows without EAN in {}", missing, path.display());

    let session = ChromeSession::launch(&config.browser, &config.timings).await?;
    let result = async {
        let page = session.open_page().await?;
        backfill_missing_codes(&page, config, &mut records).await
    }
    .await;

    if let Err(e) = session.close().await {
        error!("Closing the browser failed: {}", e);
    }

    let updated = result?;
    if updated > 0 {
        storage.write_records(&records)?;
        info!("Rewrote {} with {} new EAN codes", path.display(), updated);
    } else {
        info!("No EAN codes recovered, {} left unchanged", path.display());
    }
    Ok(updated)
}

/// Output file of the `index`-th (0-based) of `total` categories. A single
/// category writes to `base` itself. Without an extension the files are
/// workbooks.
pub fn output_path_for(base: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "products".to_string());
    let extension = base
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xlsx".to_string());

    base.with_file_name(format!("{}_category_{}.{}", stem, index + 1, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_category_keeps_path() {
        let base = Path::new("output/products.csv");
        assert_eq!(output_path_for(base, 0, 1), PathBuf::from("output/products.csv"));
    }

    #[test]
    fn test_multiple_categories_get_numbered_files() {
        let base = Path::new("output/products.csv");
        assert_eq!(
            output_path_for(base, 0, 3),
            PathBuf::from("output/products_category_1.csv")
        );
        assert_eq!(
            output_path_for(base, 2, 3),
            PathBuf::from("output/products_category_3.csv")
        );
    }

    #[test]
    fn test_missing_extension_defaults_to_xlsx() {
        let base = Path::new("results");
        assert_eq!(
            output_path_for(base, 1, 2),
            PathBuf::from("results_category_2.xlsx")
        );
    }

    #[tokio::test]
    async fn test_backfill_complete_file_needs_no_browser() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("products.csv");
        std::fs::write(
            &path,
            "Product URL,EAN,Price\nhttps://www.bol.com/nl/nl/p/a/1/,12345678,9.99\n",
        )
        .unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let updated = backfill_file(&ScrapeConfig::default(), &path).await.unwrap();

        assert_eq!(updated, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_backfill_missing_file_is_a_no_op() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bol_products.xlsx");

        let updated = backfill_file(&ScrapeConfig::default(), &path).await.unwrap();

        assert_eq!(updated, 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_backfill_complete_workbook_needs_no_browser() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("products.xlsx");
        let file = DatasetFile::open(&path);
        file.write_records(&[crate::core::types::ProductRecord::new(
            Url::parse("https://www.bol.com/nl/nl/p/a/1/").unwrap(),
            Some("08718468778".to_string()),
            None,
        )])
        .unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        let updated = backfill_file(&ScrapeConfig::default(), &path).await.unwrap();

        assert_eq!(updated, 0);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }
}
