use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;
use url::Url;

use eanscraper::core::config::{PageLimit, PageRange, ScrapeConfig};
use eanscraper::runner::{backfill_file, output_path_for, run_category};

#[derive(Debug, Parser)]
#[command(
    name = "eanscraper",
    version,
    about = "Collects EAN codes and prices from paginated category listings"
)]
struct Cli {
    /// Run the browser without a visible window.
    #[arg(long, global = true, default_value_t = false, env = "HEADLESS")]
    headless: bool,

    #[arg(long, global = true, value_name = "N", default_value_t = 2, env = "RETRY_ATTEMPTS")]
    retry_attempts: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape one or more categories into `.xlsx` or `.csv` files.
    Scrape {
        #[arg(
            long = "category",
            value_name = "URL",
            required = true,
            value_delimiter = ',',
            env = "CATEGORY_URLS"
        )]
        categories: Vec<Url>,

        #[arg(
            short,
            long,
            value_name = "FILE",
            default_value = "output/bol_products.xlsx",
            env = "OUTPUT_PATH"
        )]
        output: PathBuf,

        #[arg(long, value_name = "N", default_value_t = 1, env = "START_PAGE")]
        start_page: usize,

        /// Number of pages to scrape from the start page, or "all".
        #[arg(long, value_name = "N|all", default_value = "all", env = "MAX_PAGES")]
        max_pages: PageLimit,
    },
    /// Fill in missing EAN codes of an existing file.
    Backfill {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("chromiumoxide", log::LevelFilter::Warn)
        .filter_module("selectors", log::LevelFilter::Warn)
        .filter_module("html5ever", log::LevelFilter::Error)
        .init();

    let cli = Cli::parse();
    let base_config = ScrapeConfig::default()
        .with_retry_attempts(cli.retry_attempts)
        .with_headless(cli.headless);

    match cli.command {
        Command::Scrape {
            categories,
            output,
            start_page,
            max_pages,
        } => {
            let config = base_config.with_pages(PageRange::new(start_page.max(1), max_pages));
            config.validate().context("invalid scrape configuration")?;

            info!(
                "Scraping {} categories (start page {}, max pages {})",
                categories.len(),
                config.pages.start_page,
                config.pages.limit
            );

            for (index, category) in categories.iter().enumerate() {
                let path = output_path_for(&output, index, categories.len());
                info!(
                    "Category {}/{}: {} -> {}",
                    index + 1,
                    categories.len(),
                    category,
                    path.display()
                );

                match run_category(&config, category, &path).await {
                    Ok(report) if report.saved => {
                        info!("Category {} finished with {} products", category, report.records.len())
                    }
                    Ok(report) => warn!(
                        "Category {} ended in phase {} without saving",
                        category, report.phase
                    ),
                    Err(e) => error!("Category {} failed: {}", category, e),
                }
            }
        }
        Command::Backfill { input } => {
            base_config.validate().context("invalid scrape configuration")?;
            match backfill_file(&base_config, &input).await {
                Ok(updated) => info!("Backfill complete: {} rows updated", updated),
                Err(e) => error!("Backfilling {} failed: {}", input.display(), e),
            }
        }
    }

    Ok(())
}
