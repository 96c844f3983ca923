//! # High Lakes
//!
//! A scraping pipeline for Washington's high-lakes fishery data. It
//! enumerates lakes from the WDFW listing, pulls statewide fish-plant
//! records from the open-data API, scrapes each lake's dynamically
//! rendered stocking table through a headless browser, merges the
//! datasets by county and elevation, and flattens the result for
//! tabular export.
//!
//! ## Architecture
//!
//! Each subcommand is one independent stage; stages hand data to each
//! other only through JSON files on disk:
//! 1. **counties / lakes**: Discover county ids, then enumerate each
//!    county's paginated lake listing
//! 2. **fetch-plants**: Page through the fish-plants open-data API
//! 3. **scrape-plants**: Render every lake page and scrape its stocking
//!    table (bounded worker pool, per-lake retry with backoff)
//! 4. **enrich / flatten**: Join the two datasets by county + elevation,
//!    then denormalize to one row per stocking event
//!
//! ## Usage
//!
//! ```sh
//! high_lakes lakes
//! high_lakes scrape-plants -w 10
//! high_lakes flatten
//! ```

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod dispatch;
mod fetch;
mod flatten;
mod merge;
mod models;
mod outputs;
mod render;
mod scrapers;
mod utils;

use cli::{Cli, Command};
use dispatch::{DispatcherConfig, OutcomeKind, PoolStrategy, TracingObserver};
use fetch::RetryPolicy;
use models::{Lake, PlantsInput};
use render::BrowserRenderer;
use scrapers::stocking::{STOCKING_READY_SELECTOR, StockingFetcher};
use scrapers::{listing, plants_api};
use utils::{ensure_writable_dir, parent_dir};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("high_lakes starting up");

    let args = Cli::parse();

    match args.command {
        Command::Counties { output } => run_counties(&output).await?,
        Command::Lakes { output, page_delay } => {
            run_lakes(&output, Duration::from_secs(page_delay)).await?
        }
        Command::FetchPlants { output, page_limit } => run_fetch_plants(&output, page_limit).await?,
        Command::ScrapePlants {
            input,
            output,
            workers,
            spawned,
            max_retries,
            base_delay,
            render_timeout,
        } => {
            let config = DispatcherConfig {
                workers,
                strategy: if spawned {
                    PoolStrategy::Spawned
                } else {
                    PoolStrategy::InFlight
                },
                retry: RetryPolicy {
                    max_retries,
                    base_delay: Duration::from_secs(base_delay),
                    ..RetryPolicy::default()
                },
            };
            run_scrape_plants(&input, &output, config, Duration::from_secs(render_timeout)).await?
        }
        Command::Enrich {
            lakes,
            plants,
            output,
        } => run_enrich(&lakes, &plants, &output).await?,
        Command::Flatten {
            input,
            output,
            date_field,
            keep_raw_dates,
        } => run_flatten(&input, &output, &date_field, keep_raw_dates).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Scrape the county filter ids and save them.
async fn run_counties(output: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let county_ids = listing::county_ids().await?;
    if county_ids.is_empty() {
        error!("No county ids found on the listing page");
        return Err("no county ids found".into());
    }

    outputs::json::write(output, &county_ids).await?;
    info!(count = county_ids.len(), path = output, "Saved county ids");
    Ok(())
}

/// Enumerate every county's lakes and save the combined listing.
async fn run_lakes(output: &str, page_delay: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
    ensure_writable_dir(&parent_dir(output)).await?;

    let county_ids = listing::county_ids().await?;
    if county_ids.is_empty() {
        error!("No county ids found on the listing page");
        return Err("no county ids found".into());
    }

    let mut lakes: Vec<Lake> = Vec::new();
    for county_id in &county_ids {
        let county_lakes = listing::lakes_for_county(county_id, page_delay).await;
        lakes.extend(county_lakes);
    }

    info!(
        counties = county_ids.len(),
        count = lakes.len(),
        "Scraped lakes across all counties"
    );
    outputs::json::write(output, &lakes).await?;
    Ok(())
}

/// Pull the full fish-plants dataset and save it with its envelope.
async fn run_fetch_plants(output: &str, page_limit: usize) -> Result<(), Box<dyn Error + Send + Sync>> {
    let records = plants_api::fetch_all(page_limit).await?;
    let archive = plants_api::archive(records);

    outputs::json::write(output, &archive).await?;
    info!(count = archive.data.len(), path = output, "Saved fish plants archive");
    Ok(())
}

/// Scrape every lake's stocking table through the dispatcher.
async fn run_scrape_plants(
    input: &str,
    output: &str,
    config: DispatcherConfig,
    render_timeout: Duration,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    ensure_writable_dir(&parent_dir(output)).await?;

    let lakes: Vec<Lake> = outputs::json::load(input).await?;
    let total = lakes.len();
    info!(count = total, "Loaded lakes to scrape");

    let renderer = BrowserRenderer::new(render_timeout, STOCKING_READY_SELECTOR);
    let fetcher = Arc::new(StockingFetcher::new(renderer));

    let results = dispatch::run_all(fetcher, lakes, &config, Arc::new(TracingObserver)).await;

    let mut stocked = 0usize;
    let mut empty = 0usize;
    let mut failed = 0usize;
    let mut scraped: Vec<Lake> = Vec::with_capacity(results.len());
    for result in results {
        match result.outcome.kind() {
            OutcomeKind::Fetched => stocked += 1,
            OutcomeKind::NoContent => empty += 1,
            OutcomeKind::GaveUp => failed += 1,
        }
        let mut lake = result.item;
        lake.plants = result.outcome.into_rows();
        scraped.push(lake);
    }

    info!(
        total,
        stocked,
        empty,
        failed,
        "Processed lakes"
    );
    if failed > 0 {
        warn!(failed, "Some lakes kept an empty result after retries");
    }

    outputs::json::write(output, &scraped).await?;
    Ok(())
}

/// Join lakes with the plants dataset and save the enriched records.
async fn run_enrich(
    lakes_path: &str,
    plants_path: &str,
    output: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut lakes: Vec<Lake> = outputs::json::load(lakes_path).await?;
    let plants: PlantsInput = outputs::json::load(plants_path).await?;

    let index = merge::build_event_index(plants.into_records());
    let report = merge::enrich(&mut lakes, &index);
    info!(
        matched = report.matched,
        total = report.total,
        "Enriched lakes with plant records"
    );

    outputs::json::write(output, &lakes).await?;
    Ok(())
}

/// Flatten lakes-with-plants to tabular rows and save CSV or JSON.
async fn run_flatten(
    input: &str,
    output: &str,
    date_field: &str,
    keep_raw_dates: bool,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let lakes: Vec<Lake> = outputs::json::load(input).await?;

    let mut rows = flatten::flatten(&lakes);
    if !keep_raw_dates {
        let unparsed = flatten::normalize_dates(&mut rows, date_field);
        if unparsed > 0 {
            warn!(unparsed, field = date_field, "Some stock dates passed through unnormalized");
        }
    }

    if output.ends_with(".json") {
        outputs::json::write(output, &rows).await?;
    } else {
        outputs::csv::write(output, &rows)?;
    }

    info!(lakes = lakes.len(), rows = rows.len(), path = output, "Flattened output written");
    Ok(())
}
