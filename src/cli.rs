//! Command-line interface definitions.
//!
//! One subcommand per pipeline stage; stages hand data to each other only
//! through the JSON files named here, so any stage can be re-run on its
//! own. Defaults reproduce the conventional file names, making the bare
//! subcommands chainable:
//!
//! ```sh
//! high_lakes lakes
//! high_lakes fetch-plants
//! high_lakes enrich
//! high_lakes flatten --input enriched_high_lakes_data.json
//! ```

use clap::{Parser, Subcommand};

/// Command-line arguments for the high-lakes pipeline.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape the county filter ids from the high-lakes listing page
    Counties {
        /// Output JSON file for the county id array
        #[arg(short, long, default_value = "county_ids.json")]
        output: String,
    },

    /// Scrape every county's paginated lake listing
    Lakes {
        /// Output JSON file for the lake records
        #[arg(short, long, default_value = "high_lakes.json")]
        output: String,

        /// Seconds to pause between listing page fetches
        #[arg(long, default_value_t = 1)]
        page_delay: u64,
    },

    /// Page through the statewide fish-plants open-data API
    FetchPlants {
        /// Output JSON file for the archive envelope
        #[arg(short, long, default_value = "wdfw_fish_plants.json")]
        output: String,

        /// Records requested per API page
        #[arg(long, default_value_t = 1000)]
        page_limit: usize,
    },

    /// Render each lake's detail page and scrape its stocking table
    ScrapePlants {
        /// Input JSON file of lake records
        #[arg(short, long, default_value = "high_lakes.json")]
        input: String,

        /// Output JSON file of lakes with their stocking rows attached
        #[arg(short, long, default_value = "all_lakes_data.json")]
        output: String,

        /// Concurrent fetch workers
        #[arg(short, long, default_value_t = 10)]
        workers: usize,

        /// Run each fetch as its own spawned task instead of a polled stream
        #[arg(long)]
        spawned: bool,

        /// Retries per lake after the first attempt
        #[arg(long, default_value_t = 5)]
        max_retries: usize,

        /// Initial retry backoff in seconds (doubles per retry)
        #[arg(long, default_value_t = 1)]
        base_delay: u64,

        /// Per-operation navigation/render-wait budget in seconds
        #[arg(long, default_value_t = 10)]
        render_timeout: u64,
    },

    /// Join lakes with API plant records by county and elevation
    Enrich {
        /// Input JSON file of lake records
        #[arg(long, default_value = "high_lakes.json")]
        lakes: String,

        /// Input JSON file of plant records (archive envelope or bare array)
        #[arg(long, default_value = "wdfw_fish_plants.json")]
        plants: String,

        /// Output JSON file of enriched lake records
        #[arg(short, long, default_value = "enriched_high_lakes_data.json")]
        output: String,
    },

    /// Denormalize lakes-with-plants into flat tabular rows
    Flatten {
        /// Input JSON file of lakes with plants
        #[arg(short, long, default_value = "all_lakes_data.json")]
        input: String,

        /// Output file; `.json` writes a JSON array instead of CSV
        #[arg(short, long, default_value = "high_lakes_plants.csv")]
        output: String,

        /// Event field holding the stock date to normalize
        #[arg(long, default_value = "Stock Date")]
        date_field: String,

        /// Leave stock dates exactly as scraped
        #[arg(long)]
        keep_raw_dates: bool,
    },
}
