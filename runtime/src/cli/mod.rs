//! Command line for the `harvest` binary.

pub mod corpus_cmd;
pub mod doctor;
pub mod list_cmd;
pub mod output;
pub mod progress;
pub mod reviews_cmd;

use crate::config::CrawlConfig;
use crate::selectors::SelectorTable;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "Harvest map place listings and their user reviews")]
#[command(version)]
pub struct Cli {
    /// JSON config file (default: ~/.place-harvest/config.json if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON selector table overriding the built-in one
    #[arg(long, global = true)]
    pub selectors: Option<PathBuf>,

    /// Directory for listing, review, and trace files
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Path to the Chrome/Chromium binary
    #[arg(long, global = true)]
    pub chromium_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headful: bool,

    /// Launch Chromium with --no-sandbox
    #[arg(long, global = true)]
    pub no_sandbox: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress progress and summaries
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print machine-readable results on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk search results and write `<query>_list.csv`
    List {
        /// Free-text search, e.g. "강남 카페"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Stop after this many result pages
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Collect reviews for every place in a listing file
    Reviews {
        /// Listing CSV with storeName and url columns
        listing: PathBuf,
        /// Only visit the first N places
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the establishment → reviews map built from review files
    Corpus {
        /// Directory holding review files (default: output dir)
        dir: Option<PathBuf>,
    },

    /// Check that a browser can be found and launched
    Doctor,

    /// Print the effective site profile (selectors, URL pattern) as JSON
    Selectors,
}

impl Cli {
    /// Effective configuration: defaults < file < environment < flags.
    pub fn crawl_config(&self) -> Result<CrawlConfig> {
        let mut config = CrawlConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.selectors {
            config.site.selectors = SelectorTable::from_json_file(path)?;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(path) = &self.chromium_path {
            config.browser.chromium_path = Some(path.clone());
        }
        if self.headful {
            config.browser.headless = false;
        }
        if self.no_sandbox {
            config.browser.no_sandbox = true;
        }
        if let Command::List {
            max_pages: Some(n), ..
        } = &self.command
        {
            config.limits.max_pages = Some(*n);
        }
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    output::set_flags(output::OutputFlags {
        quiet: cli.quiet,
        json: cli.json,
    });
    let config = cli.crawl_config()?;

    match &cli.command {
        Command::List { query, .. } => list_cmd::run(&config, &query.join(" ")).await,
        Command::Reviews { listing, limit } => reviews_cmd::run(&config, listing, *limit).await,
        Command::Corpus { dir } => corpus_cmd::run(dir.as_deref().unwrap_or(&config.output_dir)),
        Command::Doctor => doctor::run(&config).await,
        Command::Selectors => {
            output::print_json(&serde_json::to_value(&config.site)?);
            Ok(())
        }
    }
}
