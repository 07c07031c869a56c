//! `harvest list <query>` — walk the search results into a listing file.

use crate::audit::logger::RunTrace;
use crate::cli::output::{self, Styled};
use crate::cli::progress;
use crate::config::CrawlConfig;
use crate::harvest::list::ListHarvester;
use crate::harvest::{Event, Observer};
use crate::renderer::chromium::ChromiumLauncher;
use crate::renderer::RenderContext;
use crate::session;
use crate::sink::{self, ListingWriter};
use anyhow::{bail, Result};
use indicatif::ProgressBar;
use std::time::Instant;
use tracing::{info, warn};

const STAGE: &str = "list";

/// Streams every harvest event to the spinner, the listing file, and the trace.
struct ListObserver {
    spinner: ProgressBar,
    styled: Styled,
    writer: ListingWriter,
    trace: RunTrace,
}

impl Observer for ListObserver {
    fn on_event(&mut self, event: Event<'_>) {
        let traced = match event {
            Event::Page { page } => {
                self.spinner.set_message(format!("page {page}"));
                Ok(())
            }
            Event::Entry {
                page,
                index,
                total,
                name,
            } => {
                self.spinner
                    .set_message(format!("page {page} · entry {}/{total} · {name}", index + 1));
                Ok(())
            }
            Event::Emitted(record) => {
                if let Err(e) = self.writer.write(record) {
                    warn!("could not write listing row: {e:#}");
                }
                self.trace.ok(STAGE, None, &record.display_name, &record.detail_url)
            }
            Event::Skipped(skip) => {
                progress::note(
                    &self.spinner,
                    &format!(
                        "  {} page {} #{} {}: {}",
                        self.styled.warn_sym(),
                        skip.page,
                        skip.index + 1,
                        skip.name.as_deref().unwrap_or("?"),
                        skip.reason
                    ),
                );
                self.trace.skipped(STAGE, skip, None)
            }
            Event::Fatal(err) => self.trace.fatal(STAGE, &err.to_string()),
        };
        if let Err(e) = traced {
            warn!("could not append to run trace: {e:#}");
        }
    }
}

pub async fn run(config: &CrawlConfig, query: &str) -> Result<()> {
    let s = Styled::new();
    let start_url = config.site.search_url(query)?;
    let path = config.output_dir.join(sink::listing_file_name(query));
    let harvester = ListHarvester::new(config)?;
    let launcher = ChromiumLauncher::new(config.browser.clone());

    let trace = RunTrace::in_dir(&config.output_dir)?;
    info!(run_id = %trace.run_id(), %query, url = %start_url, "list harvest starting");

    let spinner = progress::spinner(&format!("opening search for {query}"));
    let mut observer = ListObserver {
        spinner: spinner.clone(),
        styled: s,
        writer: ListingWriter::create(&path)?,
        trace,
    };

    let started = Instant::now();
    let result = session::scoped(&launcher, async |ctx: &mut dyn RenderContext| {
        harvester
            .harvest_all(ctx, start_url.as_str(), &mut observer)
            .await
    })
    .await;
    spinner.finish_and_clear();
    let elapsed = output::format_duration(started.elapsed().as_secs());

    let harvest = match result {
        Ok(harvest) => harvest,
        Err(e) => {
            if let Err(te) = observer.trace.fatal(STAGE, &e.to_string()) {
                warn!("could not append to run trace: {te:#}");
            }
            if !output::is_quiet() {
                eprintln!("  {} {e}", s.fail_sym());
                eprintln!(
                    "    {} rows kept in {}",
                    observer.writer.rows(),
                    observer.writer.path().display()
                );
            }
            return Err(e.into());
        }
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "query": query,
            "file": path.display().to_string(),
            "records": harvest.items.len(),
            "skipped": harvest.skipped,
            "fatal": harvest.fatal.as_ref().map(|e| e.to_string()),
            "run_id": observer.trace.run_id().to_string(),
        }));
    } else if !output::is_quiet() {
        eprintln!(
            "  {} {} listings in {elapsed} → {}",
            s.ok_sym(),
            harvest.items.len(),
            path.display()
        );
        if !harvest.skipped.is_empty() {
            eprintln!(
                "  {} {} entries skipped (see {})",
                s.warn_sym(),
                harvest.skipped.len(),
                observer.trace.path().display()
            );
        }
    }

    if let Some(fatal) = harvest.fatal {
        if !output::is_quiet() {
            eprintln!("  {} {fatal}", s.fail_sym());
        }
        bail!("list harvest aborted: {fatal}");
    }
    Ok(())
}
