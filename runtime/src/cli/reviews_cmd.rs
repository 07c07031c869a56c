//! `harvest reviews <listing.csv>` — collect reviews for every listed place.

use crate::audit::logger::RunTrace;
use crate::cli::output::{self, Styled};
use crate::cli::progress;
use crate::config::CrawlConfig;
use crate::harvest::reviews::ReviewHarvester;
use crate::model::{Harvest, ReviewRecord};
use crate::renderer::chromium::ChromiumLauncher;
use crate::renderer::{Launcher, RenderContext};
use crate::session;
use crate::sink::{self, ReviewTarget};
use anyhow::{Context, Result};
use chrono::Local;
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

const STAGE: &str = "reviews";

/// Per-establishment result, for the summary.
#[derive(Debug, Serialize)]
struct Collected {
    name: String,
    url: String,
    reviews: usize,
    file: Option<String>,
    incomplete: Option<String>,
}

pub async fn run(config: &CrawlConfig, listing: &Path, limit: Option<usize>) -> Result<()> {
    let s = Styled::new();
    let mut targets = sink::read_listings(listing)?;
    if let Some(limit) = limit {
        targets.truncate(limit);
    }
    let date = Local::now().date_naive();
    let harvester = ReviewHarvester::new(config);
    let launcher = ChromiumLauncher::new(config.browser.clone());

    let mut trace = RunTrace::in_dir(&config.output_dir)?;
    info!(
        run_id = %trace.run_id(),
        listing = %listing.display(),
        places = targets.len(),
        "review harvest starting"
    );

    let spinner = progress::spinner("starting browser");
    let mut collected: Vec<Collected> = Vec::with_capacity(targets.len());
    let started = Instant::now();
    let total = targets.len();

    let outcome = visit_all(&launcher, &harvester, &targets, &spinner, |target, harvest| {
        let file = sink::write_reviews(&config.output_dir, &target.display_name, date, &harvest.items)
            .with_context(|| format!("writing reviews for {}", target.display_name))?;

        for skip in &harvest.skipped {
            let mut skip = skip.clone();
            skip.name.get_or_insert_with(|| target.display_name.clone());
            progress::note(
                &spinner,
                &format!("  {} {}: {}", s.warn_sym(), target.display_name, skip.reason),
            );
            note_trace(trace.skipped(STAGE, &skip, Some(&target.detail_url)));
        }
        if harvest.fatal.is_none() {
            note_trace(trace.ok(STAGE, None, &target.display_name, &target.detail_url));
        }

        collected.push(Collected {
            name: target.display_name.clone(),
            url: target.detail_url.clone(),
            reviews: harvest.items.len(),
            file: file.map(|p| p.display().to_string()),
            incomplete: harvest.skipped.first().map(|skip| skip.reason.clone()),
        });
        Ok(())
    })
    .await;
    spinner.finish_and_clear();

    if let Err(e) = &outcome {
        note_trace(trace.fatal(STAGE, &format!("{e:#}")));
    }

    print_summary(&s, &collected, total, started, outcome.as_ref().err());
    outcome
}

/// Harvest each target in a browser session of its own.
///
/// `each` sees every target that was reached, including the one whose
/// session failed; the first session-fatal error ends the batch.
async fn visit_all<F>(
    launcher: &dyn Launcher,
    harvester: &ReviewHarvester<'_>,
    targets: &[ReviewTarget],
    spinner: &ProgressBar,
    mut each: F,
) -> Result<()>
where
    F: FnMut(&ReviewTarget, &Harvest<ReviewRecord>) -> Result<()>,
{
    let total = targets.len();
    for (i, target) in targets.iter().enumerate() {
        spinner.set_message(format!("{}/{total} · {}", i + 1, target.display_name));
        let harvest = session::scoped(launcher, async |ctx: &mut dyn RenderContext| {
            harvester.harvest_reviews(ctx, &target.detail_url).await
        })
        .await?;

        each(target, &harvest)?;
        if let Some(fatal) = harvest.fatal {
            return Err(fatal.into());
        }
    }
    Ok(())
}

fn note_trace(result: Result<()>) {
    if let Err(e) = result {
        warn!("could not append to run trace: {e:#}");
    }
}

fn print_summary(
    s: &Styled,
    collected: &[Collected],
    total: usize,
    started: Instant,
    error: Option<&anyhow::Error>,
) {
    let reviews: usize = collected.iter().map(|c| c.reviews).sum();
    let files = collected.iter().filter(|c| c.file.is_some()).count();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "places": total,
            "visited": collected.len(),
            "reviews": reviews,
            "files": files,
            "results": collected,
            "error": error.map(|e| format!("{e:#}")),
        }));
        return;
    }
    if output::is_quiet() {
        return;
    }

    let elapsed = output::format_duration(started.elapsed().as_secs());
    eprintln!(
        "  {} {reviews} reviews from {}/{total} places in {elapsed}, {files} files written",
        s.ok_sym(),
        collected.len()
    );
    let incomplete = collected.iter().filter(|c| c.incomplete.is_some()).count();
    if incomplete > 0 {
        eprintln!("  {} {incomplete} places incomplete", s.warn_sym());
    }
    if let Some(e) = error {
        eprintln!("  {} stopped: {e:#}", s.fail_sym());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::fake::{FakeContext, FakeDetail, FakeLauncher};
    use std::sync::atomic::Ordering;

    const FIRST: &str = "https://map.naver.com/p/entry/place/1";
    const SECOND: &str = "https://map.naver.com/p/entry/place/2";

    fn target(name: &str, url: &str) -> ReviewTarget {
        ReviewTarget {
            display_name: name.to_string(),
            detail_url: url.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_target_gets_its_own_browser() {
        let launcher = FakeLauncher::sequence(vec![
            FakeContext::new(vec![]).with_detail(FIRST, FakeDetail::with_reviews(&["좋아요"])),
            FakeContext::new(vec![]).with_detail(SECOND, FakeDetail::with_reviews(&["맛있어요", "또 올게요"])),
        ]);
        let config = CrawlConfig::default();
        let harvester = ReviewHarvester::new(&config);
        let targets = [target("하나", FIRST), target("둘", SECOND)];

        let mut seen = Vec::new();
        visit_all(&launcher, &harvester, &targets, &ProgressBar::hidden(), |t, h| {
            seen.push((t.display_name.clone(), h.items.len(), h.skipped.len()));
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(seen, [("하나".to_string(), 1, 0), ("둘".to_string(), 2, 0)]);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_stops_batch() {
        let launcher = FakeLauncher::sequence(vec![
            FakeContext::new(vec![]).with_detail(FIRST, FakeDetail::with_reviews(&["좋아요"])),
        ]);
        let config = CrawlConfig::default();
        let harvester = ReviewHarvester::new(&config);
        let targets = [target("하나", FIRST), target("둘", SECOND), target("셋", SECOND)];

        let mut visited = 0;
        let err = visit_all(&launcher, &harvester, &targets, &ProgressBar::hidden(), |_, _| {
            visited += 1;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("browser binary not found"));
        assert_eq!(visited, 1);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }
}
