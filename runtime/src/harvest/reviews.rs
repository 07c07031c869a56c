//! Detail review harvester — collect every review on one place page.
//!
//! Each call starts from a fresh navigation, so it can be repeated for the
//! same URL and shares nothing with other calls. Failing to reach the
//! reviews section is not an error: whatever was gathered is returned.

use crate::config::CrawlConfig;
use crate::error::{CrawlError, CrawlResult};
use crate::extraction::loader::{drain, expand_each, DrainPolicy, MoreButton};
use crate::extraction::text;
use crate::model::{Harvest, ReviewRecord, Skip};
use crate::navigation::{frames, wait};
use crate::renderer::RenderContext;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub struct ReviewHarvester<'a> {
    config: &'a CrawlConfig,
}

impl<'a> ReviewHarvester<'a> {
    pub fn new(config: &'a CrawlConfig) -> Self {
        Self { config }
    }

    pub async fn harvest_reviews(
        &self,
        context: &mut dyn RenderContext,
        detail_url: &str,
    ) -> Harvest<ReviewRecord> {
        let mut harvest = Harvest::default();

        if let Err(e) = self.open_reviews(context, detail_url).await {
            self.absorb(&mut harvest, detail_url, e);
            return harvest;
        }

        if let Err(e) = self.reveal_all(context).await {
            self.absorb(&mut harvest, detail_url, e);
            if harvest.fatal.is_some() {
                return harvest;
            }
        }

        let site = &self.config.site;
        match context.texts(&site.selectors.review_body).await {
            Ok(raw) => {
                let found = raw.len();
                harvest.items = text::to_records(raw, &site.noise_markers, &site.collapse_label);
                info!(
                    url = detail_url,
                    nodes = found,
                    reviews = harvest.items.len(),
                    "reviews collected"
                );
            }
            Err(e) => self.absorb(&mut harvest, detail_url, e),
        }
        harvest
    }

    /// Enter the detail frame and activate the reviews tab.
    async fn open_reviews(
        &self,
        context: &mut dyn RenderContext,
        detail_url: &str,
    ) -> CrawlResult<()> {
        let t = &self.config.timeouts;
        let table = &self.config.site.selectors;

        context.navigate(detail_url, t.navigation).await?;
        frames::enter_context(context, &table.detail_frame, t.detail_attach, t.poll_interval)
            .await?;
        wait::until_present(context, &table.reviews_tab, t.reviews_tab_wait, t.poll_interval)
            .await?;
        context.click_at(&table.reviews_tab, 0, None).await?;
        sleep(t.tab_settle).await;
        Ok(())
    }

    /// Load every review behind "more" and expand the collapsed ones.
    async fn reveal_all(&self, context: &dyn RenderContext) -> CrawlResult<()> {
        let t = &self.config.timeouts;
        let table = &self.config.site.selectors;

        let mut reveal = MoreButton {
            control: table.more_reviews.clone(),
            items: table.review_body.clone(),
            wait: t.more_control_wait,
            poll: t.poll_interval,
        };
        let policy = DrainPolicy {
            max_iterations: self.config.limits.max_review_rounds,
            settle: t.more_settle,
        };
        let drained = drain(context, &mut reveal, policy).await?;
        debug!(rounds = drained.iterations, stop = ?drained.stop, "review list drained");

        let expanded = expand_each(context, &table.review_expand, t.expand_settle).await?;
        if expanded.failed > 0 {
            debug!(
                failed = expanded.failed,
                of = expanded.found,
                "some reviews stayed collapsed"
            );
        }
        sleep(t.final_settle).await;
        Ok(())
    }

    fn absorb(&self, harvest: &mut Harvest<ReviewRecord>, detail_url: &str, err: CrawlError) {
        if err.is_fatal() {
            error!(url = detail_url, "review harvest aborted: {err}");
            harvest.fatal = Some(err);
            return;
        }
        warn!(url = detail_url, tier = ?err.tier(), "reviews incomplete: {err}");
        harvest.skipped.push(Skip::new(0, 0, None, &err));
    }
}
