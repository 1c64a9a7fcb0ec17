//! One polling cycle
//!
//! A cycle owns every piece of per-run state: the loaded watermark, the
//! candidate list, the result queue and the dispatch reports. Nothing is
//! kept in globals, so two cycles can run side by side in tests.
//!
//! Order of operations:
//!
//! 1. resolve mail settings (fatal if incomplete, before any network I/O)
//! 2. load the watermark and build the dedup policy
//! 3. fetch the listing (fatal on failure)
//! 4. fan out detail fetches and wait for the barrier
//! 5. persist the highest candidate id
//! 6. dispatch notifications, paced

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{Config, SmtpSettings};
use crate::crawler::{
    DedupPolicy, DetailFetcher, DetailPipeline, DetailSource, ListFetcher, PipelineConfig,
};
use crate::error::Result;
use crate::models::CycleSummary;
use crate::notifications::{Dispatcher, Notifier, SmtpChannel};
use crate::storage::WatermarkStore;

/// One run of the monitor
pub struct PollCycle {
    config: Config,
    list: ListFetcher,
    source: Arc<dyn DetailSource>,
    notifier: Arc<dyn Notifier>,
    store: WatermarkStore,
    recipient: String,
    dry_run: bool,
}

impl PollCycle {
    /// Build a cycle with the SMTP channel and HTTP fetchers
    ///
    /// # Errors
    ///
    /// Fails if mail settings are incomplete or a client cannot be built
    pub fn from_config(config: Config) -> Result<Self> {
        let settings = config.mail.resolve()?;
        let notifier = Arc::new(SmtpChannel::new(&settings)?);
        Self::build(config, &settings, notifier)
    }

    /// Build a cycle that delivers through a custom notifier
    ///
    /// Mail settings are still required so that the recipient is known.
    pub fn with_notifier(config: Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let settings = config.mail.resolve()?;
        Self::build(config, &settings, notifier)
    }

    fn build(config: Config, settings: &SmtpSettings, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let list = ListFetcher::from_config(&config)?;
        let source = Arc::new(DetailFetcher::from_config(&config)?);
        let store = WatermarkStore::from_config(&config.dedup);

        Ok(Self {
            list,
            source,
            notifier,
            store,
            recipient: settings.recipient.clone(),
            dry_run: false,
            config,
        })
    }

    /// Fetch and extract, but neither send mail nor move the watermark
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Watermark store used by this cycle
    pub fn store(&self) -> &WatermarkStore {
        &self.store
    }

    /// Run one cycle now
    pub async fn run(&self) -> Result<CycleSummary> {
        self.run_at(Utc::now()).await
    }

    /// Run one cycle, judging the time window against `now`
    ///
    /// # Errors
    ///
    /// Only configuration and listing failures are returned. Per-notice
    /// problems end up in the summary.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let loaded = self.store.load();
        let policy = DedupPolicy::from_config(&self.config.dedup, loaded)?;

        tracing::info!(
            policy = ?self.config.dedup.policy,
            watermark = ?loaded,
            dry_run = self.dry_run,
            "Starting poll cycle"
        );

        let candidates = self.list.fetch_candidates(&policy, now).await?;
        if candidates.is_empty() {
            tracing::info!("No new notices");
            return Ok(CycleSummary::default());
        }

        let candidate_count = candidates.len();
        let highest = candidates.iter().map(|c| c.id).max();

        let pipeline = DetailPipeline::new(
            Arc::clone(&self.source),
            PipelineConfig::from_config(&self.config, &self.recipient),
        );
        let report = pipeline.run(candidates).await;

        let watermark = match highest {
            Some(_) if self.dry_run => {
                tracing::info!("Dry run, watermark left unchanged");
                None
            }
            Some(id) if policy.uses_watermark() => self.store.persist(id),
            _ => None,
        };

        let records = report.records.len();
        let dispatcher = Dispatcher::new(Arc::clone(&self.notifier), self.config.send_interval())
            .with_dry_run(self.dry_run);
        let dispatch = dispatcher.dispatch(report.records).await;

        let summary = CycleSummary {
            candidates: candidate_count,
            records,
            completions: report.completions,
            watermark,
            dispatch,
        };

        tracing::info!(
            candidates = summary.candidates,
            completions = summary.completions,
            sent = summary.count("sent"),
            skipped = summary.count("skipped_empty"),
            failed = summary.count("failed"),
            watermark = ?summary.watermark,
            "Poll cycle finished"
        );

        Ok(summary)
    }
}
