//! Fan-out/fan-in detail fetch pipeline
//!
//! One task is spawned per candidate. Each task fetches the detail page,
//! runs the extractor, appends its record to a shared queue and then sends
//! exactly one completion signal. A single aggregator task counts the
//! signals. The caller only sees the queue once every task has been joined
//! and the aggregator has finished.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────┐
//!             ┌───▶│  task 1  │──┬──▶ ResultQueue (Mutex<Vec<NoticeRecord>>)
//! ┌─────────┐ │    └──────────┘  │
//! │candidates│─┼───▶   ...      ─┤
//! └─────────┘ │    ┌──────────┐  │
//!             └───▶│  task N  │──┴──▶ mpsc<TaskCompletion> ──▶ aggregator
//!                  └──────────┘
//!                                   barrier: join all tasks + aggregator
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use notice_watch::config::Config;
//! use notice_watch::crawler::fetcher::DetailFetcher;
//! use notice_watch::crawler::pipeline::{DetailPipeline, PipelineConfig};
//! use notice_watch::models::NoticeCandidate;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let fetcher = Arc::new(DetailFetcher::from_config(&config)?);
//! let pipeline = DetailPipeline::new(fetcher, PipelineConfig::from_config(&config, "me@example.com"));
//!
//! let report = pipeline.run(vec![NoticeCandidate::new(42, None)]).await;
//! println!("Collected {} records", report.records.len());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::Config;
use crate::crawler::fetcher::DetailSource;
use crate::models::{ExtractionStatus, NoticeCandidate, NoticeId, NoticeRecord, TaskCompletion};
use crate::parser::NoticeExtractor;
use crate::utils::error::FetchError;
use crate::utils::{format_bytes, truncate_text};

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum fetches in flight (0 = unbounded)
    pub max_concurrent_requests: usize,

    /// Timeout for a single detail request
    pub request_timeout: Duration,

    /// Deadline for the whole fetch phase
    pub run_deadline: Duration,

    /// Recipient stamped on every record
    pub recipient: String,
}

impl PipelineConfig {
    /// Build from crate configuration and a resolved recipient
    pub fn from_config(config: &Config, recipient: &str) -> Self {
        Self {
            max_concurrent_requests: config.crawler.max_concurrent_requests,
            request_timeout: config.request_timeout(),
            run_deadline: config.run_deadline(),
            recipient: recipient.to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 0,
            request_timeout: Duration::from_secs(30),
            run_deadline: Duration::from_secs(300),
            recipient: String::new(),
        }
    }
}

/// Records appended by concurrent tasks, drained once after the barrier
pub type ResultQueue = Arc<Mutex<Vec<NoticeRecord>>>;

// ============================================================================
// Pipeline Statistics
// ============================================================================

/// Pipeline statistics (thread-safe)
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Pages where the pattern matched
    pub extracted: AtomicU64,

    /// Pages fetched without a match
    pub no_match: AtomicU64,

    /// Fetches that failed or timed out
    pub fetch_failed: AtomicU64,

    /// Total bytes of decoded HTML
    pub bytes_fetched: AtomicU64,
}

impl PipelineStats {
    fn record(&self, status: &ExtractionStatus) {
        let counter = match status {
            ExtractionStatus::Extracted => &self.extracted,
            ExtractionStatus::NoMatch => &self.no_match,
            ExtractionStatus::FetchFailed(_) => &self.fetch_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_bytes(&self, bytes: u64) {
        self.bytes_fetched.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get snapshot of current stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            extracted: self.extracted.load(Ordering::Relaxed),
            no_match: self.no_match.load(Ordering::Relaxed),
            fetch_failed: self.fetch_failed.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub extracted: u64,
    pub no_match: u64,
    pub fetch_failed: u64,
    pub bytes_fetched: u64,
}

/// Everything the fetch phase produced
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Records in queue order (completion order)
    pub records: Vec<NoticeRecord>,

    /// Completion signals the aggregator observed
    pub completions: usize,

    /// Tasks spawned
    pub dispatched: usize,

    /// Per-status counters
    pub stats: StatsSnapshot,
}

impl PipelineReport {
    /// Highest id among the candidates this run processed
    pub fn max_id(&self) -> Option<NoticeId> {
        self.records.iter().map(|r| r.id).max()
    }
}

// ============================================================================
// Pipeline Implementation
// ============================================================================

/// Detail fetch pipeline for one run
pub struct DetailPipeline {
    source: Arc<dyn DetailSource>,
    extractor: NoticeExtractor,
    config: PipelineConfig,
    stats: Arc<PipelineStats>,
}

impl DetailPipeline {
    /// Create a pipeline over a detail source
    pub fn new(source: Arc<dyn DetailSource>, config: PipelineConfig) -> Self {
        Self {
            source,
            extractor: NoticeExtractor::new(),
            config,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// Run one fetch phase and wait for the barrier
    ///
    /// Never fails: per-notice problems become `FetchFailed` or `NoMatch`
    /// records. An empty candidate list returns immediately without
    /// spawning anything.
    pub async fn run(&self, candidates: Vec<NoticeCandidate>) -> PipelineReport {
        let total = candidates.len();
        if total == 0 {
            tracing::info!("No new notices, skipping fetch phase");
            return PipelineReport::default();
        }

        tracing::info!(
            total,
            max_concurrent = self.config.max_concurrent_requests,
            "Starting detail fetch pipeline"
        );

        let deadline = Instant::now() + self.config.run_deadline;
        let queue: ResultQueue = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let (done_tx, done_rx) = mpsc::channel::<TaskCompletion>(total);
        let semaphore = (self.config.max_concurrent_requests > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_concurrent_requests)));

        let aggregator = tokio::spawn(aggregate(done_rx, total));

        let mut tasks = JoinSet::new();
        for candidate in candidates {
            let source = Arc::clone(&self.source);
            let extractor = self.extractor;
            let stats = Arc::clone(&self.stats);
            let queue = Arc::clone(&queue);
            let done_tx = done_tx.clone();
            let semaphore = semaphore.clone();
            let recipient = self.config.recipient.clone();
            let request_timeout = self.config.request_timeout;

            tasks.spawn(async move {
                let id = candidate.id;
                let work = async {
                    let _permit = match semaphore {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    fetch_one(source.as_ref(), extractor, id, &recipient, request_timeout, &stats)
                        .await
                };

                let record = match timeout_at(deadline, work).await {
                    Ok(record) => record,
                    Err(_) => {
                        tracing::warn!(id, "Run deadline reached before detail fetch finished");
                        let record = NoticeRecord::fetch_failed(
                            id,
                            &recipient,
                            FetchError::DeadlineExceeded.to_string(),
                        );
                        stats.record(&record.status);
                        record
                    }
                };

                let completion = TaskCompletion::from(&record);
                queue.lock().await.push(record);

                if done_tx.send(completion).await.is_err() {
                    tracing::error!(id, "Aggregator gone before completion was reported");
                }
            });
        }

        // Only tasks hold senders now
        drop(done_tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Detail task did not complete");
            }
        }

        let completions = match aggregator.await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Aggregator task failed");
                0
            }
        };

        let records = match Arc::try_unwrap(queue) {
            Ok(queue) => queue.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.lock().await),
        };

        let stats = self.stats.snapshot();
        tracing::info!(
            dispatched = total,
            completions,
            records = records.len(),
            extracted = stats.extracted,
            no_match = stats.no_match,
            fetch_failed = stats.fetch_failed,
            bytes = %format_bytes(stats.bytes_fetched),
            "Detail fetch pipeline completed"
        );

        PipelineReport {
            records,
            completions,
            dispatched: total,
            stats,
        }
    }
}

/// Count completion signals until all `expected` arrived or every sender dropped
async fn aggregate(mut done_rx: mpsc::Receiver<TaskCompletion>, expected: usize) -> usize {
    let mut completed = 0usize;

    while completed < expected {
        match done_rx.recv().await {
            Some(completion) => {
                completed += 1;
                tracing::info!(
                    progress = %format!("{completed}/{expected}"),
                    status = completion.status.as_str(),
                    notice = %truncate_text(&completion.to_string(), 80),
                    "Notice fetched"
                );
            }
            None => {
                tracing::error!(
                    completed,
                    expected,
                    "Completion channel closed before every task reported"
                );
                break;
            }
        }
    }

    completed
}

async fn fetch_one(
    source: &dyn DetailSource,
    extractor: NoticeExtractor,
    id: NoticeId,
    recipient: &str,
    request_timeout: Duration,
    stats: &PipelineStats,
) -> NoticeRecord {
    let record = match timeout(request_timeout, source.fetch_detail(id)).await {
        Ok(Ok(html)) => {
            stats.record_bytes(html.len() as u64);
            let record = NoticeRecord::from_fields(id, extractor.extract(&html), recipient);
            if record.status == ExtractionStatus::NoMatch {
                tracing::warn!(id, "Detail page did not match the notice layout");
            }
            record
        }
        Ok(Err(e)) => {
            tracing::warn!(id, error = %e, "Detail fetch failed");
            NoticeRecord::fetch_failed(id, recipient, e.to_string())
        }
        Err(_) => {
            tracing::warn!(id, timeout_secs = request_timeout.as_secs(), "Detail fetch timed out");
            NoticeRecord::fetch_failed(id, recipient, FetchError::Timeout.to_string())
        }
    };

    stats.record(&record.status);
    record
}
