//! Throttled notification dispatch
//!
//! After the fetch barrier the collected records are drained once, in queue
//! order, and turned into one message each.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          Dispatcher          │
//! │  - skip empty records        │
//! │  - pace between sends        │
//! │  - contain send failures     │
//! └──────────────────────────────┘
//!                │
//!                ▼
//!         ┌─────────────┐
//!         │  Notifier   │  (SmtpChannel in production)
//!         └─────────────┘
//! ```

pub mod channels;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{DispatchOutcome, DispatchReport, NoticeRecord};
use crate::utils::truncate_text;

// Re-exports
pub use channels::{MailError, Notification, Notifier, SmtpChannel};

/// Sequential, paced sender for one run's records
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    send_interval: Duration,
    dry_run: bool,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(notifier: Arc<dyn Notifier>, send_interval: Duration) -> Self {
        Self {
            notifier,
            send_interval,
            dry_run: false,
        }
    }

    /// Log instead of sending
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether this dispatcher only logs
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Drain `records` in order, one notification per record
    ///
    /// Records without a title are skipped. After every send attempt the
    /// dispatcher sleeps for the send interval, unless nothing left in the
    /// queue will be sent. Send failures are logged and dispatch moves on.
    pub async fn dispatch(&self, records: Vec<NoticeRecord>) -> Vec<DispatchReport> {
        let total = records.len();
        let mut queue: VecDeque<NoticeRecord> = records.into();
        let mut reports = Vec::with_capacity(total);
        let mut position = 0usize;

        while let Some(record) = queue.pop_front() {
            position += 1;

            if record.is_extraction_failed() {
                tracing::warn!(
                    id = record.id,
                    status = record.status.as_str(),
                    "Notice has no title, not sending"
                );
                reports.push(DispatchReport {
                    id: record.id,
                    outcome: DispatchOutcome::SkippedEmpty,
                });
                continue;
            }

            let notification = Notification::from_record(&record);

            if self.dry_run {
                tracing::info!(
                    progress = %format!("{position}/{total}"),
                    id = record.id,
                    to = %notification.to,
                    subject = %notification.subject,
                    body = %truncate_text(&notification.body, 60),
                    "Dry run, would send notification"
                );
                reports.push(DispatchReport {
                    id: record.id,
                    outcome: DispatchOutcome::DryRun,
                });
                continue;
            }

            tracing::info!(
                progress = %format!("{position}/{total}"),
                id = record.id,
                channel = self.notifier.name(),
                subject = %notification.subject,
                "Sending notification"
            );

            let outcome = match self.notifier.send(&notification).await {
                Ok(()) => DispatchOutcome::Sent,
                Err(e) => {
                    tracing::error!(
                        id = record.id,
                        transient = e.is_transient(),
                        error = %e,
                        "Failed to send notification"
                    );
                    DispatchOutcome::Failed(e.to_string())
                }
            };
            reports.push(DispatchReport {
                id: record.id,
                outcome,
            });

            let more_to_send = queue.iter().any(|r| !r.is_extraction_failed());
            if more_to_send && !self.send_interval.is_zero() {
                tokio::time::sleep(self.send_interval).await;
            }
        }

        let sent = reports
            .iter()
            .filter(|r| r.outcome == DispatchOutcome::Sent)
            .count();
        tracing::info!(total, sent, "Dispatch finished");

        reports
    }
}
