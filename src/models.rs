//! Core data structures for notice-watch
//!
//! This module defines the data types that flow through one polling cycle:
//! listing candidates, extracted records, task completions and dispatch
//! outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Notice identifier as issued by the listing API
pub type NoticeId = i64;

/// A listing entry that has passed the dedup policy
///
/// Produced by the list fetcher and consumed, one per task, by the detail
/// pipeline. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeCandidate {
    /// Notice id
    pub id: NoticeId,

    /// Raw `addtime` value from the listing, if present
    pub add_time: Option<String>,
}

impl NoticeCandidate {
    /// Create a candidate
    pub fn new(id: NoticeId, add_time: Option<String>) -> Self {
        Self { id, add_time }
    }
}

/// How a record's fields came to be
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExtractionStatus {
    /// The structural pattern matched at least once
    Extracted,
    /// The page was fetched but the pattern never matched
    #[default]
    NoMatch,
    /// The detail page could not be fetched
    FetchFailed(String),
}

impl ExtractionStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::NoMatch => "no_match",
            Self::FetchFailed(_) => "fetch_failed",
        }
    }
}

/// Fields pulled from one detail page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub title: String,
    pub signed_time: String,
    pub author: String,
    pub body_text: String,
}

impl ExtractedFields {
    /// True when the pattern produced nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.signed_time.is_empty()
            && self.author.is_empty()
            && self.body_text.is_empty()
    }
}

/// One notice ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeRecord {
    /// Source notice id
    pub id: NoticeId,

    /// Notice title (empty on extraction failure)
    pub title: String,

    /// Signing timestamp as printed on the page
    pub signed_time: String,

    /// Second signing line, usually the issuing office
    pub author: String,

    /// Cleaned body text
    pub body_text: String,

    /// Mail recipient
    pub recipient: String,

    /// How the fields were obtained
    pub status: ExtractionStatus,
}

impl NoticeRecord {
    /// Build a record from extracted fields
    pub fn from_fields(id: NoticeId, fields: ExtractedFields, recipient: &str) -> Self {
        let status = if fields.is_empty() {
            ExtractionStatus::NoMatch
        } else {
            ExtractionStatus::Extracted
        };

        Self {
            id,
            title: fields.title,
            signed_time: fields.signed_time,
            author: fields.author,
            body_text: fields.body_text,
            recipient: recipient.to_string(),
            status,
        }
    }

    /// Build an empty record for a notice whose page could not be fetched
    pub fn fetch_failed(id: NoticeId, recipient: &str, reason: impl Into<String>) -> Self {
        Self {
            id,
            title: String::new(),
            signed_time: String::new(),
            author: String::new(),
            body_text: String::new(),
            recipient: recipient.to_string(),
            status: ExtractionStatus::FetchFailed(reason.into()),
        }
    }

    /// Extraction failed when there is no title to send
    pub fn is_extraction_failed(&self) -> bool {
        self.title.is_empty()
    }

    /// Mail subject: title followed by the bracketed signed time
    pub fn subject(&self) -> String {
        format!("{}[{}]", self.title, self.signed_time)
    }
}

/// Completion signal sent by every fetch task exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion {
    pub id: NoticeId,
    pub title: String,
    pub signed_time: String,
    pub status: ExtractionStatus,
}

impl From<&NoticeRecord> for TaskCompletion {
    fn from(record: &NoticeRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            signed_time: record.signed_time.clone(),
            status: record.status.clone(),
        }
    }
}

impl fmt::Display for TaskCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.id, self.title, self.signed_time)
    }
}

/// What happened to one record during dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    /// Notification handed to the mail server
    Sent,
    /// Not sent because extraction produced no title
    SkippedEmpty,
    /// Send attempted and failed
    Failed(String),
    /// Would have been sent, but the run is a dry run
    DryRun,
}

impl DispatchOutcome {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::SkippedEmpty => "skipped_empty",
            Self::Failed(_) => "failed",
            Self::DryRun => "dry_run",
        }
    }
}

/// Per-record dispatch result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub id: NoticeId,
    pub outcome: DispatchOutcome,
}

/// Summary of one polling cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Candidates that passed the dedup policy
    pub candidates: usize,

    /// Records collected by the detail pipeline
    pub records: usize,

    /// Completion signals observed by the aggregator
    pub completions: usize,

    /// Watermark written at the end of the fetch phase
    pub watermark: Option<NoticeId>,

    /// One entry per dispatched record, in dispatch order
    pub dispatch: Vec<DispatchReport>,
}

impl CycleSummary {
    /// Count records with a given outcome kind
    pub fn count(&self, outcome: &str) -> usize {
        self.dispatch
            .iter()
            .filter(|r| r.outcome.as_str() == outcome)
            .count()
    }

    /// Whether the run found nothing to do
    pub fn is_idle(&self) -> bool {
        self.candidates == 0
    }
}
