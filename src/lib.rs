//! notice-watch - property notice board monitor
//!
//! Polls a notice board's listing API, fetches the detail page of every new
//! notice concurrently, extracts title, signing time, author and body, and
//! mails each notice out with a pause between sends.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Listing client, dedup policy and the detail fetch pipeline
//! - [`parser`] - Notice extraction and text cleaning
//! - [`storage`] - Watermark persistence
//! - [`notifications`] - Paced dispatch and the SMTP channel
//! - [`cycle`] - One polling run wiring everything together
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use notice_watch::config::Config;
//! use notice_watch::cycle::PollCycle;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let summary = PollCycle::from_config(config)?.run().await?;
//!     println!("{} new notices", summary.candidates);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod cycle;
pub mod error;
pub mod models;
pub mod notifications;
pub mod parser;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{DedupPolicy, DetailPipeline, ListFetcher};
    pub use crate::cycle::PollCycle;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{CycleSummary, DispatchOutcome, NoticeCandidate, NoticeRecord};
    pub use crate::notifications::{Dispatcher, Notification, Notifier};
    pub use crate::storage::WatermarkStore;
}

// Direct re-exports for convenience
pub use models::{CycleSummary, NoticeCandidate, NoticeRecord};
