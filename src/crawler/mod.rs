//! Notice board crawling
//!
//! The listing client finds new notices, the detail pipeline fetches and
//! extracts them concurrently.

pub mod dedup;
pub mod fetcher;
pub mod headers;
pub mod list;
pub mod pipeline;

pub use dedup::DedupPolicy;
pub use fetcher::{DetailFetcher, DetailSource};
pub use list::ListFetcher;
pub use pipeline::{DetailPipeline, PipelineConfig, PipelineReport};
