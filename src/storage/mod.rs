//! Run-to-run persistence
//!
//! The only state that survives a run is the watermark.

pub mod watermark;

pub use watermark::WatermarkStore;
