//! HTML parsing and data extraction
//!
//! This module turns notice detail pages into structured fields.

pub mod notice;
pub mod sanitize;

// Re-export main extractor and helpers
pub use notice::{extract_notice, NoticeExtractor, NOTICE_PATTERN};
pub use sanitize::filter_html;
