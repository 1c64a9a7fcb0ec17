//! Notice detail page extraction
//!
//! The detail page is server-rendered for a mobile web view and has a rigid
//! layout: a centered title block holding a bold title and three `signTime`
//! spans (signed time, a `&nbsp;` spacer, author), followed by the
//! `notice-content` container. A single regular expression captures all four
//! fields, which is more robust here than a DOM walk because the page is not
//! well-formed HTML.

use regex::Regex;
use std::sync::LazyLock;

use super::sanitize::filter_html;
use crate::models::ExtractedFields;

/// Structural pattern for one notice block
///
/// Captures: 1 = title, 2 = signed time, 3 = author, 4 = raw body.
pub const NOTICE_PATTERN: &str = concat!(
    r#"(?s)<div style="text-align:center; width:100%;" class="noticeTitle">"#,
    r#".*?<div><b>(.*?)</b></div>"#,
    r#".*?<span class="signTime">(.*?)</span>"#,
    r#".*?<span class="signTime">&nbsp;</span>"#,
    r#".*?<span class="signTime">(.*?)</span>"#,
    r#".*?</div>"#,
    r#".*?<div class="notice-content" style="width:100%;">(.*?)</div>"#,
);

static NOTICE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(NOTICE_PATTERN).unwrap());

/// Extractor for notice detail pages
#[derive(Debug, Clone, Copy, Default)]
pub struct NoticeExtractor;

impl NoticeExtractor {
    /// Create a new extractor
    pub fn new() -> Self {
        Self
    }

    /// Extract notice fields from a detail page
    ///
    /// Every non-overlapping match is visited in document order and later
    /// matches overwrite earlier ones, so a page with several blocks yields
    /// the last block. A page with no match yields empty fields.
    pub fn extract(&self, html: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::default();
        let mut matches = 0usize;

        for caps in NOTICE_REGEX.captures_iter(html) {
            matches += 1;
            fields.title = capture(&caps, 1);
            fields.signed_time = capture(&caps, 2);
            fields.author = capture(&caps, 3);
            fields.body_text = filter_html(&capture(&caps, 4));
        }

        if matches > 1 {
            tracing::debug!(matches, "Multiple notice blocks on page, keeping the last");
        }

        fields
    }

    /// Count notice blocks on a page
    pub fn count_blocks(&self, html: &str) -> usize {
        NOTICE_REGEX.find_iter(html).count()
    }
}

fn capture(caps: &regex::Captures<'_>, index: usize) -> String {
    caps.get(index)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Convenience function using a default extractor
pub fn extract_notice(html: &str) -> ExtractedFields {
    NoticeExtractor::new().extract(html)
}
