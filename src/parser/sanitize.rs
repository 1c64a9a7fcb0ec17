//! Text cleaning for extracted notice bodies
//!
//! The notice body arrives as a fragment of HTML. It is cleaned in three
//! passes, each working on the previous pass's output:
//!
//! 1. strip every tag-like span
//! 2. drop runs of `&nbsp;` entities
//! 3. drop runs of two or more whitespace characters
//!
//! Pass 3 removes the run entirely instead of collapsing it to one space.
//! The board pads paragraphs with indentation and line breaks, and the mail
//! body reads better without them.

use regex::Regex;
use std::sync::LazyLock;

// Pre-compiled regex patterns for performance
static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[\s\S]+?>").unwrap());

static NBSP_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:&nbsp;)+").unwrap());

// ASCII whitespace only; full-width spaces inside CJK text are content.
static WHITESPACE_RUN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\t\n\x0C\r ]{2,}").unwrap());

/// Clean a raw notice body
///
/// # Examples
///
/// ```
/// use notice_watch::parser::sanitize::filter_html;
///
/// assert_eq!(filter_html("<b>hi</b>&nbsp;&nbsp;  there"), "hithere");
/// ```
pub fn filter_html(html: &str) -> String {
    let text = strip_tags(html);
    let text = remove_nbsp(&text);
    remove_whitespace_runs(&text)
}

/// Remove every `<...>` span, non-greedy, across newlines
///
/// # Examples
///
/// ```
/// use notice_watch::parser::sanitize::strip_tags;
///
/// assert_eq!(strip_tags("<p class=\"a\">x</p><br\n/>y"), "xy");
/// ```
pub fn strip_tags(text: &str) -> String {
    TAG_REGEX.replace_all(text, "").into_owned()
}

/// Remove one or more consecutive `&nbsp;` entities
pub fn remove_nbsp(text: &str) -> String {
    NBSP_REGEX.replace_all(text, "").into_owned()
}

/// Remove every run of two or more whitespace characters
///
/// A single space between words survives.
pub fn remove_whitespace_runs(text: &str) -> String {
    WHITESPACE_RUN_REGEX.replace_all(text, "").into_owned()
}
