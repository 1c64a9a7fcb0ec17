//! Decide which listing entries are new
//!
//! Two policies exist. The watermark policy keeps every id strictly above
//! the highest id processed by a previous run. The window policy keeps
//! entries whose `addtime` falls within a trailing time window and needs no
//! persisted state.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone, Utc};

use crate::config::{DedupConfig, DedupMode};
use crate::error::{Error, Result};
use crate::models::{NoticeCandidate, NoticeId};

/// Dedup policy for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Keep ids strictly greater than the watermark
    Watermark(NoticeId),

    /// Keep entries added no longer ago than `window`
    Window {
        window: TimeDelta,
        format: String,
        offset: FixedOffset,
    },
}

impl DedupPolicy {
    /// Watermark policy
    pub fn watermark(watermark: NoticeId) -> Self {
        Self::Watermark(watermark)
    }

    /// Window policy
    ///
    /// `utc_offset_hours` is the zone the board writes `addtime` in.
    pub fn window(window_secs: u64, format: &str, utc_offset_hours: i32) -> Result<Self> {
        let window = i64::try_from(window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| Error::config(format!("window too large: {window_secs}s")))?;

        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| Error::config(format!("invalid UTC offset: {utc_offset_hours}")))?;

        Ok(Self::Window {
            window,
            format: format.to_string(),
            offset,
        })
    }

    /// Build the policy from configuration and the loaded watermark
    ///
    /// A missing watermark counts as 0.
    pub fn from_config(config: &DedupConfig, watermark: Option<NoticeId>) -> Result<Self> {
        match config.policy {
            DedupMode::Watermark => Ok(Self::watermark(watermark.unwrap_or(0))),
            DedupMode::Window => Self::window(
                config.window_secs,
                &config.time_format,
                config.utc_offset_hours,
            ),
        }
    }

    /// Whether a single entry is new at `now`
    pub fn admits(&self, candidate: &NoticeCandidate, now: DateTime<Utc>) -> bool {
        match self {
            Self::Watermark(watermark) => candidate.id > *watermark,
            Self::Window { window, .. } => {
                let Some(raw) = candidate.add_time.as_deref() else {
                    tracing::warn!(id = candidate.id, "Listing entry has no addtime, skipping");
                    return false;
                };

                match self.parse_add_time(raw) {
                    // Entries stamped in the future are admitted
                    Some(added) => now.signed_duration_since(added) <= *window,
                    None => {
                        tracing::warn!(
                            id = candidate.id,
                            addtime = %raw,
                            "Unparsable addtime, skipping"
                        );
                        false
                    }
                }
            }
        }
    }

    /// Filter entries, preserving their order
    pub fn select(&self, entries: Vec<NoticeCandidate>, now: DateTime<Utc>) -> Vec<NoticeCandidate> {
        entries
            .into_iter()
            .filter(|candidate| self.admits(candidate, now))
            .collect()
    }

    /// Parse an `addtime` value into UTC
    ///
    /// Always `None` under the watermark policy.
    pub fn parse_add_time(&self, raw: &str) -> Option<DateTime<Utc>> {
        let Self::Window { format, offset, .. } = self else {
            return None;
        };

        let naive = NaiveDateTime::parse_from_str(raw.trim(), format).ok()?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Whether this policy persists a watermark
    pub fn uses_watermark(&self) -> bool {
        matches!(self, Self::Watermark(_))
    }
}
