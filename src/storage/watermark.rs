//! Persisted high-water mark
//!
//! The watermark file holds a single decimal integer: the highest notice id
//! processed so far. It is loaded once when a run starts and written once
//! after the fetch phase. Writes go to a sibling temp file that is then
//! renamed over the original, so a crash mid-write leaves the old value.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::{DedupConfig, DedupMode};
use crate::error::Result;
use crate::models::NoticeId;

/// Where the watermark lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkStore {
    /// Plain-text file holding the last processed id
    File { path: PathBuf },

    /// No persisted state (window policy)
    Disabled,
}

impl WatermarkStore {
    /// File-backed store
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Store for the dedup policy in use
    pub fn from_config(config: &DedupConfig) -> Self {
        match config.policy {
            DedupMode::Watermark => Self::file(&config.watermark_path),
            DedupMode::Window => Self::Disabled,
        }
    }

    /// Path of the watermark file, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path } => Some(path),
            Self::Disabled => None,
        }
    }

    /// Load the current watermark
    ///
    /// A missing, empty or unreadable file counts as 0. Returns `None` when
    /// the store is disabled.
    pub fn load(&self) -> Option<NoticeId> {
        let Self::File { path } = self else {
            return None;
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No watermark file yet, starting from 0");
                return Some(0);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read watermark, using 0");
                return Some(0);
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Some(0);
        }

        match trimmed.parse::<NoticeId>() {
            Ok(id) => {
                tracing::debug!(path = %path.display(), watermark = id, "Watermark loaded");
                Some(id)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    content = %trimmed,
                    error = %e,
                    "Watermark file is not an integer, using 0"
                );
                Some(0)
            }
        }
    }

    /// Write a new watermark
    ///
    /// Returns `Ok(false)` without touching anything when disabled.
    pub fn save(&self, id: NoticeId) -> Result<bool> {
        let Self::File { path } = self else {
            return Ok(false);
        };

        let temp_path = temp_path_for(path);
        {
            let mut file = File::create(&temp_path)?;
            write!(file, "{id}")?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;

        tracing::debug!(path = %path.display(), watermark = id, "Watermark saved");
        Ok(true)
    }

    /// Save, logging instead of failing
    ///
    /// Returns the id when it was written.
    pub fn persist(&self, id: NoticeId) -> Option<NoticeId> {
        match self.save(id) {
            Ok(true) => Some(id),
            Ok(false) => None,
            Err(e) => {
                tracing::error!(
                    path = ?self.path(),
                    watermark = id,
                    error = %e,
                    "Failed to persist watermark"
                );
                None
            }
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "watermark".into());
    name.push(".tmp");
    path.with_file_name(name)
}
