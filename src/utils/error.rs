//! Error types for the notice fetchers
//!
//! These are raised per request. Whether one of them is fatal depends on
//! which request produced it: a listing failure aborts the run, a detail
//! failure only empties that one record.

use thiserror::Error;

/// Errors that can occur while talking to the notice board
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Per-request timeout elapsed
    #[error("Request timeout")]
    Timeout,

    /// Overall run deadline elapsed before the request finished
    #[error("Run deadline exceeded")]
    DeadlineExceeded,

    /// Response body is not the JSON we expect
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Response envelope lacks a required field
    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    /// Listing entry carries an id that is not a 64-bit integer
    #[error("Invalid notice id: {0}")]
    InvalidId(String),

    /// Configured header value cannot be sent
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl FetchError {
    /// Collapse a reqwest error, keeping timeouts distinguishable
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }

    /// Whether a later run could reasonably succeed where this one failed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout | Self::DeadlineExceeded | Self::ServerError(500..=599)
        )
    }
}
