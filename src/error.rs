//! Unified error handling for the notice-watch crate
//!
//! Only two kinds of error ever leave a polling cycle: a configuration
//! problem, and a failure to obtain the candidate list. Everything that goes
//! wrong for a single notice is contained where it happens and turned into a
//! record or dispatch outcome instead of an `Error`.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping the domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use notice_watch::error::{Error, ErrorCategory};
//!
//! fn report(err: &Error) {
//!     if err.category() == ErrorCategory::Config {
//!         eprintln!("fix the configuration: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::notifications::channels::MailError;
pub use crate::utils::error::FetchError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout)
    Network,
    /// Response parsing errors
    Parsing,
    /// Watermark file and other I/O errors
    Storage,
    /// Mail delivery errors
    Delivery,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Delivery => "delivery",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for the notice-watch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Listing or detail fetch failure
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Mail delivery failure
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error is recoverable (a later run may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_transient(),
            Self::Mail(e) => e.is_transient(),
            Self::Io(_) => true,
            Self::Config(_) => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(FetchError::MalformedResponse(_))
            | Self::Fetch(FetchError::MissingField(_))
            | Self::Fetch(FetchError::InvalidId(_)) => ErrorCategory::Parsing,
            Self::Fetch(FetchError::InvalidHeader(_)) => ErrorCategory::Config,
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Mail(MailError::InvalidAddress(_)) => ErrorCategory::Config,
            Self::Mail(_) => ErrorCategory::Delivery,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
