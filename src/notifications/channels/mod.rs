//! Notification channels
//!
//! A channel takes a fully formed [`Notification`] and delivers it. The
//! dispatcher only knows the [`Notifier`] trait, so delivery can be swapped
//! out in tests.

pub mod email;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::NoticeRecord;

pub use email::SmtpChannel;

/// Result type for channel operations
pub type MailResult<T> = Result<T, MailError>;

/// Errors that can occur while sending a notification
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Sender or recipient is not a valid mailbox
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Message could not be assembled
    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    /// SMTP conversation failed
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// Channel temporarily unavailable
    #[error("Channel temporarily unavailable: {0}")]
    Unavailable(String),
}

impl MailError {
    /// Whether retrying later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient() || e.is_timeout(),
            Self::Unavailable(_) => true,
            Self::InvalidAddress(_) | Self::Build(_) => false,
        }
    }
}

/// One outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient address
    pub to: String,

    /// Subject line
    pub subject: String,

    /// Plain-text body
    pub body: String,
}

impl Notification {
    /// Notification for one extracted notice
    pub fn from_record(record: &NoticeRecord) -> Self {
        Self {
            to: record.recipient.clone(),
            subject: record.subject(),
            body: record.body_text.clone(),
        }
    }
}

/// Trait for notification channels
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Deliver one notification
    async fn send(&self, notification: &Notification) -> MailResult<()>;
}
