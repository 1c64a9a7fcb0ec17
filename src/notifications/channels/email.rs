//! SMTP email channel
//!
//! Sends plain-text mail over implicit TLS with PLAIN authentication. The
//! SMTP username doubles as the sender address.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{MailError, MailResult, Notification, Notifier};
use crate::config::{SmtpSettings, DEFAULT_SMTP_PORT};

/// SMTP channel
pub struct SmtpChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl SmtpChannel {
    /// Create a channel from resolved settings
    ///
    /// Port 465 uses implicit TLS; any other port negotiates STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns `MailError::InvalidAddress` if the username is not an email
    /// address, or `MailError::Transport` if TLS parameters cannot be built
    pub fn new(settings: &SmtpSettings) -> MailResult<Self> {
        let from = sender_mailbox(settings)?;

        let builder = if settings.port == DEFAULT_SMTP_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
        };

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.user.clone(),
                settings.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self {
            transport,
            from,
            host: format!("{}:{}", settings.host, settings.port),
        })
    }
}

#[async_trait]
impl Notifier for SmtpChannel {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, notification: &Notification) -> MailResult<()> {
        let message = compose(&self.from, notification)?;
        let response = self.transport.send(message).await?;

        tracing::debug!(
            host = %self.host,
            to = %notification.to,
            code = %response.code(),
            "Mail accepted by server"
        );
        Ok(())
    }
}

/// `"<sender_name> <user>"`
pub fn sender_mailbox(settings: &SmtpSettings) -> MailResult<Mailbox> {
    let address = parse_address(&settings.user)?;
    Ok(Mailbox::new(Some(settings.sender_name.clone()), address))
}

/// Build the plain-text message for one notification
pub fn compose(from: &Mailbox, notification: &Notification) -> MailResult<Message> {
    let to = Mailbox::new(None, parse_address(&notification.to)?);

    let message = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(notification.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(notification.body.clone())?;

    Ok(message)
}

fn parse_address(raw: &str) -> MailResult<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| MailError::InvalidAddress(format!("{raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 465,
            user: "bot@example.com".to_string(),
            password: "secret".to_string(),
            recipient: "me@example.com".to_string(),
            sender_name: "物业小助手".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    fn notification(to: &str) -> Notification {
        Notification {
            to: to.to_string(),
            subject: "停水通知[2021-09-30]".to_string(),
            body: "明日停水".to_string(),
        }
    }

    #[test]
    fn test_sender_mailbox() {
        let from = sender_mailbox(&settings()).unwrap();
        assert_eq!(from.name.as_deref(), Some("物业小助手"));
        assert_eq!(from.email.to_string(), "bot@example.com");
    }

    #[test]
    fn test_sender_must_be_address() {
        let mut settings = settings();
        settings.user = "bot".to_string();
        assert!(matches!(
            sender_mailbox(&settings),
            Err(MailError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_compose_envelope() {
        let from = sender_mailbox(&settings()).unwrap();
        let message = compose(&from, &notification("me@example.com")).unwrap();

        let envelope = message.envelope();
        assert_eq!(
            envelope.from().map(ToString::to_string),
            Some("bot@example.com".to_string())
        );
        assert_eq!(
            envelope.to().iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["me@example.com".to_string()]
        );

        let formatted = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(formatted.contains("text/plain"));
    }

    #[test]
    fn test_compose_rejects_bad_recipient() {
        let from = sender_mailbox(&settings()).unwrap();
        assert!(matches!(
            compose(&from, &notification("not an address")),
            Err(MailError::InvalidAddress(_))
        ));
    }
}
