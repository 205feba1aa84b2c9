//! Notifier implementations: SMTP relay and log-only.

use std::fmt;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing;

use pagemerge_core::config::NotifyConfig;
use pagemerge_core::error::{AppError, ErrorKind};
use pagemerge_core::result::AppResult;
use pagemerge_core::traits::Notifier;

/// Sends plain-text mail through an unauthenticated SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    relay: String,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Build a notifier from the `[notify]` section.
    ///
    /// `to` may hold several comma-separated addresses.
    pub fn from_config(config: &NotifyConfig) -> AppResult<Self> {
        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_mailbox)
            .collect::<AppResult<Vec<_>>>()?;
        if to.is_empty() {
            return Err(AppError::configuration("notify.to has no recipient"));
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .build();

        Ok(Self {
            transport,
            relay: format!("{}:{}", config.smtp_host, config.smtp_port),
            from,
            to,
        })
    }

    /// Build the message without sending it.
    pub fn build_message(&self, subject: &str, body: &str) -> AppResult<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder.body(body.to_string()).map_err(|e| {
            AppError::with_source(ErrorKind::Notification, "Failed to build message", e)
        })
    }
}

impl fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("relay", &self.relay)
            .field("from", &self.from.to_string())
            .field("to", &self.to.len())
            .finish()
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> AppResult<()> {
        let message = self.build_message(subject, body)?;
        self.transport.send(message).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Notification,
                format!("SMTP delivery via {} failed: {e}", self.relay),
                e,
            )
        })?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> AppResult<Mailbox> {
    address.trim().parse::<Mailbox>().map_err(|e| {
        AppError::with_source(
            ErrorKind::Configuration,
            format!("Invalid mail address '{address}'"),
            e,
        )
    })
}

/// Writes reports to the log instead of mailing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) -> AppResult<()> {
        tracing::warn!(%subject, "{body}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotifyConfig {
        NotifyConfig {
            enabled: true,
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            from: "merger@example.com".to_string(),
            to: "ops@example.com, oncall@example.com".to_string(),
            subject_prefix: "PDF Merger Error".to_string(),
        }
    }

    #[tokio::test]
    async fn test_from_config_parses_recipients() {
        let notifier = SmtpNotifier::from_config(&config()).expect("notifier");
        assert_eq!(notifier.to.len(), 2);
        assert_eq!(notifier.relay, "localhost:2525");
    }

    #[tokio::test]
    async fn test_invalid_sender_is_configuration_error() {
        let mut config = config();
        config.from = "not an address".to_string();
        let err = SmtpNotifier::from_config(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_message_carries_subject_and_body() {
        let notifier = SmtpNotifier::from_config(&config()).expect("notifier");
        let message = notifier
            .build_message("PDF Merger Error: now", "1) /pending/item1")
            .expect("message");
        let raw = String::from_utf8(message.formatted()).expect("utf8");
        assert!(raw.contains("Subject: PDF Merger Error: now"));
        assert!(raw.contains("1) /pending/item1"));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_notification_error() {
        let mut config = config();
        config.smtp_host = "127.0.0.1".to_string();
        config.smtp_port = 1;
        let notifier = SmtpNotifier::from_config(&config).expect("notifier");
        let err = notifier.send("subject", "body").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Notification);
    }
}
