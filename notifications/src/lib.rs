// notifications/src/lib.rs
//! Outbound email.
//!
//! Notification sends are best-effort: callers collect per-recipient
//! outcomes into a [`DeliveryReport`] and log it, so delivery failures are
//! operator-visible without ever failing the triggering request or batch.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid mail address: {0}")]
    Address(String),
    #[error("Failed to compose message: {0}")]
    Compose(String),
    #[error("Mail transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub enum MailBody {
    Text(String),
    Html(String),
}

#[derive(Debug, Clone)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: MailBody,
}

/// SMTP settings, deserialized from the server config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        !self.server.is_empty() && !self.from.is_empty()
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutboundMail) -> Result<(), NotifyError>;
}

/// Real SMTP delivery via lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| NotifyError::Address(config.from.clone()))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        Ok(SmtpMailer {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<(), NotifyError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|_| NotifyError::Address(mail.to.clone()))?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&mail.subject);
        let message = match &mail.body {
            MailBody::Text(text) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone()),
            MailBody::Html(html) => builder.header(ContentType::TEXT_HTML).body(html.clone()),
        }
        .map_err(|e| NotifyError::Compose(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured: logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<(), NotifyError> {
        info!(to = %mail.to, subject = %mail.subject, "mail transport not configured, logging only");
        Ok(())
    }
}

/// Per-batch delivery outcome, surfaced to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn record(&mut self, outcome: &Result<(), NotifyError>, recipient: &str) {
        match outcome {
            Ok(()) => self.sent += 1,
            Err(e) => {
                self.failed += 1;
                warn!(recipient, error = %e, "notification delivery failed");
            }
        }
    }

    pub fn log(&self, job: &str) {
        info!(job, sent = self.sent, failed = self.failed, "notification batch finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_count_outcomes() {
        let mut report = DeliveryReport::default();
        report.record(&Ok(()), "a@x.com");
        report.record(&Err(NotifyError::Address("bad".into())), "bad");
        report.record(&Ok(()), "b@x.com");
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mailer = LogMailer;
        let outcome = mailer
            .send(&OutboundMail {
                to: "a@x.com".into(),
                subject: "hi".into(),
                body: MailBody::Text("hello".into()),
            })
            .await;
        assert!(outcome.is_ok());
    }

    #[test]
    fn should_require_server_and_from() {
        let mut config = MailConfig::default();
        assert!(!config.is_configured());
        config.server = "smtp.example.com".into();
        assert!(!config.is_configured());
        config.from = "hms@example.com".into();
        assert!(config.is_configured());
    }
}
