use crate::credentials::SmtpCredentials;
use crate::errors::{FailureSignal, RawFailure};
use crate::models::{EmailMessage, MailSent};
use crate::providers::MailProvider;
use async_trait::async_trait;
use chrono::Utc;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use std::time::Duration;
use uuid::Uuid;

/// Port on which the relay expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends mail through the caller's SMTP relay.
///
/// A fresh connection is opened per request since every request may carry a
/// different relay and login.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn build_message(
        credentials: &SmtpCredentials,
        message: &EmailMessage,
        message_id: &str,
    ) -> Result<Message, RawFailure> {
        let from: Mailbox = credentials.sender().parse().map_err(|e| {
            RawFailure::new(
                FailureSignal::Other,
                format!("invalid address {}: {}", credentials.sender(), e),
            )
        })?;
        let to: Mailbox = message.to_email.parse().map_err(|e| {
            RawFailure::new(
                FailureSignal::Other,
                format!("invalid address {}: {}", message.to_email, e),
            )
        })?;

        let part = if message.is_html {
            SinglePart::html(message.body.clone())
        } else {
            SinglePart::plain(message.body.clone())
        };

        Message::builder()
            .message_id(Some(message_id.to_string()))
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative().singlepart(part))
            .map_err(|e| {
                RawFailure::new(
                    FailureSignal::Other,
                    format!("invalid address or header: {}", e),
                )
            })
    }

    fn transport(
        &self,
        credentials: &SmtpCredentials,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, RawFailure> {
        let builder = if credentials.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&credentials.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&credentials.server)
        }
        .map_err(|e| {
            RawFailure::new(
                FailureSignal::Transport,
                format!("TLS setup for {} failed: {}", credentials.server, e),
            )
        })?;

        Ok(builder
            .port(credentials.port)
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.expose_secret().to_string(),
            ))
            .timeout(Some(self.timeout))
            .build())
    }
}

/// Maps a lettre SMTP error to the signal the classifier understands.
fn smtp_signal(err: &lettre::transport::smtp::Error) -> FailureSignal {
    if let Some(code) = err.status() {
        if let Ok(code) = code.to_string().parse::<u16>() {
            return FailureSignal::SmtpReply(code);
        }
    }
    if err.is_timeout() {
        FailureSignal::Timeout
    } else if err.is_client() {
        FailureSignal::Other
    } else {
        // No reply code means the failure happened below the SMTP dialogue.
        FailureSignal::Transport
    }
}

fn message_id_domain(sender: &str) -> &str {
    sender
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost")
}

#[async_trait]
impl MailProvider for SmtpMailer {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        message: &EmailMessage,
    ) -> Result<MailSent, RawFailure> {
        let message_id = format!(
            "<{}@{}>",
            Uuid::new_v4(),
            message_id_domain(credentials.sender())
        );
        let email = Self::build_message(credentials, message, &message_id)?;
        let mailer = self.transport(credentials)?;

        tracing::info!(
            "Sending email via {}:{} (html: {})",
            credentials.server,
            credentials.port,
            message.is_html
        );

        match mailer.send(email).await {
            Ok(response) => {
                tracing::info!(
                    "✓ Email accepted by {} (code {})",
                    credentials.server,
                    response.code()
                );
                Ok(MailSent {
                    message: format!("Email sent successfully to {}", message.to_email),
                    message_id,
                    to_email: message.to_email.clone(),
                    sent_at: Utc::now(),
                })
            }
            Err(e) => {
                let failure = RawFailure::new(smtp_signal(&e), credentials.redact(&e.to_string()));
                tracing::error!("Error sending email: {}", failure);
                Err(failure)
            }
        }
    }
}
