//! Outbound account email delivery.
//!
//! Verification and reset emails are sent inline with the triggering request;
//! a delivery failure fails that request (registration rolls back). The
//! `EmailSender` trait decides how delivery happens: `LogEmailSender` logs the
//! payload for local development, `HttpEmailSender` posts it to a delivery
//! API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to fail the triggering request.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

/// Sender that posts messages to an HTTP delivery API.
#[derive(Clone, Debug)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    url: String,
    from: String,
    token: SecretString,
}

impl HttpEmailSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: String, from: String, token: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build email HTTP client")?;
        Ok(Self {
            client,
            url,
            from,
            token,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = json!({
            "from": self.from,
            "to": message.to_email,
            "subject": message.subject,
            "text": message.body,
        });

        let mut request = self.client.post(&self.url).json(&payload);
        let token = self.token.expose_secret();
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("email delivery request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("email delivery failed: {status}"));
        }
        Ok(())
    }
}

/// Email sent after registration with the verification link.
pub(crate) fn verification_email(
    to_email: &str,
    first_name: &str,
    verify_url: &str,
) -> EmailMessage {
    let body = format!(
        "Hi {first_name},\n\n\
         Please click the link below to verify your email address:\n\
         {verify_url}\n\n\
         If you didn't create this account, please ignore this email.\n\n\
         Best regards,\n\
         The BlockBustre Team\n"
    );
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Verify your BlockBustre account".to_string(),
        body,
    }
}

/// Email sent on password-reset requests; the link is valid for 24 hours.
pub(crate) fn password_reset_email(
    to_email: &str,
    first_name: &str,
    reset_url: &str,
) -> EmailMessage {
    let body = format!(
        "Hi {first_name},\n\n\
         You requested a password reset. Click the link below to reset your password:\n\
         {reset_url}\n\n\
         This link will expire in 24 hours.\n\n\
         If you didn't request this, please ignore this email.\n\n\
         Best regards,\n\
         The BlockBustre Team\n"
    );
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Reset your BlockBustre password".to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_contains_link_and_greeting() {
        let message = verification_email(
            "alice@example.com",
            "Alice",
            "https://blockbustre.com/verify-email/uid/token/",
        );
        assert_eq!(message.to_email, "alice@example.com");
        assert!(message.subject.contains("Verify"));
        assert!(message.body.contains("Hi Alice,"));
        assert!(message
            .body
            .contains("https://blockbustre.com/verify-email/uid/token/"));
    }

    #[test]
    fn reset_email_mentions_expiry() {
        let message = password_reset_email(
            "bob@example.com",
            "Bob",
            "https://blockbustre.com/reset-password/uid/token/",
        );
        assert!(message.subject.contains("Reset"));
        assert!(message.body.contains("expire in 24 hours"));
    }

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let sender = LogEmailSender;
        let message = verification_email("a@example.com", "A", "https://x/verify");
        assert!(sender.send(&message).await.is_ok());
    }
}
