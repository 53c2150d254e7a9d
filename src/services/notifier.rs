//! Contact notifications
//!
//! Notifications are best-effort: the contact service sends them from a
//! spawned task and only logs failures.

use crate::config::{ContactConfig, SmtpConfig};
use crate::models::Contact;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

/// Subject and body of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn for_contact(contact: &Contact) -> Self {
        Self {
            subject: format!("New Contact Form Submission: {}", contact.subject),
            body: format!(
                "From: {} ({})\n\n{}",
                contact.name, contact.email, contact.message
            ),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, contact: &Contact) -> Result<()>;
}

/// Used when no recipient is configured
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _contact: &Contact) -> Result<()> {
        Ok(())
    }
}

/// Sends notifications through an SMTP relay
pub struct SmtpNotifier {
    smtp: SmtpConfig,
    from: String,
    to: String,
}

impl SmtpNotifier {
    pub fn new(smtp: SmtpConfig, from: String, to: String) -> Self {
        Self { smtp, from, to }
    }

    fn build_message(&self, notification: Notification) -> Result<Message> {
        Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(self.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(notification.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self
            .smtp
            .host
            .as_deref()
            .ok_or_else(|| anyhow!("SMTP host not configured"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(self.smtp.port);

        if let (Some(username), Some(password)) = (&self.smtp.username, &self.smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, contact: &Contact) -> Result<()> {
        let email = self.build_message(Notification::for_contact(contact))?;
        let mailer = self.transport()?;

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// Pick a notifier: SMTP when a recipient is configured, otherwise none.
///
/// A recipient without an SMTP host still gets an `SmtpNotifier`; each send
/// then fails and is logged, which surfaces the misconfiguration.
pub fn notifier_from_config(contact: &ContactConfig, smtp: &SmtpConfig) -> Arc<dyn Notifier> {
    match &contact.notify_email {
        Some(to) => {
            if smtp.host.is_none() {
                tracing::warn!("contact.notify_email is set but smtp.host is not; notifications will fail");
            }
            Arc::new(SmtpNotifier::new(
                smtp.clone(),
                contact.from_email.clone(),
                to.clone(),
            ))
        }
        None => Arc::new(NoopNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactSubmission;

    fn contact() -> Contact {
        let submission = ContactSubmission {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            subject: "Engines".to_string(),
            message: "About the analytical engine.".to_string(),
        };
        Contact::from_submission(submission, None)
    }

    #[test]
    fn test_notification_format() {
        let notification = Notification::for_contact(&contact());
        assert_eq!(notification.subject, "New Contact Form Submission: Engines");
        assert_eq!(
            notification.body,
            "From: Ada (ada@example.com)\n\nAbout the analytical engine."
        );
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let notifier = SmtpNotifier::new(
            SmtpConfig::default(),
            "not an address".to_string(),
            "admin@example.com".to_string(),
        );
        assert!(notifier
            .build_message(Notification::for_contact(&contact()))
            .is_err());

        let notifier = SmtpNotifier::new(
            SmtpConfig::default(),
            "webmaster@example.com".to_string(),
            "admin@example.com".to_string(),
        );
        assert!(notifier
            .build_message(Notification::for_contact(&contact()))
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_host_fails() {
        let notifier = SmtpNotifier::new(
            SmtpConfig::default(),
            "webmaster@example.com".to_string(),
            "admin@example.com".to_string(),
        );
        assert!(notifier.notify(&contact()).await.is_err());
    }

    #[tokio::test]
    async fn test_notifier_from_config() {
        let config = ContactConfig::default();
        let notifier = notifier_from_config(&config, &SmtpConfig::default());
        assert!(notifier.notify(&contact()).await.is_ok());
    }
}
