//! Contact submission service
//!
//! A submission passes through the rate limiter, form validation (including
//! the honeypot), persistence with the client address, and finally a
//! best-effort notification.
//!
//! The rate-limit count and the insert are separate statements, so
//! concurrent submissions from one address can briefly exceed the limit.

use crate::db::repositories::ContactRepository;
use crate::models::{Contact, ContactForm, FieldErrors};
use crate::services::notifier::Notifier;
use crate::services::rate_limiter::ContactRateLimiter;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("Too many submissions")]
    RateLimited,

    #[error("Invalid submission")]
    Invalid(FieldErrors),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct ContactService {
    repo: Arc<dyn ContactRepository>,
    limiter: ContactRateLimiter,
    notifier: Arc<dyn Notifier>,
}

impl ContactService {
    pub fn new(
        repo: Arc<dyn ContactRepository>,
        limiter: ContactRateLimiter,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            limiter,
            notifier,
        }
    }

    /// Fail with `RateLimited` when `ip` has no submissions left.
    ///
    /// Handlers call this before reading the request body.
    pub async fn ensure_within_limit(&self, ip: Option<&str>) -> Result<(), ContactError> {
        if self.limiter.is_limited(ip).await? {
            tracing::info!("Contact submission rate limited for {}", ip.unwrap_or("unknown address"));
            return Err(ContactError::RateLimited);
        }
        Ok(())
    }

    /// Validate and store a submission, then notify in the background.
    ///
    /// Does not check the rate limit; see [`Self::process`].
    pub async fn submit(&self, form: &ContactForm, ip: Option<String>) -> Result<Contact, ContactError> {
        let submission = form.validate().map_err(ContactError::Invalid)?;

        let contact = self
            .repo
            .create(&Contact::from_submission(submission, ip))
            .await?;
        tracing::info!("Stored contact submission {}", contact.id);

        self.spawn_notification(contact.clone());
        Ok(contact)
    }

    /// Rate-limit check followed by [`Self::submit`]
    pub async fn process(&self, form: &ContactForm, ip: Option<String>) -> Result<Contact, ContactError> {
        self.ensure_within_limit(ip.as_deref()).await?;
        self.submit(form, ip).await
    }

    fn spawn_notification(&self, contact: Contact) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&contact).await {
                tracing::warn!("Failed to send notification for contact {}: {:#}", contact.id, e);
            }
        });
    }
}
