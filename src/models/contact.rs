//! Contact submissions
//!
//! `ContactForm` is what a visitor posts; `validate` turns it into a
//! `ContactSubmission` or a map of field errors. `Contact` is the stored row.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name to error messages, in a stable order
pub type FieldErrors = BTreeMap<String, Vec<String>>;

const NAME_LEN: (usize, usize) = (2, 100);
const SUBJECT_LEN: (usize, usize) = (5, 200);
const MESSAGE_LEN: (usize, usize) = (10, 1000);
const EMAIL_MAX_LEN: usize = 254;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_EMAIL_MESSAGE: &str = "Enter a valid email address.";
pub const HONEYPOT_MESSAGE: &str = "Invalid form submission.";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("valid email regex"));

/// A stored contact submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    /// Client address at submission time, when known
    pub ip_address: Option<String>,
}

impl Contact {
    /// Build an unread row from a validated submission.
    pub fn from_submission(submission: ContactSubmission, ip_address: Option<String>) -> Self {
        Self {
            id: 0,
            name: submission.name,
            email: submission.email,
            subject: submission.subject,
            message: submission.message,
            is_read: false,
            created_at: Utc::now(),
            ip_address,
        }
    }
}

/// Raw form input. Missing fields deserialize as empty strings so they are
/// reported as required rather than as a malformed body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    /// Hidden from people; bots that fill it are rejected
    pub honeypot: String,
}

/// Trimmed, validated form fields
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<ContactSubmission, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim();
        let email = self.email.trim();
        let subject = self.subject.trim();
        let message = self.message.trim();

        check_length(&mut errors, "name", name, NAME_LEN);
        check_email(&mut errors, email);
        check_length(&mut errors, "subject", subject, SUBJECT_LEN);
        check_length(&mut errors, "message", message, MESSAGE_LEN);

        if !self.honeypot.is_empty() {
            push_error(&mut errors, "honeypot", HONEYPOT_MESSAGE.to_string());
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ContactSubmission {
            name: name.to_string(),
            email: email.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        })
    }
}

fn push_error(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

fn check_length(errors: &mut FieldErrors, field: &str, value: &str, (min, max): (usize, usize)) {
    let len = value.chars().count();
    if len == 0 {
        push_error(errors, field, REQUIRED_MESSAGE.to_string());
    } else if len < min {
        push_error(
            errors,
            field,
            format!("Ensure this value has at least {} characters (it has {}).", min, len),
        );
    } else if len > max {
        push_error(
            errors,
            field,
            format!("Ensure this value has at most {} characters (it has {}).", max, len),
        );
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    let len = email.chars().count();
    if len == 0 {
        push_error(errors, "email", REQUIRED_MESSAGE.to_string());
    } else if len > EMAIL_MAX_LEN {
        push_error(
            errors,
            "email",
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                EMAIL_MAX_LEN, len
            ),
        );
    } else if !EMAIL_RE.is_match(email) {
        push_error(errors, "email", INVALID_EMAIL_MESSAGE.to_string());
    }
}

/// Moderation listing filter
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContactFilter {
    #[serde(default)]
    pub is_read: Option<bool>,
    /// Substring over name, email, subject and message
    #[serde(default)]
    pub search: Option<String>,
}
