//! Outbound Mail and the Contact Form
//!
//! [`Mailer`] is the transport seam for everything the crate sends: password
//! reset links, verification links, and contact form notifications. The
//! default [`LogMailer`] writes messages to the log, which is enough for a
//! single-operator deployment; an SMTP or API transport implements the same
//! trait.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::client::ClientContext;
use crate::error::AuthError;
use crate::observability::SecurityEvent;
use crate::security_event;
use crate::validation::{
    validate_email, validate_length, validate_required, FieldErrors, Validate,
};

// ============================================================================
// Mailer
// ============================================================================

/// A message handed to the mail transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail transport failure
///
/// Carries transport detail for the server log; the client only ever sees a
/// generic server error.
#[derive(Debug, Error)]
#[error("mail transport error: {0}")]
pub struct MailError(pub String);

impl From<MailError> for AuthError {
    fn from(e: MailError) -> Self {
        tracing::error!(error = %e, "Outbound mail failed");
        Self::EmailNotSent
    }
}

/// Outbound mail transport seam
pub trait Mailer: Send + Sync {
    fn send(&self, mail: &OutboundEmail) -> Result<(), MailError>;
}

/// Mailer that writes messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &OutboundEmail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Outbound email");
        tracing::debug!(body = %mail.body, "Outbound email body");
        Ok(())
    }
}

/// Mailer that captures messages for assertions; a test double
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: parking_lot::Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in order
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: &OutboundEmail) -> Result<(), MailError> {
        self.sent.lock().push(mail.clone());
        Ok(())
    }
}

// ============================================================================
// Contact Form
// ============================================================================

/// Contact form submission
#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl Validate for ContactForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        errors.collect(validate_required(&self.name, "name"));
        errors.collect(validate_length(&self.name, 1, 100, "name"));
        errors.collect(validate_required(&self.email, "email"));
        errors.collect(validate_email(&self.email, "email"));
        errors.collect(validate_required(&self.subject, "subject"));
        errors.collect(validate_length(&self.subject, 1, 200, "subject"));
        errors.collect(validate_required(&self.message, "message"));
        errors.collect(validate_length(self.message.trim(), 10, 5000, "message"));

        errors.into_result()
    }
}

/// Contact form intake: validate and forward to the site operator
pub struct ContactService {
    mailer: Arc<dyn Mailer>,
    /// Where submissions are delivered
    recipient: String,
}

impl ContactService {
    pub fn new(mailer: Arc<dyn Mailer>, recipient: impl Into<String>) -> Self {
        Self {
            mailer,
            recipient: recipient.into(),
        }
    }

    /// Validate a submission and mail it to the operator
    pub fn submit(&self, form: &ContactForm, ctx: &ClientContext) -> Result<(), AuthError> {
        form.validate()?;

        let subject = format!("Contact form: {}", form.subject.trim());

        let body = format!(
            "From: {} <{}>\nIP: {}\n\n{}",
            form.name,
            form.email,
            ctx.ip_address.as_deref().unwrap_or("unknown"),
            form.message.trim(),
        );

        self.mailer.send(&OutboundEmail {
            to: self.recipient.clone(),
            subject,
            body,
        })?;

        security_event!(
            SecurityEvent::ContactReceived,
            sender = %form.email,
            ip_address = %ctx.ip_address.as_deref().unwrap_or("-"),
            "Contact form submission forwarded"
        );

        Ok(())
    }
}
