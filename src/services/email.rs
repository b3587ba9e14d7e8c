//! Email service for loan reminders

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::reminder::{ReminderCandidate, ReminderKind},
};

use super::reminders::Notifier;

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

/// Subject and plain-text body of a reminder
pub fn reminder_message(kind: ReminderKind, candidate: &ReminderCandidate) -> (String, String) {
    let due = candidate.due_date.format("%A %d %B %Y");
    match kind {
        ReminderKind::DueSoon => (
            format!("Reminder: \"{}\" is due soon", candidate.book_title),
            format!(
                r#"
Hello {name},

This is a friendly reminder that "{title}" is due back on {due}.

You can renew it from your profile if you need more time.
"#,
                name = candidate.user_name,
                title = candidate.book_title,
                due = due
            ),
        ),
        ReminderKind::Overdue => (
            format!("Overdue: \"{}\"", candidate.book_title),
            format!(
                r#"
Hello {name},

"{title}" was due back on {due} and is now overdue.

Please return it as soon as possible. A daily fine applies until the book is returned.
"#,
                name = candidate.user_name,
                title = candidate.book_title,
                due = due
            ),
        ),
    }
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Generic email sending function
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("Athenaeum Library");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><pre>{}</pre></body></html>"#,
                                body.replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        let mailer_builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer_builder = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer_builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer_builder
        };

        let mailer = mailer_builder.build();

        // The SMTP transport is blocking
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send_reminder(&self, kind: ReminderKind, candidate: &ReminderCandidate) -> AppResult<()> {
        let (subject, body) = reminder_message(kind, candidate);
        self.send_email(&candidate.user_email, &subject, &body).await
    }
}
