#![cfg(feature = "web")]
//! SMTP delivery of the notification emails

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;

use crate::config::Args;
use crate::error::{FicoreError, Result};

/// A rendered HTML email waiting to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Something that can deliver an [`Email`]
///
/// Sending is blocking; callers run it off the async executor.
pub trait MailTransport: Send + Sync {
    fn send(&self, email: &Email) -> Result<()>;
}

/// STARTTLS relay with username/password login
pub struct Mailer {
    smtp: SmtpTransport,
    sender: String,
}

impl Mailer {
    /// Build the transport from the SMTP settings
    ///
    /// # Errors
    /// * `FicoreError::Config` - no SMTP password was configured
    /// * `FicoreError::Mail` - the relay host could not be set up
    pub fn new(config: &Args) -> Result<Self> {
        let Some(password) = config.smtp_password.as_deref().filter(|p| !p.is_empty()) else {
            return Err(FicoreError::Config(
                "SMTP_PASSWORD is required to send mail".to_string(),
            ));
        };

        let creds = Credentials::new(config.smtp_username.clone(), password.to_string());
        let smtp = SmtpTransport::starttls_relay(&config.smtp_server)?
            .credentials(creds)
            .port(config.smtp_port)
            .build();
        let sender = config.mail_sender.clone();

        Ok(Mailer { smtp, sender })
    }
}

impl MailTransport for Mailer {
    fn send(&self, email: &Email) -> Result<()> {
        let message = Message::builder()
            .from(self.sender.parse()?)
            .to(email.to.parse()?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())?;

        self.smtp.send(&message)?;
        info!("Email sent to {}", email.to);
        Ok(())
    }
}
