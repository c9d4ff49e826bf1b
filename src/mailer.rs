//! Outgoing account mail: welcome/activation and password reset.
//!
//! [`SmtpMailer`] sends through `lettre`'s async SMTP transport. When
//! `SMTP_HOST` is unset the service falls back to [`LogMailer`], which only
//! logs that a message would have been sent.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),
}

/// A rendered message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Email {
    Welcome { name: String, activation_url: String },
    PasswordReset { name: String, reset_url: String },
}

impl Email {
    pub fn subject(&self) -> &'static str {
        match self {
            Email::Welcome { .. } => "Welcome to TeamFinder!",
            Email::PasswordReset { .. } => "Reset your TeamFinder password",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Email::Welcome {
                name,
                activation_url,
            } => format!(
                "Hi {name},\n\n\
                 Thanks for signing up for a TeamFinder account.\n\n\
                 Please open the link below to activate your account:\n\
                 {activation_url}\n\n\
                 The link is valid for 1 hour.\n\n\
                 The TeamFinder Team"
            ),
            Email::PasswordReset { name, reset_url } => format!(
                "Hi {name},\n\n\
                 Someone asked to reset the password for your TeamFinder account.\n\n\
                 To choose a new password open the link below:\n\
                 {reset_url}\n\n\
                 The link is valid for 24 hours. If you did not ask for this, \
                 you can ignore this message.\n\n\
                 The TeamFinder Team"
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, email: &Email) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, email: &Email) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.config.from.parse()?)
            .to(to.parse()?)
            .subject(email.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body())
            .map_err(|e| MailError::Build(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
            .port(self.config.port);
        if let (Some(user), Some(pass)) = (&self.config.user, &self.config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        builder.build().send(message).await?;
        info!(to, subject = email.subject(), "email sent");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, email: &Email) -> Result<(), MailError> {
        info!(to, subject = email.subject(), "smtp not configured, email not sent");
        Ok(())
    }
}
