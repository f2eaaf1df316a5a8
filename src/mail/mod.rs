//! Report delivery by email.
//!
//! [`LettreMailer`] sends through either a local sendmail command or an SMTP
//! relay, as selected by [`MailTransport`]. The pipeline only sees the
//! [`Mailer`] trait so runs can be exercised without a mail system.

use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SendmailTransport, SmtpTransport, Transport};

use crate::config::{MailConfig, MailTransport};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no recipients to send the report to")]
    NoRecipients,
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("sendmail transport error: {0}")]
    Sendmail(#[from] lettre::transport::sendmail::Error),
    #[error("SMTP host is not configured")]
    NoSmtpHost,
}

/// A rendered report ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub recipients: Vec<Address>,
    pub subject: String,
    pub body: String,
}

pub trait Mailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError>;
}

pub struct LettreMailer {
    config: MailConfig,
}

impl LettreMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message, DeliveryError> {
        build_message(&self.config.from, mail)
    }
}

/// Assemble a plain-text message addressed to every recipient
pub fn build_message(from: &Address, mail: &OutgoingMail) -> Result<Message, DeliveryError> {
    if mail.recipients.is_empty() {
        return Err(DeliveryError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(Mailbox::new(None, from.clone()))
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    for recipient in &mail.recipients {
        builder = builder.to(Mailbox::new(None, recipient.clone()));
    }

    Ok(builder.body(mail.body.clone())?)
}

impl Mailer for LettreMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        let message = self.build_message(mail)?;

        match &self.config.transport {
            MailTransport::Sendmail { command } => {
                SendmailTransport::new_with_command(command.as_str()).send(&message)?;
            }
            MailTransport::Smtp {
                host,
                port,
                user,
                password,
                starttls,
            } => {
                let host = host.as_deref().ok_or(DeliveryError::NoSmtpHost)?;
                let builder = if *starttls {
                    SmtpTransport::starttls_relay(host)?
                } else {
                    SmtpTransport::builder_dangerous(host)
                };
                let mut builder = builder.port(*port);

                if let (Some(user), Some(pass)) = (user, password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }

                builder.build().send(&message)?;
            }
        }

        tracing::info!(
            recipients = mail.recipients.len(),
            subject = %mail.subject,
            "Report email sent"
        );
        Ok(())
    }
}
