//! Outbound mail.
//!
//! [`Mailer`] is the seam the driver loops talk to. [`SmtpMailer`] is the
//! production implementation on top of `lettre`; tests substitute recorders.
//! One call is one delivery attempt: there is no retry here.

use std::path::{Path, PathBuf};

use fs_err as fs;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpSettings;
use crate::error::{MonitorError, Result};

/// A plain-text message with optional file attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl OutgoingMail {
    pub fn text(subject: impl Into<String>, body: impl Into<String>) -> Self {
        OutgoingMail {
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        SmtpMailer { settings }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let settings = &self.settings;
        let builder = if settings.use_starttls {
            SmtpTransport::starttls_relay(&settings.host)
                .map_err(|e| MonitorError::Delivery(format!("STARTTLS setup failed: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&settings.host)
        };
        let mut builder = builder.port(settings.port);
        if let Some(username) = settings.username.as_ref().filter(|u| !u.is_empty()) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                settings.password.clone().unwrap_or_default(),
            ));
        }
        Ok(builder.build())
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(&self.settings, mail)?;
        self.transport()?
            .send(&message)
            .map_err(|e| MonitorError::Delivery(e.to_string()))?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| MonitorError::InvalidAddress {
            address: address.to_string(),
            details: e.to_string(),
        })
}

fn attachment_part(path: &Path) -> Result<SinglePart> {
    let content = fs::read(path).map_err(|e| MonitorError::io("Failed to read attachment", e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());
    let content_type = ContentType::parse("application/octet-stream")
        .map_err(|e| MonitorError::Delivery(e.to_string()))?;
    Ok(Attachment::new(file_name).body(content, content_type))
}

/// Builds the MIME message: From, To, Date, Subject, a UTF-8 text body and one
/// part per attachment.
pub fn build_message(settings: &SmtpSettings, mail: &OutgoingMail) -> Result<Message> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&settings.from_addr)?)
        .subject(mail.subject.clone())
        .date_now();
    for to in &settings.to_addrs {
        builder = builder.to(parse_mailbox(to)?);
    }

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(mail.body.clone()));
    for path in &mail.attachments {
        parts = parts.singlepart(attachment_part(path)?);
    }

    builder
        .multipart(parts)
        .map_err(|e| MonitorError::Delivery(format!("Failed to build message: {}", e)))
}
