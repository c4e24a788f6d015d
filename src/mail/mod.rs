//! Outbound mail.
//!
//! Provides the transport seam the gateway hands finished messages to:
//! - `SmtpRelay` - relays through the configured SMTP server using lettre
//! - `LogTransport` - logs the envelope and drops the message (development)

mod logging;
mod smtp;

pub use logging::LogTransport;
pub use smtp::SmtpRelay;

use crate::config::{SmtpConfig, TransportKind};
use crate::gateway::Message;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Address, address::Envelope};
use std::sync::Arc;
use thiserror::Error;

/// Mail transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid recipient address: {0}")]
    Recipient(String),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Hands a finished message to the outside world.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: lettre::Message) -> Result<(), TransportError>;
}

/// Construct the transport named by the configuration.
pub fn build_transport(config: &SmtpConfig) -> Result<Arc<dyn MailTransport>, TransportError> {
    Ok(match config.transport {
        TransportKind::Smtp => Arc::new(SmtpRelay::new(config)?),
        TransportKind::Log => Arc::new(LogTransport),
    })
}

/// Build the outgoing message.
///
/// `From` is the caller's resolved address; the envelope sender is the
/// configured bounce address, which the final MTA records as `Return-Path`.
pub fn compose(
    sender: &Address,
    envelope_from: &Address,
    message: &Message,
) -> Result<lettre::Message, TransportError> {
    let to: Mailbox = message
        .recipient
        .parse()
        .map_err(|_| TransportError::Recipient(message.recipient.clone()))?;
    let envelope = Envelope::new(Some(envelope_from.clone()), vec![to.email.clone()])?;

    let built = lettre::Message::builder()
        .from(Mailbox::new(None, sender.clone()))
        .to(to)
        .subject(message.subject.as_str())
        .envelope(envelope)
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())?;

    Ok(built)
}
