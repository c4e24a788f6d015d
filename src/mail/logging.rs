//! Log-only transport for development.

use super::{MailTransport, TransportError};
use async_trait::async_trait;
use tracing::info;

pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, message: lettre::Message) -> Result<(), TransportError> {
        let envelope = message.envelope();
        info!(
            envelope_from = ?envelope.from().map(ToString::to_string),
            recipients = envelope.to().len(),
            bytes = message.formatted().len(),
            "Mail transport disabled; message not relayed"
        );
        Ok(())
    }
}
