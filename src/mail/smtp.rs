//! SMTP relay transport.

use super::{MailTransport, TransportError};
use crate::config::{SmtpConfig, SmtpSecurity};
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

/// Relays messages through the configured SMTP server.
pub struct SmtpRelay {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelay {
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let mut builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        }
        .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            inner: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpRelay {
    async fn deliver(&self, message: lettre::Message) -> Result<(), TransportError> {
        let response = self.inner.send(message).await?;
        debug!(code = %response.code(), "Relay accepted message");
        Ok(())
    }
}
