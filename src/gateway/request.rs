//! Request input and the immutable per-request context.

use crate::db::AuditRecord;
use crate::error::GatewayError;
use lettre::Address;
use serde::Deserialize;
use std::fmt;
use zeroize::Zeroizing;

/// Raw form fields of a send request.
///
/// Deliberately not `Debug`: it carries the caller's password.
#[derive(Default, Deserialize)]
pub struct SendForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub dbname: Option<String>,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl SendForm {
    /// Split into the caller's identity and the unvalidated message fields.
    pub fn into_parts(self) -> (Identity, MessageFields) {
        let password = Zeroizing::new(self.password.unwrap_or_default());
        let identity = Identity {
            username: trimmed(self.username),
            password: Zeroizing::new(password.trim().to_string()),
            host: trimmed(self.host),
            dbname: trimmed(self.dbname),
        };
        let fields = MessageFields {
            recipient: self.recipient,
            subject: self.subject,
            body: self.body,
        };
        (identity, fields)
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Credentials the caller presents for their own log store.
pub struct Identity {
    pub username: String,
    pub password: Zeroizing<String>,
    pub host: String,
    pub dbname: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("dbname", &self.dbname)
            .finish()
    }
}

/// Message fields as submitted.
#[derive(Debug, Default)]
pub struct MessageFields {
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// A validated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Message field names, in validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageField {
    Recipient,
    Subject,
    Body,
}

impl fmt::Display for MessageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Recipient => "recipient",
            Self::Subject => "subject",
            Self::Body => "body",
        })
    }
}

/// Check that recipient, subject and body are present.
///
/// Recipient and subject are trimmed; the body is kept verbatim and only
/// rejected when empty.
pub fn validate(fields: MessageFields) -> Result<Message, GatewayError> {
    let recipient = trimmed(fields.recipient);
    if recipient.is_empty() {
        return Err(GatewayError::Validation(MessageField::Recipient));
    }

    let subject = trimmed(fields.subject);
    if subject.is_empty() {
        return Err(GatewayError::Validation(MessageField::Subject));
    }

    let body = fields.body.unwrap_or_default();
    if body.is_empty() {
        return Err(GatewayError::Validation(MessageField::Body));
    }

    Ok(Message {
        recipient,
        subject,
        body,
    })
}

/// Everything a send needs once the caller is known.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: String,
    pub sender: Address,
    pub message: Message,
}

impl RequestContext {
    pub fn audit_record(&self, log_time: String) -> AuditRecord {
        AuditRecord {
            username: self.caller.clone(),
            recipient: self.message.recipient.clone(),
            subject: self.message.subject.clone(),
            body: self.message.body.clone(),
            log_time,
        }
    }
}
