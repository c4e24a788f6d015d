//! Log record models.

/// One row of the shared `audit_log` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub username: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub log_time: String,
}

/// One row of the caller's own `mail_message_log` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerLogRecord {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub log_time: String,
}

impl From<&AuditRecord> for CallerLogRecord {
    fn from(record: &AuditRecord) -> Self {
        Self {
            recipient: record.recipient.clone(),
            subject: record.subject.clone(),
            body: record.body.clone(),
            log_time: record.log_time.clone(),
        }
    }
}
