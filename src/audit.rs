use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Audit source for the WhatsApp webhook intake path.
pub const SOURCE_WHATSAPP: &str = "whatsapp_webhook";
/// Audit source for the web-form intake path.
pub const SOURCE_WEBFORM: &str = "webform";

/// Final outcome of one intake call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// Payload accepted, lead scored and persisted.
    Accepted,
    /// Payload failed validation (missing or short phone).
    Rejected,
    /// Storage failed mid-flow; surfaced to the caller as 5xx.
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Accepted => "accepted",
            AuditOutcome::Rejected => "rejected",
            AuditOutcome::Failed => "failed",
        }
    }
}

/// Audit entry awaiting insertion. One per intake call.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub source: String,
    pub phone: Option<String>,
    pub payload: Value,
    pub payload_sha256: String,
    pub outcome: AuditOutcome,
    pub detail: Option<String>,
}

impl NewAuditEntry {
    /// Builds an entry for a raw payload, computing its digest.
    pub fn new(source: &str, payload: &Value, outcome: AuditOutcome) -> Self {
        Self {
            source: source.to_string(),
            phone: None,
            payload: payload.clone(),
            payload_sha256: payload_digest(payload),
            outcome,
            detail: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Stored audit row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub source: String,
    pub phone: Option<String>,
    pub payload: Value,
    pub payload_sha256: String,
    pub outcome: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Hex-encoded SHA-256 of the payload's JSON serialization.
///
/// Serialization of a given payload is deterministic, so the digest
/// of a redelivered payload matches the first delivery and operators
/// can spot duplicates without diffing bodies.
pub fn payload_digest(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
