use crate::audit::NewAuditEntry;
use crate::errors::AppError;
use crate::models::{InboundMessage, Lead, LeadFilter, LeadPatch, NewInboundMessage, NewLead};
use crate::scoring::LeadScore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of a find-or-create call.
#[derive(Debug, Clone)]
pub struct LeadUpsert {
    pub lead: Lead,
    /// True when this call created the lead.
    pub created: bool,
}

/// Persistence seam for leads and their conversation history.
///
/// Implementations must guarantee at most one lead per normalized
/// phone; under concurrent `find_or_create_lead` calls exactly one
/// caller sees `created == true`.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Appends one inbound message to the conversation history.
    async fn append_message(&self, message: NewInboundMessage)
        -> Result<InboundMessage, AppError>;

    /// Flips the `processed` flag once scoring for the message is
    /// persisted. The only mutation message records ever see.
    async fn mark_message_processed(&self, id: Uuid) -> Result<(), AppError>;

    /// Returns the lead for the seed's phone, creating it when none
    /// exists. On an existing lead the seed is ignored.
    async fn find_or_create_lead(&self, seed: NewLead) -> Result<LeadUpsert, AppError>;

    /// Fills in profile fields the stored lead is missing; fields
    /// that already have a value are left alone.
    async fn fill_missing_profile(&self, id: Uuid, seed: &NewLead) -> Result<Lead, AppError>;

    /// Persists a scoring result: the score column plus the scoring
    /// keys overlaid onto metadata, preserving all other keys.
    async fn save_score(
        &self,
        id: Uuid,
        result: &LeadScore,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;

    /// Filtered listing, newest first.
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError>;

    /// Staff edit: provided fields overwrite, the rest stay.
    async fn update_lead(&self, id: Uuid, patch: &LeadPatch) -> Result<Lead, AppError>;

    /// Moves the lead to a new status. The caller validates the
    /// status value.
    async fn set_status(&self, id: Uuid, status: &str) -> Result<Lead, AppError>;

    /// Most recent messages for a phone, newest first.
    async fn recent_messages(
        &self,
        phone: &str,
        limit: i64,
    ) -> Result<Vec<InboundMessage>, AppError>;
}

/// Write-only sink for intake audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_audit(&self, entry: NewAuditEntry) -> Result<(), AppError>;
}
