use crate::scoring::{LeadPriority, LeadProfile, LeadScore};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

// ============ Lead ============

/// Statuses a lead can be moved through. Leads are never deleted;
/// `archived` is the terminal state.
pub const ALLOWED_STATUSES: &[&str] = &[
    "new",
    "contacted",
    "qualified",
    "negotiating",
    "won",
    "lost",
    "archived",
];

pub fn is_valid_status(status: &str) -> bool {
    ALLOWED_STATUSES.contains(&status)
}

/// A sales lead.
///
/// One row per normalized phone number; the UNIQUE constraint on
/// `phone` is what keeps concurrent intake paths from creating
/// duplicates.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    /// Unique identifier for the lead.
    pub id: Uuid,
    /// Normalized phone, the natural key (`+` followed by digits).
    pub phone: String,
    /// Display name, provided or placeholder.
    pub name: String,
    /// Validated email, when one was ever supplied.
    pub email: Option<String>,
    /// Lifecycle status, one of `ALLOWED_STATUSES`.
    pub status: String,
    /// Purchase or rental intent.
    pub intent: Option<String>,
    /// Lower budget bound.
    pub budget_min: Option<BigDecimal>,
    /// Upper budget bound.
    pub budget_max: Option<BigDecimal>,
    /// Regions of interest.
    pub regions: Vec<String>,
    /// Property type (apartment, house, ...).
    pub property_type: Option<String>,
    /// Free-text notes; seeded from the first inbound message.
    pub notes: Option<String>,
    /// Current score, 0-100.
    pub score: i32,
    /// Flexible metadata, including the priority tag.
    #[sqlx(json)]
    pub metadata: LeadMetadata,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// The scorable slice of this lead.
    pub fn profile(&self) -> LeadProfile {
        LeadProfile {
            phone: Some(self.phone.clone()),
            intent: self.intent.clone(),
            budget_min: self.budget_min.clone(),
            budget_max: self.budget_max.clone(),
            regions: self.regions.clone(),
            property_type: self.property_type.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Typed view of the `metadata` JSONB column.
///
/// Known keys are fields; anything else round-trips through `extra`
/// untouched, so writing a new score never drops keys other tools
/// may have put there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadMetadata {
    /// Priority tag derived from the score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<LeadPriority>,
    /// Reason strings from the last scoring pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_reasons: Option<Vec<String>>,
    /// When the last scoring pass ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scored_at: Option<DateTime<Utc>>,
    /// Any other metadata keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl LeadMetadata {
    /// Writes a scoring result into the known keys, leaving `extra`
    /// alone.
    pub fn apply_score(&mut self, result: &LeadScore, at: DateTime<Utc>) {
        self.priority = Some(result.priority);
        self.score_reasons = Some(result.reasons.clone());
        self.scored_at = Some(at);
    }

    /// The JSON object the storage layer overlays onto the stored
    /// metadata (`metadata || $n`): only the scoring keys, so any
    /// other keys survive the merge.
    pub fn score_overlay(
        result: &LeadScore,
        at: DateTime<Utc>,
    ) -> Result<Value, serde_json::Error> {
        serde_json::to_value(LeadMetadata {
            priority: Some(result.priority),
            score_reasons: Some(result.reasons.clone()),
            scored_at: Some(at),
            extra: serde_json::Map::new(),
        })
    }
}

// ============ Store Inputs ============

/// Seed data for find-or-create. Profile fields are applied on
/// creation; on an existing lead only missing fields get filled in.
#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub intent: Option<String>,
    pub budget_min: Option<BigDecimal>,
    pub budget_max: Option<BigDecimal>,
    pub regions: Vec<String>,
    pub property_type: Option<String>,
    pub notes: Option<String>,
}

/// Staff edit. `Some` overwrites, `None` keeps the stored value;
/// clearing a field back to NULL is not expressible through this
/// type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub intent: Option<String>,
    pub budget_min: Option<BigDecimal>,
    pub budget_max: Option<BigDecimal>,
    pub regions: Option<Vec<String>>,
    pub property_type: Option<String>,
    pub notes: Option<String>,
}

/// Listing filter, phone already in canonical form.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub min_score: Option<i32>,
    pub phone: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

// ============ Inbound Messages ============

/// One inbound message.
///
/// Append-only: re-delivery of the same provider payload produces
/// another row, never an update. The single exception is the
/// `processed` flag, flipped once after scoring completes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique identifier for the message record.
    pub id: Uuid,
    /// Normalized phone; joins to the lead by phone.
    pub phone: String,
    /// Message text, possibly empty.
    pub content: String,
    /// Provider message id, when supplied.
    pub external_id: Option<String>,
    /// Message direction, `inbound` unless the payload says otherwise.
    pub direction: String,
    /// Payload timestamp, else receipt time.
    pub received_at: DateTime<Utc>,
    /// Whether the scoring pass for this message completed.
    pub processed: bool,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the message log.
#[derive(Debug, Clone)]
pub struct NewInboundMessage {
    pub phone: String,
    pub content: String,
    pub external_id: Option<String>,
    pub direction: String,
    pub received_at: DateTime<Utc>,
}

// ============ API Requests ============

/// Web-form submission. Unlike the webhook payload the shape is
/// ours, so it parses into a typed body; `phone` and `name` are the
/// only required fields.
#[derive(Debug, Clone, Deserialize)]
pub struct WebformLead {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub intent: Option<String>,
    pub budget_min: Option<BigDecimal>,
    pub budget_max: Option<BigDecimal>,
    #[serde(default)]
    pub regions: Vec<String>,
    pub property_type: Option<String>,
    /// Free-text message from the form, fed to the scorer.
    pub message: Option<String>,
}

/// Score preview input: a hypothetical profile plus an optional
/// message. Nothing is persisted.
#[derive(Debug, Default, Deserialize)]
pub struct ScorePreviewRequest {
    #[serde(flatten)]
    pub profile: LeadProfile,
    pub message: Option<String>,
}

/// Query string for the lead listing.
#[derive(Debug, Default, Deserialize)]
pub struct LeadQueryParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub min_score: Option<i32>,
    pub phone: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Status transition request body.
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

// ============ API Responses ============

/// Lead plus its recent conversation history.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeadDetail {
    pub lead: Lead,
    pub messages: Vec<InboundMessage>,
}

/// Intake result returned to the form frontend.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebformResponse {
    pub status: String,
    pub lead_id: Uuid,
    pub lead_created: bool,
    pub score: i32,
    pub priority: LeadPriority,
}
