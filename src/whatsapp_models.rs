use crate::scoring::LeadPriority;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Display name used when the payload carries no usable name.
pub const DEFAULT_DISPLAY_NAME: &str = "WhatsApp Lead";

/// Inbound WhatsApp webhook payload.
///
/// Gateway providers disagree on field naming, so each logical field
/// is resolved by one ordered-fallback getter below. Fields that
/// providers sometimes send as numbers (phone, ids, timestamp) are
/// kept as raw JSON values and coerced in the getter.
#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppInbound {
    /// Phone, preferred spelling.
    pub phone: Option<Value>,
    /// Phone, Portuguese spelling some gateways use.
    pub telefone: Option<Value>,

    /// Message text, preferred spelling.
    pub content: Option<Value>,
    /// Message text fallback.
    pub message: Option<Value>,
    /// Message text, last fallback.
    pub text: Option<Value>,

    /// Message direction; anything absent means inbound.
    pub direction: Option<String>,

    /// Provider message id, camelCase form.
    #[serde(rename = "messageId")]
    pub message_id: Option<Value>,
    /// Provider message id, snake_case form.
    #[serde(rename = "message_id")]
    pub message_id_alt: Option<Value>,

    /// Epoch seconds, epoch milliseconds, or a datetime string.
    pub timestamp: Option<Value>,

    /// Contact name, direct form.
    pub name: Option<String>,
    /// Contact name as WhatsApp profile name.
    #[serde(rename = "pushName")]
    pub push_name: Option<String>,
    /// Contact name, gateway CRM form.
    pub contact_name: Option<String>,

    /// Contact email, when the gateway enriches with one.
    pub email: Option<String>,
}

impl WhatsAppInbound {
    /// Phone with ordered fallback: `phone`, then `telefone`.
    /// Accepts string or numeric JSON values.
    pub fn get_phone(&self) -> Option<String> {
        [&self.phone, &self.telefone]
            .into_iter()
            .flatten()
            .find_map(value_as_string)
    }

    /// Message text with ordered fallback: `content`, `message`,
    /// `text`. The first *string* value wins, even when empty;
    /// non-string values in earlier slots are skipped. Defaults to
    /// the empty string.
    pub fn get_text(&self) -> String {
        [&self.content, &self.message, &self.text]
            .into_iter()
            .flatten()
            .find_map(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Direction, defaulting to `"inbound"`.
    pub fn get_direction(&self) -> String {
        self.direction
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or("inbound")
            .to_string()
    }

    /// Provider message id with ordered fallback: `messageId`, then
    /// `message_id`.
    pub fn get_external_id(&self) -> Option<String> {
        [&self.message_id, &self.message_id_alt]
            .into_iter()
            .flatten()
            .find_map(value_as_string)
    }

    /// Display name with ordered fallback: `name`, `pushName`,
    /// `contact_name`, else the placeholder.
    pub fn get_display_name(&self) -> String {
        [&self.name, &self.push_name, &self.contact_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
    }

    /// Email as sent, trimmed; validation happens at the use site.
    pub fn get_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
    }

    /// Message timestamp. Accepts epoch seconds, epoch milliseconds
    /// and common datetime string formats; anything unusable falls
    /// back to the receipt time with a warning rather than failing
    /// the delivery.
    pub fn received_at(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        let Some(raw) = &self.timestamp else {
            return fallback;
        };

        let parsed = match raw {
            Value::Number(n) => n.as_i64().and_then(epoch_to_datetime),
            Value::String(s) => parse_timestamp_str(s),
            _ => None,
        };

        parsed.unwrap_or_else(|| {
            tracing::warn!("⚠️ Unusable timestamp {:?}, using receipt time", raw);
            fallback
        })
    }
}

/// Coerces a JSON value into a non-blank string. Numbers are
/// formatted; everything else is rejected.
fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn epoch_to_datetime(raw: i64) -> Option<DateTime<Utc>> {
    // Heuristic: values this large can only be milliseconds
    if raw >= 1_000_000_000_000 {
        Utc.timestamp_millis_opt(raw).single()
    } else {
        Utc.timestamp_opt(raw, 0).single()
    }
}

/// Parses a timestamp string, trying RFC 3339 first, then the plain
/// `YYYY-MM-DD HH:MM:SS` form (assumed UTC), then all-digit epochs.
fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(epoch) = s.parse::<i64>() {
            return epoch_to_datetime(epoch);
        }
    }

    None
}

/// Response sent back to the WhatsApp gateway.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookIngestResponse {
    pub status: String,
    pub lead_id: Uuid,
    pub lead_created: bool,
    pub message_id: Uuid,
    pub score: i32,
    pub priority: LeadPriority,
}
