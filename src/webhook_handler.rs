use crate::errors::AppError;
use crate::handlers::AppState;
use crate::ingest::ingest_whatsapp_message;
use crate::whatsapp_models::WebhookIngestResponse;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    /// Token alternative for gateways that cannot set custom headers.
    pub token: Option<String>,
}

/// WhatsApp Webhook Handler
///
/// Receives inbound message events from the WhatsApp gateway:
/// normalizes the contact phone, appends the message to conversation
/// history, finds or creates the lead and re-scores it. Redelivered
/// payloads append a fresh message record but never a second lead.
///
/// Expected payload: one JSON object per delivery; field names vary
/// by gateway and are resolved by ordered fallbacks.
/// Authentication: X-Webhook-Token header or `token` query parameter
/// must match WEBHOOK_SECRET env var (check skipped when unset).
pub async fn whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<WebhookIngestResponse>), AppError> {
    tracing::info!("📨 Received WhatsApp webhook");

    validate_webhook_secret(&state, &headers, query.token.as_deref())?;

    let outcome = ingest_whatsapp_message(
        state.store.as_ref(),
        state.audit.as_ref(),
        &state.config.default_country_code,
        &payload,
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(WebhookIngestResponse {
            status: "processed".to_string(),
            lead_id: outcome.lead_id,
            lead_created: outcome.lead_created,
            message_id: outcome.message_id,
            score: outcome.score.score,
            priority: outcome.score.priority,
        }),
    ))
}

/// Validate the shared webhook secret, accepting it from the
/// X-Webhook-Token header or the `token` query parameter.
fn validate_webhook_secret(
    state: &AppState,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warn was already logged at startup)
    let Some(ref expected_secret) = state.config.webhook_secret else {
        return Ok(());
    };

    let token = headers
        .get("x-webhook-token")
        .and_then(|v| v.to_str().ok())
        .or(query_token)
        .ok_or_else(|| AppError::Unauthorized("Missing webhook token".to_string()))?;

    // Constant-time comparison to prevent timing attacks
    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison (basic implementation)
/// For production, consider using a crypto library like `subtle`
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
