use crate::config::Config;
use crate::contact::normalize_phone;
use crate::errors::AppError;
use crate::ingest::ingest_webform_lead;
use crate::models::{
    is_valid_status, Lead, LeadDetail, LeadFilter, LeadPatch, LeadQueryParams,
    ScorePreviewRequest, StatusChange, WebformResponse, ALLOWED_STATUSES,
};
use crate::scoring::{score_lead, LeadScore};
use crate::store::{AuditSink, LeadStore};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// How much conversation history the lead detail endpoint returns.
const RECENT_MESSAGES: i64 = 20;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lead and message persistence backend.
    pub store: Arc<dyn LeadStore>,
    /// Sink for ingestion audit entries.
    pub audit: Arc<dyn AuditSink>,
    /// Application configuration.
    pub config: Config,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "imob-lead-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/webforms/lead
///
/// Web-form intake. Creates the lead when the phone is new; on an
/// existing lead only fills fields that are still empty, then
/// re-scores with the form message.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - The submitted form as raw JSON (kept verbatim for the audit trail).
///
/// # Returns
///
/// * `Result<(StatusCode, Json<WebformResponse>), AppError>` - The intake result or an error.
pub async fn webform_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<WebformResponse>), AppError> {
    tracing::info!("📨 Received web-form submission");

    let outcome = ingest_webform_lead(
        state.store.as_ref(),
        state.audit.as_ref(),
        &state.config.default_country_code,
        &payload,
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(WebformResponse {
            status: "processed".to_string(),
            lead_id: outcome.lead_id,
            lead_created: outcome.lead_created,
            score: outcome.score.score,
            priority: outcome.score.priority,
        }),
    ))
}

/// POST /api/v1/leads/score
///
/// Score preview: runs the scorer over an unpersisted profile plus an
/// optional message and returns the breakdown. Nothing is written, so
/// staff can see what a hypothetical lead would score and why.
///
/// # Arguments
///
/// * `request` - The profile fields plus an optional message.
///
/// # Returns
///
/// * `Result<Json<LeadScore>, AppError>` - The score, priority, and reasons.
pub async fn score_preview(
    Json(request): Json<ScorePreviewRequest>,
) -> Result<Json<LeadScore>, AppError> {
    tracing::info!("POST /leads/score - preview");

    Ok(Json(score_lead(
        &request.profile,
        request.message.as_deref(),
    )))
}

/// GET /api/v1/leads
///
/// Filtered lead listing, newest first.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - Query filters: status, priority, min_score, phone, limit, offset.
///
/// # Returns
///
/// * `Result<Json<Vec<Lead>>, AppError>` - The matching leads or an error.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadQueryParams>,
) -> Result<Json<Vec<Lead>>, AppError> {
    tracing::info!("GET /leads - params: {:?}", params);

    // Normalize the phone filter so it matches the stored key format
    let phone = match params.phone {
        Some(ref raw) => Some(normalize_phone(raw, &state.config.default_country_code)?),
        None => None,
    };

    let filter = LeadFilter {
        status: params.status,
        priority: params.priority,
        min_score: params.min_score,
        phone,
        limit: params.limit.unwrap_or(50).clamp(1, 200),
        offset: params.offset.unwrap_or(0).max(0),
    };

    let leads = state.store.list_leads(&filter).await?;
    Ok(Json(leads))
}

/// GET /api/v1/leads/:id
///
/// Retrieves a lead with its recent conversation history.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The UUID of the lead.
///
/// # Returns
///
/// * `Result<Json<LeadDetail>, AppError>` - The lead and messages or an error.
pub async fn get_lead_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetail>, AppError> {
    tracing::info!("GET /leads/{}", id);

    let lead = state
        .store
        .get_lead(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead with id {} not found", id)))?;

    let messages = state
        .store
        .recent_messages(&lead.phone, RECENT_MESSAGES)
        .await?;

    Ok(Json(LeadDetail { lead, messages }))
}

/// PATCH /api/v1/leads/:id
///
/// Staff edit: provided fields overwrite, omitted fields stay. The
/// profile change makes the stored score stale, so the lead is
/// re-scored (notes fallback for urgency) before it is returned.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The UUID of the lead.
/// * `patch` - The fields to change.
///
/// # Returns
///
/// * `Result<Json<Lead>, AppError>` - The updated, re-scored lead or an error.
pub async fn patch_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<LeadPatch>,
) -> Result<Json<Lead>, AppError> {
    tracing::info!("PATCH /leads/{}", id);

    let mut lead = state.store.update_lead(id, &patch).await?;

    let result = score_lead(&lead.profile(), None);
    let scored_at = chrono::Utc::now();
    state.store.save_score(lead.id, &result, scored_at).await?;

    lead.score = result.score;
    lead.metadata.apply_score(&result, scored_at);

    tracing::info!(
        "✓ Lead {} updated, re-scored to {} ({})",
        lead.id,
        result.score,
        result.priority
    );
    Ok(Json(lead))
}

/// POST /api/v1/leads/:id/status
///
/// Moves a lead through its lifecycle. Leads are never deleted;
/// `archived` is the terminal state.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The UUID of the lead.
/// * `change` - The requested status.
///
/// # Returns
///
/// * `Result<Json<Lead>, AppError>` - The updated lead or an error.
pub async fn set_lead_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Lead>, AppError> {
    tracing::info!("POST /leads/{}/status - {}", id, change.status);

    if !is_valid_status(&change.status) {
        return Err(AppError::BadRequest(format!(
            "Invalid status '{}', allowed: {}",
            change.status,
            ALLOWED_STATUSES.join(", ")
        )));
    }

    let lead = state.store.set_status(id, &change.status).await?;
    Ok(Json(lead))
}
