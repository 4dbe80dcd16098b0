//! Intake pipelines. WhatsApp webhook deliveries and web-form
//! submissions both end here: contact data normalized, lead found or
//! created, score refreshed, one audit entry per call.

use crate::audit::{AuditOutcome, NewAuditEntry, SOURCE_WEBFORM, SOURCE_WHATSAPP};
use crate::contact::{is_valid_email, normalize_phone};
use crate::errors::AppError;
use crate::models::{NewInboundMessage, NewLead, WebformLead};
use crate::scoring::{score_lead, LeadScore};
use crate::store::{AuditSink, LeadStore};
use crate::whatsapp_models::WhatsAppInbound;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

/// Result of one accepted webhook delivery.
#[derive(Debug)]
pub struct IngestOutcome {
    pub lead_id: Uuid,
    pub lead_created: bool,
    pub message_id: Uuid,
    pub score: LeadScore,
}

/// Runs the full ingestion flow for one webhook delivery.
///
/// Validation failures (unparseable payload, missing or too-short
/// phone) reject the delivery with a 400 after a best-effort
/// `rejected` audit entry. Storage failures surface as 5xx with no
/// retries; the gateway's redelivery is the retry mechanism, and it
/// will append a fresh message record without creating a second
/// lead.
pub async fn ingest_whatsapp_message(
    store: &dyn LeadStore,
    audit: &dyn AuditSink,
    country_code: &str,
    raw_payload: &Value,
) -> Result<IngestOutcome, AppError> {
    let payload: WhatsAppInbound = match serde_json::from_value(raw_payload.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            let reason = format!("payload is not a usable JSON object: {}", e);
            audit_rejection(audit, SOURCE_WHATSAPP, raw_payload, &reason).await;
            return Err(AppError::BadRequest(reason));
        }
    };

    let Some(raw_phone) = payload.get_phone() else {
        let reason = "payload is missing a phone number".to_string();
        audit_rejection(audit, SOURCE_WHATSAPP, raw_payload, &reason).await;
        return Err(AppError::BadRequest(reason));
    };

    let phone = match normalize_phone(&raw_phone, country_code) {
        Ok(phone) => phone,
        Err(e) => {
            audit_rejection(audit, SOURCE_WHATSAPP, raw_payload, &e.to_string()).await;
            return Err(e);
        }
    };

    tracing::debug!("Webhook phone {} normalized to {}", raw_phone, phone);

    match run_pipeline(store, &payload, &phone).await {
        Ok(outcome) => {
            let entry = NewAuditEntry::new(SOURCE_WHATSAPP, raw_payload, AuditOutcome::Accepted)
                .with_phone(&phone)
                .with_detail(format!(
                    "lead {} scored {} ({})",
                    outcome.lead_id, outcome.score.score, outcome.score.priority
                ));
            audit.record_audit(entry).await?;

            tracing::info!(
                "✓ WhatsApp message {} → lead {} (score {}, priority {})",
                outcome.message_id,
                outcome.lead_id,
                outcome.score.score,
                outcome.score.priority
            );
            Ok(outcome)
        }
        Err(e) => {
            let entry = NewAuditEntry::new(SOURCE_WHATSAPP, raw_payload, AuditOutcome::Failed)
                .with_phone(&phone)
                .with_detail(e.to_string());
            if let Err(audit_err) = audit.record_audit(entry).await {
                tracing::error!("Failed to record failure audit entry: {}", audit_err);
            }
            Err(e)
        }
    }
}

/// The storage half of the flow: append the message, find or create
/// the lead, score it, persist, flip the processed flag.
async fn run_pipeline(
    store: &dyn LeadStore,
    payload: &WhatsAppInbound,
    phone: &str,
) -> Result<IngestOutcome, AppError> {
    let content = payload.get_text();

    let message = store
        .append_message(NewInboundMessage {
            phone: phone.to_string(),
            content: content.clone(),
            external_id: payload.get_external_id(),
            direction: payload.get_direction(),
            received_at: payload.received_at(Utc::now()),
        })
        .await?;

    let email = payload.get_email().filter(|e| {
        let valid = is_valid_email(e);
        if !valid {
            tracing::warn!("Dropping invalid email from webhook payload: {}", e);
        }
        valid
    });

    let upsert = store
        .find_or_create_lead(NewLead {
            phone: phone.to_string(),
            name: payload.get_display_name(),
            email,
            notes: (!content.is_empty()).then(|| content.clone()),
            ..Default::default()
        })
        .await?;

    let score = score_lead(&upsert.lead.profile(), Some(&content));
    store.save_score(upsert.lead.id, &score, Utc::now()).await?;
    store.mark_message_processed(message.id).await?;

    Ok(IngestOutcome {
        lead_id: upsert.lead.id,
        lead_created: upsert.created,
        message_id: message.id,
        score,
    })
}

/// Result of one accepted web-form submission. Forms do not land in
/// conversation history, so there is no message record id.
#[derive(Debug)]
pub struct WebformOutcome {
    pub lead_id: Uuid,
    pub lead_created: bool,
    pub score: LeadScore,
}

/// Runs the intake flow for one web-form submission.
///
/// Same audit discipline as the webhook: validation failures reject
/// with a 400 after a best-effort `rejected` entry, storage failures
/// audit `failed` and surface as 5xx. On an existing lead the form
/// only fills fields that are still empty; staff edits win.
pub async fn ingest_webform_lead(
    store: &dyn LeadStore,
    audit: &dyn AuditSink,
    country_code: &str,
    raw_payload: &Value,
) -> Result<WebformOutcome, AppError> {
    let form: WebformLead = match serde_json::from_value(raw_payload.clone()) {
        Ok(form) => form,
        Err(e) => {
            let reason = format!("form payload is invalid: {}", e);
            audit_rejection(audit, SOURCE_WEBFORM, raw_payload, &reason).await;
            return Err(AppError::BadRequest(reason));
        }
    };

    let phone = match normalize_phone(&form.phone, country_code) {
        Ok(phone) => phone,
        Err(e) => {
            audit_rejection(audit, SOURCE_WEBFORM, raw_payload, &e.to_string()).await;
            return Err(e);
        }
    };

    match run_webform(store, form, &phone).await {
        Ok(outcome) => {
            let entry = NewAuditEntry::new(SOURCE_WEBFORM, raw_payload, AuditOutcome::Accepted)
                .with_phone(&phone)
                .with_detail(format!(
                    "lead {} scored {} ({})",
                    outcome.lead_id, outcome.score.score, outcome.score.priority
                ));
            audit.record_audit(entry).await?;

            tracing::info!(
                "✓ Web-form lead {} (created: {}, score {}, priority {})",
                outcome.lead_id,
                outcome.lead_created,
                outcome.score.score,
                outcome.score.priority
            );
            Ok(outcome)
        }
        Err(e) => {
            let entry = NewAuditEntry::new(SOURCE_WEBFORM, raw_payload, AuditOutcome::Failed)
                .with_phone(&phone)
                .with_detail(e.to_string());
            if let Err(audit_err) = audit.record_audit(entry).await {
                tracing::error!("Failed to record failure audit entry: {}", audit_err);
            }
            Err(e)
        }
    }
}

async fn run_webform(
    store: &dyn LeadStore,
    form: WebformLead,
    phone: &str,
) -> Result<WebformOutcome, AppError> {
    let email = form.email.filter(|e| {
        let valid = is_valid_email(e);
        if !valid {
            tracing::warn!("Dropping invalid email from web form: {}", e);
        }
        valid
    });

    let message = form.message.filter(|m| !m.trim().is_empty());

    let seed = NewLead {
        phone: phone.to_string(),
        name: form.name,
        email,
        intent: form.intent,
        budget_min: form.budget_min,
        budget_max: form.budget_max,
        regions: form.regions,
        property_type: form.property_type,
        notes: message.clone(),
    };

    let upsert = store.find_or_create_lead(seed.clone()).await?;
    let lead = if upsert.created {
        upsert.lead
    } else {
        store.fill_missing_profile(upsert.lead.id, &seed).await?
    };

    let score = score_lead(&lead.profile(), message.as_deref());
    store.save_score(lead.id, &score, Utc::now()).await?;

    Ok(WebformOutcome {
        lead_id: lead.id,
        lead_created: upsert.created,
        score,
    })
}

/// Best-effort `rejected` audit entry. The rejection response
/// matters more than the audit row, so a failed write only logs.
async fn audit_rejection(audit: &dyn AuditSink, source: &str, payload: &Value, detail: &str) {
    let entry = NewAuditEntry::new(source, payload, AuditOutcome::Rejected).with_detail(detail);
    if let Err(e) = audit.record_audit(entry).await {
        tracing::error!("Failed to record rejection audit entry: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::scoring::LeadPriority;
    use serde_json::json;

    #[tokio::test]
    async fn accepted_delivery_scores_and_audits() {
        let store = MemoryStore::new();
        let payload = json!({
            "phone": "61999990000",
            "message": "I want to visit today",
            "pushName": "Carlos"
        });

        let outcome = ingest_whatsapp_message(&store, &store, "55", &payload)
            .await
            .unwrap();

        assert!(outcome.lead_created);
        assert_eq!(outcome.score.score, 35);
        assert_eq!(outcome.score.priority, LeadPriority::Low);

        let lead = store.get_lead(outcome.lead_id).await.unwrap().unwrap();
        assert_eq!(lead.phone, "+5561999990000");
        assert_eq!(lead.name, "Carlos");
        assert_eq!(lead.notes.as_deref(), Some("I want to visit today"));
        assert_eq!(lead.score, 35);
        assert_eq!(lead.metadata.priority, Some(LeadPriority::Low));

        let messages = store.recent_messages("+5561999990000", 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].processed);

        let audits = store.audit_entries();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].outcome, "accepted");
        assert_eq!(audits[0].phone.as_deref(), Some("+5561999990000"));
    }

    #[tokio::test]
    async fn redelivery_appends_message_but_not_lead() {
        let store = MemoryStore::new();
        let payload = json!({"phone": "61999990000", "content": "hello"});

        let first = ingest_whatsapp_message(&store, &store, "55", &payload)
            .await
            .unwrap();
        let second = ingest_whatsapp_message(&store, &store, "55", &payload)
            .await
            .unwrap();

        assert!(first.lead_created);
        assert!(!second.lead_created);
        assert_eq!(first.lead_id, second.lead_id);
        assert_ne!(first.message_id, second.message_id);
        assert_eq!(store.lead_count(), 1);
        assert_eq!(store.message_count(), 2);
        assert_eq!(store.audit_entries().len(), 2);
    }

    #[tokio::test]
    async fn missing_phone_rejects_with_audit() {
        let store = MemoryStore::new();
        let payload = json!({"message": "no phone here"});

        let err = ingest_whatsapp_message(&store, &store, "55", &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert_eq!(store.lead_count(), 0);
        assert_eq!(store.message_count(), 0);
        let audits = store.audit_entries();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].outcome, "rejected");
    }

    #[tokio::test]
    async fn short_phone_rejects() {
        let store = MemoryStore::new();
        let payload = json!({"phone": "123", "content": "hi"});

        let err = ingest_whatsapp_message(&store, &store, "55", &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(store.audit_entries()[0].outcome, "rejected");
    }

    #[tokio::test]
    async fn existing_lead_profile_drives_rescoring() {
        let store = MemoryStore::new();

        ingest_whatsapp_message(
            &store,
            &store,
            "55",
            &json!({"phone": "61999990000", "content": "first contact"}),
        )
        .await
        .unwrap();

        // Staff fills in the budget between messages
        let lead_id = {
            let filter = crate::models::LeadFilter {
                limit: 10,
                ..Default::default()
            };
            let leads = store.list_leads(&filter).await.unwrap();
            leads[0].id
        };
        store
            .update_lead(
                lead_id,
                &crate::models::LeadPatch {
                    budget_min: Some(bigdecimal::BigDecimal::from(300_000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = ingest_whatsapp_message(
            &store,
            &store,
            "55",
            &json!({"phone": "61999990000", "content": "can I visit today?"}),
        )
        .await
        .unwrap();

        assert_eq!(outcome.score.score, 55);
        assert_eq!(outcome.score.priority, LeadPriority::Medium);
    }

    #[tokio::test]
    async fn webform_creates_and_scores_lead() {
        let store = MemoryStore::new();
        let payload = json!({
            "name": "Ana Souza",
            "phone": "(61) 99999-0000",
            "email": "ana.souza@example.com",
            "intent": "buy",
            "budget_min": 400000,
            "regions": ["Asa Sul", "Lago Norte"],
            "property_type": "apartment",
            "message": "I want to visit this week"
        });

        let outcome = ingest_webform_lead(&store, &store, "55", &payload)
            .await
            .unwrap();

        assert!(outcome.lead_created);
        assert_eq!(outcome.score.score, 100);
        assert_eq!(outcome.score.priority, LeadPriority::Urgent);

        let lead = store.get_lead(outcome.lead_id).await.unwrap().unwrap();
        assert_eq!(lead.phone, "+5561999990000");
        assert_eq!(lead.name, "Ana Souza");
        assert_eq!(lead.email.as_deref(), Some("ana.souza@example.com"));
        assert_eq!(lead.regions.len(), 2);

        // Forms never land in conversation history
        assert_eq!(store.message_count(), 0);

        let audits = store.audit_entries();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].source, "webform");
        assert_eq!(audits[0].outcome, "accepted");
    }

    #[tokio::test]
    async fn webform_fills_missing_fields_without_overwriting() {
        let store = MemoryStore::new();

        let first = ingest_webform_lead(
            &store,
            &store,
            "55",
            &json!({"name": "Bia", "phone": "61988887777"}),
        )
        .await
        .unwrap();
        assert!(first.lead_created);
        assert_eq!(first.score.score, 15);

        let second = ingest_webform_lead(
            &store,
            &store,
            "55",
            &json!({
                "name": "Beatriz Lima",
                "phone": "+5561988887777",
                "intent": "buy",
                "budget_max": 800000
            }),
        )
        .await
        .unwrap();

        assert!(!second.lead_created);
        assert_eq!(first.lead_id, second.lead_id);
        assert_eq!(second.score.score, 55);

        let lead = store.get_lead(second.lead_id).await.unwrap().unwrap();
        assert_eq!(lead.name, "Bia");
        assert_eq!(lead.intent.as_deref(), Some("buy"));
        assert!(lead.budget_max.is_some());
        assert_eq!(store.lead_count(), 1);
    }

    #[tokio::test]
    async fn webform_short_phone_rejects_with_audit() {
        let store = MemoryStore::new();
        let payload = json!({"name": "Noone", "phone": "123"});

        let err = ingest_webform_lead(&store, &store, "55", &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert_eq!(store.lead_count(), 0);
        let audits = store.audit_entries();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].source, "webform");
        assert_eq!(audits[0].outcome, "rejected");
    }
}
