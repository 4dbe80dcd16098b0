use crate::audit::{AuditEntry, NewAuditEntry};
use crate::errors::AppError;
use crate::models::{
    InboundMessage, Lead, LeadFilter, LeadMetadata, LeadPatch, NewInboundMessage, NewLead,
};
use crate::scoring::LeadScore;
use crate::store::{AuditSink, LeadStore, LeadUpsert};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// In-memory store with the same semantics as `PgStore`: one lead
/// per phone, append-only messages, metadata overlays that keep
/// unrelated keys. Backs the black-box test suites and local runs
/// without a database.
///
/// A single mutex guards all three collections, which mirrors the
/// uniqueness guarantee the database constraint provides. The lock
/// is never held across an await point.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    leads: Vec<Lead>,
    messages: Vec<InboundMessage>,
    audits: Vec<AuditEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::InternalError("Memory store mutex poisoned".to_string()))
    }

    /// Snapshot of recorded audit entries, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .map(|inner| inner.audits.clone())
            .unwrap_or_default()
    }

    pub fn lead_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.leads.len()).unwrap_or(0)
    }

    pub fn message_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.messages.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn append_message(
        &self,
        message: NewInboundMessage,
    ) -> Result<InboundMessage, AppError> {
        let record = InboundMessage {
            id: Uuid::new_v4(),
            phone: message.phone,
            content: message.content,
            external_id: message.external_id,
            direction: message.direction,
            received_at: message.received_at,
            processed: false,
            created_at: Utc::now(),
        };
        self.lock()?.messages.push(record.clone());
        Ok(record)
    }

    async fn mark_message_processed(&self, id: Uuid) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        let message = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;
        message.processed = true;
        Ok(())
    }

    async fn find_or_create_lead(&self, seed: NewLead) -> Result<LeadUpsert, AppError> {
        let mut inner = self.lock()?;

        if let Some(existing) = inner.leads.iter().find(|l| l.phone == seed.phone) {
            return Ok(LeadUpsert {
                lead: existing.clone(),
                created: false,
            });
        }

        let lead = Lead {
            id: Uuid::new_v4(),
            phone: seed.phone,
            name: seed.name,
            email: seed.email,
            status: "new".to_string(),
            intent: seed.intent,
            budget_min: seed.budget_min,
            budget_max: seed.budget_max,
            regions: seed.regions,
            property_type: seed.property_type,
            notes: seed.notes,
            score: 0,
            metadata: LeadMetadata::default(),
            created_at: Utc::now(),
            updated_at: None,
        };
        inner.leads.push(lead.clone());
        Ok(LeadUpsert {
            lead,
            created: true,
        })
    }

    async fn fill_missing_profile(&self, id: Uuid, seed: &NewLead) -> Result<Lead, AppError> {
        let mut inner = self.lock()?;
        let lead = find_lead_mut(&mut inner, id)?;

        if lead.email.is_none() {
            lead.email = seed.email.clone();
        }
        if lead.intent.is_none() {
            lead.intent = seed.intent.clone();
        }
        if lead.budget_min.is_none() {
            lead.budget_min = seed.budget_min.clone();
        }
        if lead.budget_max.is_none() {
            lead.budget_max = seed.budget_max.clone();
        }
        if lead.regions.is_empty() {
            lead.regions = seed.regions.clone();
        }
        if lead.property_type.is_none() {
            lead.property_type = seed.property_type.clone();
        }
        if lead.notes.is_none() {
            lead.notes = seed.notes.clone();
        }
        lead.updated_at = Some(Utc::now());
        Ok(lead.clone())
    }

    async fn save_score(
        &self,
        id: Uuid,
        result: &LeadScore,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        let lead = find_lead_mut(&mut inner, id)?;
        lead.score = result.score;
        lead.metadata.apply_score(result, at);
        lead.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.lock()?.leads.iter().find(|l| l.id == id).cloned())
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        let inner = self.lock()?;
        let mut matches: Vec<Lead> = inner
            .leads
            .iter()
            .filter(|l| {
                filter.status.as_deref().map_or(true, |s| l.status == s)
                    && filter.priority.as_deref().map_or(true, |p| {
                        l.metadata
                            .priority
                            .map_or(false, |stored| stored.as_str() == p)
                    })
                    && filter.min_score.map_or(true, |min| l.score >= min)
                    && filter.phone.as_deref().map_or(true, |p| l.phone == p)
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn update_lead(&self, id: Uuid, patch: &LeadPatch) -> Result<Lead, AppError> {
        let mut inner = self.lock()?;
        let lead = find_lead_mut(&mut inner, id)?;

        if let Some(name) = &patch.name {
            lead.name = name.clone();
        }
        if let Some(email) = &patch.email {
            lead.email = Some(email.clone());
        }
        if let Some(intent) = &patch.intent {
            lead.intent = Some(intent.clone());
        }
        if let Some(budget_min) = &patch.budget_min {
            lead.budget_min = Some(budget_min.clone());
        }
        if let Some(budget_max) = &patch.budget_max {
            lead.budget_max = Some(budget_max.clone());
        }
        if let Some(regions) = &patch.regions {
            lead.regions = regions.clone();
        }
        if let Some(property_type) = &patch.property_type {
            lead.property_type = Some(property_type.clone());
        }
        if let Some(notes) = &patch.notes {
            lead.notes = Some(notes.clone());
        }
        lead.updated_at = Some(Utc::now());
        Ok(lead.clone())
    }

    async fn set_status(&self, id: Uuid, status: &str) -> Result<Lead, AppError> {
        let mut inner = self.lock()?;
        let lead = find_lead_mut(&mut inner, id)?;
        lead.status = status.to_string();
        lead.updated_at = Some(Utc::now());
        Ok(lead.clone())
    }

    async fn recent_messages(
        &self,
        phone: &str,
        limit: i64,
    ) -> Result<Vec<InboundMessage>, AppError> {
        let inner = self.lock()?;
        let mut matches: Vec<InboundMessage> = inner
            .messages
            .iter()
            .filter(|m| m.phone == phone)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        matches.truncate(limit.max(0) as usize);
        Ok(matches)
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record_audit(&self, entry: NewAuditEntry) -> Result<(), AppError> {
        let record = AuditEntry {
            id: Uuid::new_v4(),
            source: entry.source,
            phone: entry.phone,
            payload: entry.payload,
            payload_sha256: entry.payload_sha256,
            outcome: entry.outcome.as_str().to_string(),
            detail: entry.detail,
            created_at: Utc::now(),
        };
        self.lock()?.audits.push(record);
        Ok(())
    }
}

fn find_lead_mut(inner: &mut Inner, id: Uuid) -> Result<&mut Lead, AppError> {
    inner
        .leads
        .iter_mut()
        .find(|l| l.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(phone: &str) -> NewLead {
        NewLead {
            phone: phone.to_string(),
            name: "Test Lead".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn find_or_create_is_keyed_by_phone() {
        let store = MemoryStore::new();

        let first = store.find_or_create_lead(seed("+5561999990000")).await.unwrap();
        assert!(first.created);

        let second = store.find_or_create_lead(seed("+5561999990000")).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.lead.id, second.lead.id);
        assert_eq!(store.lead_count(), 1);
    }

    #[tokio::test]
    async fn save_score_keeps_foreign_metadata_keys() {
        let store = MemoryStore::new();
        let upsert = store.find_or_create_lead(seed("+5561999990000")).await.unwrap();

        {
            let mut inner = store.inner.lock().unwrap();
            inner.leads[0]
                .metadata
                .extra
                .insert("campaign".to_string(), serde_json::json!("instagram"));
        }

        let result = crate::scoring::score_lead(&upsert.lead.profile(), None);
        store
            .save_score(upsert.lead.id, &result, Utc::now())
            .await
            .unwrap();

        let stored = store.get_lead(upsert.lead.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.extra["campaign"], "instagram");
        assert!(stored.metadata.priority.is_some());
    }

    #[tokio::test]
    async fn fill_missing_does_not_overwrite() {
        let store = MemoryStore::new();
        let mut initial = seed("+5561999990000");
        initial.intent = Some("purchase".to_string());
        let upsert = store.find_or_create_lead(initial).await.unwrap();

        let mut merge = seed("+5561999990000");
        merge.intent = Some("rental".to_string());
        merge.property_type = Some("house".to_string());
        let merged = store.fill_missing_profile(upsert.lead.id, &merge).await.unwrap();

        assert_eq!(merged.intent.as_deref(), Some("purchase"));
        assert_eq!(merged.property_type.as_deref(), Some("house"));
    }
}
