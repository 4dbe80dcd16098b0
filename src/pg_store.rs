use crate::audit::NewAuditEntry;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    InboundMessage, Lead, LeadFilter, LeadMetadata, LeadPatch, NewInboundMessage, NewLead,
};
use crate::scoring::LeadScore;
use crate::store::{AuditSink, LeadStore, LeadUpsert};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed store.
///
/// Uses sequential runtime queries instead of CTEs for better sqlx
/// compatibility. Race safety for lead creation comes from the
/// UNIQUE constraint on `leads.phone`: INSERT .. ON CONFLICT DO
/// NOTHING, then fetch whichever row won.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgStore {
    async fn append_message(
        &self,
        message: NewInboundMessage,
    ) -> Result<InboundMessage, AppError> {
        sqlx::query_as::<_, InboundMessage>(
            r#"
            INSERT INTO inbound_messages
                (id, phone, content, external_id, direction, received_at, processed)
            VALUES ($1, $2, $3, $4, $5, $6, false)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&message.phone)
        .bind(&message.content)
        .bind(&message.external_id)
        .bind(&message.direction)
        .bind(message.received_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to append inbound message")
    }

    async fn mark_message_processed(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE inbound_messages SET processed = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to mark message processed")?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Message {} not found", id)));
        }
        Ok(())
    }

    async fn find_or_create_lead(&self, seed: NewLead) -> Result<LeadUpsert, AppError> {
        let inserted = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads
                (id, phone, name, email, status, intent, budget_min, budget_max,
                 regions, property_type, notes, score, metadata)
            VALUES ($1, $2, $3, $4, 'new', $5, $6, $7, $8, $9, $10, 0, '{}'::jsonb)
            ON CONFLICT (phone) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&seed.phone)
        .bind(&seed.name)
        .bind(&seed.email)
        .bind(&seed.intent)
        .bind(&seed.budget_min)
        .bind(&seed.budget_max)
        .bind(&seed.regions)
        .bind(&seed.property_type)
        .bind(&seed.notes)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert lead")?;

        if let Some(lead) = inserted {
            tracing::info!("✓ Created lead {} for phone {}", lead.id, lead.phone);
            return Ok(LeadUpsert {
                lead,
                created: true,
            });
        }

        // Lost the insert race or the lead already existed; fetch the
        // winning row.
        let existing = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE phone = $1")
            .bind(&seed.phone)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch lead after conflict")?
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "Lead for phone {} disappeared during upsert",
                    seed.phone
                ))
            })?;

        tracing::debug!("Found existing lead {} for phone {}", existing.id, existing.phone);
        Ok(LeadUpsert {
            lead: existing,
            created: false,
        })
    }

    async fn fill_missing_profile(&self, id: Uuid, seed: &NewLead) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET email = COALESCE(email, $2),
                intent = COALESCE(intent, $3),
                budget_min = COALESCE(budget_min, $4),
                budget_max = COALESCE(budget_max, $5),
                regions = CASE WHEN cardinality(regions) = 0 THEN $6 ELSE regions END,
                property_type = COALESCE(property_type, $7),
                notes = COALESCE(notes, $8),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&seed.email)
        .bind(&seed.intent)
        .bind(&seed.budget_min)
        .bind(&seed.budget_max)
        .bind(&seed.regions)
        .bind(&seed.property_type)
        .bind(&seed.notes)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to merge lead profile")?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    async fn save_score(
        &self,
        id: Uuid,
        result: &LeadScore,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let overlay = LeadMetadata::score_overlay(result, at)?;

        let updated = sqlx::query(
            r#"
            UPDATE leads
            SET score = $2,
                metadata = COALESCE(metadata, '{}'::jsonb) || $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(result.score)
        .bind(&overlay)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to persist score for lead {}", id))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", id)));
        }
        Ok(())
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch lead")
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR metadata->>'priority' = $2)
              AND ($3::int4 IS NULL OR score >= $3)
              AND ($4::text IS NULL OR phone = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(&filter.status)
        .bind(&filter.priority)
        .bind(filter.min_score)
        .bind(&filter.phone)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list leads")
    }

    async fn update_lead(&self, id: Uuid, patch: &LeadPatch) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                intent = COALESCE($4, intent),
                budget_min = COALESCE($5, budget_min),
                budget_max = COALESCE($6, budget_max),
                regions = COALESCE($7, regions),
                property_type = COALESCE($8, property_type),
                notes = COALESCE($9, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(&patch.intent)
        .bind(&patch.budget_min)
        .bind(&patch.budget_max)
        .bind(&patch.regions)
        .bind(&patch.property_type)
        .bind(&patch.notes)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to update lead {}", id))?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    async fn set_status(&self, id: Uuid, status: &str) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to update status for lead {}", id))?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    async fn recent_messages(
        &self,
        phone: &str,
        limit: i64,
    ) -> Result<Vec<InboundMessage>, AppError> {
        sqlx::query_as::<_, InboundMessage>(
            r#"
            SELECT * FROM inbound_messages
            WHERE phone = $1
            ORDER BY received_at DESC, created_at DESC
            LIMIT $2
            "#,
        )
        .bind(phone)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch conversation history")
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn record_audit(&self, entry: NewAuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO ingest_audit
                (id, source, phone, payload, payload_sha256, outcome, detail)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.source)
        .bind(&entry.phone)
        .bind(&entry.payload)
        .bind(&entry.payload_sha256)
        .bind(entry.outcome.as_str())
        .bind(&entry.detail)
        .execute(&self.pool)
        .await
        .context("Failed to record audit entry")?;

        Ok(())
    }
}
