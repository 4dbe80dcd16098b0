use sqlx::{postgres::PgPoolOptions, PgPool};

/// One idempotent schema step. Every statement uses IF NOT EXISTS
/// so startup can re-run the whole list against an existing
/// database.
struct Migration {
    id: &'static str,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "001_leads",
        description: "leads table keyed by normalized phone",
        sql: r#"
            CREATE TABLE IF NOT EXISTS leads (
                id UUID PRIMARY KEY,
                phone TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                email TEXT,
                status TEXT NOT NULL DEFAULT 'new',
                intent TEXT,
                budget_min NUMERIC,
                budget_max NUMERIC,
                regions TEXT[] NOT NULL DEFAULT '{}',
                property_type TEXT,
                notes TEXT,
                score INTEGER NOT NULL DEFAULT 0,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ
            );
            CREATE INDEX IF NOT EXISTS idx_leads_status ON leads (status);
            CREATE INDEX IF NOT EXISTS idx_leads_score ON leads (score DESC);
            CREATE INDEX IF NOT EXISTS idx_leads_priority
                ON leads ((metadata->>'priority'));
        "#,
    },
    Migration {
        id: "002_inbound_messages",
        description: "append-only conversation history",
        sql: r#"
            CREATE TABLE IF NOT EXISTS inbound_messages (
                id UUID PRIMARY KEY,
                phone TEXT NOT NULL,
                content TEXT NOT NULL,
                external_id TEXT,
                direction TEXT NOT NULL DEFAULT 'inbound',
                received_at TIMESTAMPTZ NOT NULL,
                processed BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_inbound_messages_phone
                ON inbound_messages (phone, received_at DESC);
        "#,
    },
    Migration {
        id: "003_ingest_audit",
        description: "one audit row per intake call",
        sql: r#"
            CREATE TABLE IF NOT EXISTS ingest_audit (
                id UUID PRIMARY KEY,
                source TEXT NOT NULL,
                phone TEXT,
                payload JSONB NOT NULL,
                payload_sha256 TEXT NOT NULL,
                outcome TEXT NOT NULL,
                detail TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_ingest_audit_phone ON ingest_audit (phone);
            CREATE INDEX IF NOT EXISTS idx_ingest_audit_sha ON ingest_audit (payload_sha256);
        "#,
    },
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies the embedded schema. Safe to run on every startup.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for migration in MIGRATIONS {
            sqlx::raw_sql(migration.sql)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    anyhow::anyhow!("schema step {} failed: {}", migration.id, e)
                })?;
            tracing::debug!("Schema step {} ok ({})", migration.id, migration.description);
        }
        tracing::info!("Database schema verified ({} steps)", MIGRATIONS.len());
        Ok(())
    }
}
