//! Script to re-score every lead after a scoring-rule change.

use chrono::Utc;
use dotenvy::dotenv;
use imob_lead_api::models::Lead;
use imob_lead_api::pg_store::PgStore;
use imob_lead_api::scoring::score_lead;
use imob_lead_api::store::LeadStore;
use sqlx::postgres::PgPoolOptions;
use std::env;

/// Main entry point for the re-score script.
///
/// Walks all leads, recomputes each score from the stored profile
/// (notes stand in for the latest message), and rewrites score and
/// metadata for every lead whose result changed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database. Starting lead re-score...");

    let leads = sqlx::query_as::<_, Lead>("SELECT * FROM leads ORDER BY created_at")
        .fetch_all(&pool)
        .await?;
    let total = leads.len();

    let store = PgStore::new(pool.clone());
    let mut changed = 0;

    for lead in leads {
        let result = score_lead(&lead.profile(), None);
        if result.score != lead.score || lead.metadata.priority != Some(result.priority) {
            tracing::info!(
                "Lead {} ({}): score {} → {} ({})",
                lead.id,
                lead.phone,
                lead.score,
                result.score,
                result.priority
            );
            store.save_score(lead.id, &result, Utc::now()).await?;
            changed += 1;
        }
    }

    tracing::info!("Re-score complete. Updated {} of {} leads.", changed, total);

    Ok(())
}
