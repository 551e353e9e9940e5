use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use aidjobs_common::{truncate_message, CrawlLog, CrawlOutcome, CrawlStatus};

use crate::Result;

/// Crawl-log messages are stored truncated to this many chars.
const MESSAGE_LIMIT: usize = 500;

/// Append-only record per source run. Retention is handled externally.
#[derive(Clone)]
pub struct CrawlLogStore {
    pool: PgPool,
}

impl CrawlLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write one crawl log row. Logs a warning on failure rather than
    /// propagating; a lost log line must not fail the crawl.
    pub async fn record(&self, source_id: Uuid, outcome: &CrawlOutcome) {
        let result = sqlx::query(
            r#"
            INSERT INTO crawl_logs
                (source_id, ran_at, duration_ms, found, inserted, updated, skipped, status, message)
            VALUES ($1, NOW(), $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(source_id)
        .bind(outcome.duration_ms)
        .bind(outcome.counts.found as i32)
        .bind(outcome.counts.inserted as i32)
        .bind(outcome.counts.updated as i32)
        .bind(outcome.counts.skipped as i32)
        .bind(outcome.status.to_string())
        .bind(truncate_message(&outcome.message, MESSAGE_LIMIT))
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(%source_id, error = %e, "Failed to record crawl log");
        }
    }

    /// Most recent runs for a source, newest first.
    pub async fn recent(&self, source_id: Uuid, limit: i64) -> Result<Vec<CrawlLog>> {
        let rows = sqlx::query(
            "SELECT id, source_id, ran_at, duration_ms, found, inserted, updated, skipped, \
                    status, message \
             FROM crawl_logs WHERE source_id = $1 ORDER BY ran_at DESC LIMIT $2",
        )
        .bind(source_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CrawlLog {
                id: row.try_get("id").unwrap_or_else(|_| Uuid::nil()),
                source_id: row.try_get("source_id").unwrap_or_else(|_| Uuid::nil()),
                ran_at: row.try_get("ran_at").unwrap_or_else(|_| chrono::Utc::now()),
                duration_ms: row.try_get("duration_ms").unwrap_or(0),
                found: row.try_get("found").unwrap_or(0),
                inserted: row.try_get("inserted").unwrap_or(0),
                updated: row.try_get("updated").unwrap_or(0),
                skipped: row.try_get("skipped").unwrap_or(0),
                status: row
                    .try_get::<String, _>("status")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(CrawlStatus::Ok),
                message: row.try_get("message").unwrap_or_default(),
            })
            .collect())
    }
}
