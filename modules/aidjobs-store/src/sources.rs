use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use aidjobs_common::{CrawlStatus, Source, SourceKind, SourceStatus};

use crate::Result;

const SOURCE_COLUMNS: &str = "id, org_name, careers_url, kind, parser_hint, org_category, \
     status, cadence_days, last_crawled_at, last_crawl_status, last_crawl_message, \
     consecutive_failures, consecutive_nochange, next_run_at, etag, last_modified";

/// Post-crawl bookkeeping written back onto the source row.
#[derive(Debug, Clone)]
pub struct SourceUpdate {
    pub last_crawl_status: CrawlStatus,
    pub last_crawl_message: String,
    pub consecutive_failures: i32,
    pub consecutive_nochange: i32,
    pub next_run_at: DateTime<Utc>,
    pub status: SourceStatus,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Clone)]
pub struct SourceStore {
    pool: PgPool,
}

impl SourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active sources due for crawling, never-run first, capped.
    pub async fn due_sources(&self, limit: i64) -> Result<Vec<Source>> {
        let rows = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources \
             WHERE status = 'active' AND (next_run_at IS NULL OR next_run_at <= NOW()) \
             ORDER BY next_run_at NULLS FIRST \
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_source).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Source>> {
        let row = sqlx::query(&format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(map_source))
    }

    /// Apply the orchestrator's post-crawl bookkeeping. Sources are mutated
    /// only through this path.
    pub async fn update_after_crawl(&self, id: Uuid, update: &SourceUpdate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources SET
                last_crawled_at = NOW(),
                last_crawl_status = $1,
                last_crawl_message = $2,
                consecutive_failures = $3,
                consecutive_nochange = $4,
                next_run_at = $5,
                status = $6,
                etag = COALESCE($7, etag),
                last_modified = COALESCE($8, last_modified),
                updated_at = NOW()
            WHERE id = $9
            "#,
        )
        .bind(update.last_crawl_status.to_string())
        .bind(&update.last_crawl_message)
        .bind(update.consecutive_failures)
        .bind(update.consecutive_nochange)
        .bind(update.next_run_at)
        .bind(update.status.to_string())
        .bind(&update.etag)
        .bind(&update.last_modified)
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!(
            source_id = %id,
            next_run = %update.next_run_at,
            failures = update.consecutive_failures,
            nochange = update.consecutive_nochange,
            "Updated source after crawl"
        );
        Ok(())
    }
}

fn map_source(row: &PgRow) -> Source {
    let kind: String = row.try_get("kind").unwrap_or_else(|_| "html".to_string());
    let org_category: String = row
        .try_get("org_category")
        .unwrap_or_else(|_| "other".to_string());
    let status: String = row.try_get("status").unwrap_or_else(|_| "active".to_string());
    let last_crawl_status: Option<String> = row.try_get("last_crawl_status").ok().flatten();

    Source {
        id: row.try_get("id").unwrap_or_else(|_| Uuid::nil()),
        org_name: row.try_get("org_name").unwrap_or_default(),
        careers_url: row.try_get("careers_url").unwrap_or_default(),
        kind: kind.parse().unwrap_or(SourceKind::Html),
        parser_hint: row.try_get("parser_hint").ok().flatten(),
        org_category: org_category.parse().unwrap_or(aidjobs_common::OrgCategory::Other),
        status: status.parse().unwrap_or(SourceStatus::Active),
        cadence_days: row.try_get("cadence_days").ok().flatten(),
        last_crawled_at: row.try_get("last_crawled_at").ok().flatten(),
        last_crawl_status: last_crawl_status.and_then(|s| s.parse().ok()),
        last_crawl_message: row.try_get("last_crawl_message").ok().flatten(),
        consecutive_failures: row.try_get("consecutive_failures").unwrap_or(0),
        consecutive_nochange: row.try_get("consecutive_nochange").unwrap_or(0),
        next_run_at: row.try_get("next_run_at").ok().flatten(),
        etag: row.try_get("etag").ok().flatten(),
        last_modified: row.try_get("last_modified").ok().flatten(),
    }
}
