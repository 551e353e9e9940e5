use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Result;

/// Locks older than this are considered abandoned (a crashed crawler) and
/// reaped at acquisition time. Crawls are bounded far below this by the
/// transport timeouts.
const STALE_LOCK_MINUTES: i32 = 15;

/// Short-lived exclusion records keyed by source id. At most one lock per
/// source; acquisition is an atomic insert against a unique constraint.
#[derive(Clone)]
pub struct LockStore {
    pool: PgPool,
}

impl LockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Try to acquire the lock for a source. Returns false when another
    /// crawl holds it. The lock table is provisioned lazily on first miss.
    pub async fn acquire(&self, source_id: Uuid) -> Result<bool> {
        self.reap_stale(source_id).await;

        let result = sqlx::query(
            "INSERT INTO crawl_locks (source_id, locked_at) VALUES ($1, NOW())",
        )
        .bind(source_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(%source_id, "Lock already held, skipping");
                Ok(false)
            }
            Err(e) if is_missing_table(&e) => {
                info!("crawl_locks table missing, provisioning");
                self.ensure_table().await?;
                let retry = sqlx::query(
                    "INSERT INTO crawl_locks (source_id, locked_at) VALUES ($1, NOW())",
                )
                .bind(source_id)
                .execute(&self.pool)
                .await;
                match retry {
                    Ok(_) => Ok(true),
                    Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Release the lock. Called on every exit path of a crawl.
    pub async fn release(&self, source_id: Uuid) {
        let result = sqlx::query("DELETE FROM crawl_locks WHERE source_id = $1")
            .bind(source_id)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!(%source_id, error = %e, "Failed to release crawl lock");
        }
    }

    /// Delete an abandoned lock for this source, if its holder crashed.
    async fn reap_stale(&self, source_id: Uuid) {
        let result = sqlx::query(&format!(
            "DELETE FROM crawl_locks WHERE source_id = $1 \
             AND locked_at < NOW() - INTERVAL '{STALE_LOCK_MINUTES} minutes'"
        ))
        .bind(source_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                warn!(%source_id, "Reaped stale crawl lock");
            }
            _ => {}
        }
    }

    async fn ensure_table(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS crawl_locks (
                source_id UUID PRIMARY KEY,
                locked_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn is_missing_table(error: &sqlx::Error) -> bool {
    match error {
        // 42P01: undefined_table
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("42P01"),
        _ => false,
    }
}
