use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::{PgPool, Row};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Per-URL validation timeout.
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);
/// Concurrent validations.
const MAX_CONCURRENT: usize = 5;
/// Cached verdicts stay fresh for a day.
const CACHE_TTL_HOURS: i32 = 24;

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub url: String,
    pub valid: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub from_cache: bool,
}

/// Validates apply URLs with a HEAD-then-GET probe and a Postgres-backed
/// cache so repeat validations stay cheap.
pub struct LinkValidator {
    http: reqwest::Client,
    pool: PgPool,
    semaphore: Arc<Semaphore>,
}

impl LinkValidator {
    pub fn new(pool: PgPool) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(aidjobs_fetch::USER_AGENT)
            .timeout(VALIDATION_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            pool,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT)),
        }
    }

    /// Validate a batch of URLs, bounded by the internal semaphore.
    pub async fn validate_batch(&self, urls: &[String], use_cache: bool) -> Vec<ValidationResult> {
        let futures = urls.iter().map(|url| self.validate(url, use_cache));
        futures::future::join_all(futures).await
    }

    pub async fn validate(&self, url: &str, use_cache: bool) -> ValidationResult {
        if use_cache {
            if let Some(cached) = self.cached(url).await {
                return cached;
            }
        }

        let _permit = self.semaphore.acquire().await;

        let result = self.probe(url).await;
        self.cache(&result).await;
        result
    }

    /// HEAD first; servers that reject HEAD get one GET.
    async fn probe(&self, url: &str) -> ValidationResult {
        match self.http.head(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                return ValidationResult {
                    url: url.to_string(),
                    valid: true,
                    status: Some(resp.status().as_u16()),
                    error: None,
                    from_cache: false,
                };
            }
            Ok(resp) if resp.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED => {
                debug!(url, "HEAD not allowed, retrying with GET");
            }
            Ok(resp) => {
                return ValidationResult {
                    url: url.to_string(),
                    valid: false,
                    status: Some(resp.status().as_u16()),
                    error: None,
                    from_cache: false,
                };
            }
            Err(e) => {
                debug!(url, error = %e, "HEAD failed, retrying with GET");
            }
        }

        match self.http.get(url).send().await {
            Ok(resp) => ValidationResult {
                url: url.to_string(),
                valid: resp.status().is_success(),
                status: Some(resp.status().as_u16()),
                error: None,
                from_cache: false,
            },
            Err(e) => ValidationResult {
                url: url.to_string(),
                valid: false,
                status: None,
                error: Some(e.to_string()),
                from_cache: false,
            },
        }
    }

    async fn cached(&self, url: &str) -> Option<ValidationResult> {
        let row = sqlx::query(&format!(
            "SELECT valid, status FROM link_validations \
             WHERE url = $1 AND validated_at > NOW() - INTERVAL '{CACHE_TTL_HOURS} hours'"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .ok()??;

        Some(ValidationResult {
            url: url.to_string(),
            valid: row.try_get("valid").unwrap_or(false),
            status: row
                .try_get::<Option<i32>, _>("status")
                .ok()
                .flatten()
                .map(|s| s as u16),
            error: None,
            from_cache: true,
        })
    }

    async fn cache(&self, result: &ValidationResult) {
        let outcome = sqlx::query(
            r#"
            INSERT INTO link_validations (url, valid, status, validated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (url) DO UPDATE
                SET valid = $2, status = $3, validated_at = NOW()
            "#,
        )
        .bind(&result.url)
        .bind(result.valid)
        .bind(result.status.map(|s| s as i32))
        .execute(&self.pool)
        .await;

        if let Err(e) = outcome {
            warn!(url = %result.url, error = %e, "Failed to cache link validation");
        }
    }
}
