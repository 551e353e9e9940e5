use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use aidjobs_common::{CrawlCounts, EnrichmentBlock, JobDraft};

use crate::failed::FailedInsertLog;
use crate::query::QueryBuilder;
use crate::search::SearchIndexClient;
use crate::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Soft,
    Hard,
}

/// Filter for bulk deletion; at least one selector is required so a bare
/// request can never delete the whole table.
#[derive(Debug, Clone, Default)]
pub struct DeleteFilter {
    pub job_ids: Vec<Uuid>,
    pub org_name: Option<String>,
    pub source_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl DeleteFilter {
    fn is_empty(&self) -> bool {
        self.job_ids.is_empty() && self.org_name.is_none() && self.source_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub deleted_count: usize,
    pub deleted_ids: Vec<Uuid>,
}

/// Counts callers use to gate destructive operations.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImpactCounts {
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub shortlists: i64,
    pub enrichment_reviews: i64,
    pub enrichment_history: i64,
    pub ground_truth: i64,
}

/// Storage adapter for jobs: canonical-hash upsert with restore, soft and
/// hard deletes mirrored to the search index, enrichment writes with
/// history snapshots.
#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
    table: String,
    search: Option<SearchIndexClient>,
    failed: FailedInsertLog,
}

impl JobStore {
    pub fn new(pool: PgPool, search: Option<SearchIndexClient>) -> Self {
        let failed = FailedInsertLog::new(pool.clone());
        Self {
            pool,
            table: "jobs".to_string(),
            search,
            failed,
        }
    }

    /// Shadow-mode store writing to `jobs_side` for comparison runs.
    pub fn shadow(pool: PgPool) -> Self {
        let failed = FailedInsertLog::new(pool.clone());
        Self {
            pool,
            table: "jobs_side".to_string(),
            search: None,
            failed,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Upsert a batch of drafts. Keyed on `canonical_hash`: a match updates
    /// mutable fields, bumps `last_seen_at`, and clears any soft-delete
    /// (restores count under `inserted`). Validation failures are skipped
    /// and logged; row-level DB errors never abort the batch.
    pub async fn upsert_drafts(
        &self,
        drafts: &[JobDraft],
        source_id: Uuid,
        source_url: &str,
    ) -> CrawlCounts {
        let mut counts = CrawlCounts {
            found: drafts.len() as u32,
            ..Default::default()
        };

        for draft in drafts {
            if let Err(reason) = validate_draft(draft) {
                counts.skipped += 1;
                self.failed
                    .record(source_url, "validate", &reason, &draft_payload(draft))
                    .await;
                continue;
            }

            match self.upsert_one(draft, source_id).await {
                Ok(UpsertAction::Inserted) | Ok(UpsertAction::Restored) => counts.inserted += 1,
                Ok(UpsertAction::Updated) => counts.updated += 1,
                // An unchanged match only bumps last_seen_at; re-crawling
                // the same page twice nets zero inserts and updates.
                Ok(UpsertAction::Unchanged) => {}
                Err(e) => {
                    counts.failed += 1;
                    warn!(title = %draft.title, error = %e, "Job upsert failed");
                    self.failed
                        .record(source_url, "insert", &e.to_string(), &draft_payload(draft))
                        .await;
                }
            }
        }

        info!(
            found = counts.found,
            inserted = counts.inserted,
            updated = counts.updated,
            skipped = counts.skipped,
            failed = counts.failed,
            "Upsert batch complete"
        );
        counts
    }

    async fn upsert_one(&self, draft: &JobDraft, source_id: Uuid) -> Result<UpsertAction> {
        let existing = sqlx::query(&format!(
            "SELECT id, deleted_at, title, apply_url, location_raw, deadline \
             FROM {} WHERE canonical_hash = $1",
            self.table
        ))
        .bind(&draft.canonical_hash)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(row) => {
                let was_deleted: Option<DateTime<Utc>> = row.try_get("deleted_at").ok().flatten();

                if was_deleted.is_none() && row_matches_draft(&row, draft) {
                    sqlx::query(&format!(
                        "UPDATE {} SET last_seen_at = NOW() WHERE canonical_hash = $1",
                        self.table
                    ))
                    .bind(&draft.canonical_hash)
                    .execute(&self.pool)
                    .await?;
                    return Ok(UpsertAction::Unchanged);
                }

                self.update_existing(draft).await?;
                if was_deleted.is_some() {
                    info!(title = %draft.title, "Restored soft-deleted job");
                    Ok(UpsertAction::Restored)
                } else {
                    Ok(UpsertAction::Updated)
                }
            }
            None => {
                self.insert_new(draft, source_id).await?;
                Ok(UpsertAction::Inserted)
            }
        }
    }

    async fn update_existing(&self, draft: &JobDraft) -> Result<()> {
        let mut qb = QueryBuilder::new();
        let mut binds: Vec<Bind> = Vec::new();

        push_draft_fields(&mut qb, &mut binds, draft, false);
        qb.raw_field("deleted_at", "NULL")
            .raw_field("deleted_by", "NULL")
            .raw_field("deletion_reason", "NULL")
            .raw_field("status", "'active'")
            .raw_field("last_seen_at", "NOW()")
            .raw_field("updated_at", "NOW()");

        let condition = format!("canonical_hash = {}", qb.next_placeholder());
        let sql = qb.update_sql(&self.table, &condition);
        debug_assert_eq!(qb.bound_count(), binds.len());

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = bind.apply(query);
        }
        query.bind(&draft.canonical_hash).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_new(&self, draft: &JobDraft, source_id: Uuid) -> Result<()> {
        let mut qb = QueryBuilder::new();
        let mut binds: Vec<Bind> = Vec::new();

        binds.push(Bind::Uuid(source_id));
        qb.field("source_id");
        binds.push(Bind::Text(draft.canonical_hash.clone()));
        qb.field("canonical_hash");

        push_draft_fields(&mut qb, &mut binds, draft, true);
        qb.raw_field("status", "'active'")
            .raw_field("fetched_at", "NOW()")
            .raw_field("last_seen_at", "NOW()");

        let sql = qb.insert_sql(&self.table);
        debug_assert_eq!(qb.bound_count(), binds.len());

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = bind.apply(query);
        }
        query.execute(&self.pool).await?;
        debug!(title = %draft.title, "Inserted job");
        Ok(())
    }

    /// Soft-delete active jobs whose deadline has passed.
    pub async fn cleanup_expired(&self) -> Result<DeleteOutcome> {
        let rows = sqlx::query(&format!(
            "UPDATE {} SET deleted_at = NOW(), deleted_by = 'system', \
             deletion_reason = 'deadline passed' \
             WHERE deleted_at IS NULL AND deadline IS NOT NULL AND deadline < CURRENT_DATE \
             RETURNING id",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;

        let deleted_ids: Vec<Uuid> = rows.iter().filter_map(|r| r.try_get("id").ok()).collect();
        self.remove_from_search(&deleted_ids).await;

        info!(count = deleted_ids.len(), "Cleaned up expired jobs");
        Ok(DeleteOutcome {
            deleted_count: deleted_ids.len(),
            deleted_ids,
        })
    }

    /// Bulk delete. Soft is the default, reversible path; hard removal
    /// requires a non-empty reason. Both mirror into the search index.
    pub async fn delete_bulk(
        &self,
        filter: &DeleteFilter,
        mode: DeleteMode,
        reason: Option<&str>,
        deleted_by: &str,
    ) -> Result<DeleteOutcome> {
        if filter.is_empty() {
            return Err(StoreError::Validation(
                "at least one filter is required: job_ids, org_name, or source_id".to_string(),
            ));
        }
        if mode == DeleteMode::Hard && reason.map_or(true, |r| r.trim().is_empty()) {
            return Err(StoreError::Validation(
                "a deletion reason is required for hard delete".to_string(),
            ));
        }

        let (where_sql, binds) = build_filter(filter, mode == DeleteMode::Soft, 1);

        let sql = match mode {
            DeleteMode::Hard => {
                format!("DELETE FROM {} WHERE {where_sql} RETURNING id", self.table)
            }
            DeleteMode::Soft => format!(
                "UPDATE {} SET deleted_at = NOW(), deleted_by = ${}, deletion_reason = ${} \
                 WHERE {where_sql} RETURNING id",
                self.table,
                binds.len() + 1,
                binds.len() + 2,
            ),
        };

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = bind.apply(query);
        }
        if mode == DeleteMode::Soft {
            query = query
                .bind(deleted_by.to_string())
                .bind(reason.unwrap_or("Bulk deletion via admin").to_string());
        }

        let rows = query.fetch_all(&self.pool).await?;
        let deleted_ids: Vec<Uuid> = rows.iter().filter_map(|r| r.try_get("id").ok()).collect();

        self.remove_from_search(&deleted_ids).await;

        info!(count = deleted_ids.len(), ?mode, "Bulk delete complete");
        Ok(DeleteOutcome {
            deleted_count: deleted_ids.len(),
            deleted_ids,
        })
    }

    /// Restore soft-deleted jobs by id.
    pub async fn restore(&self, job_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "UPDATE {} SET deleted_at = NULL, deleted_by = NULL, deletion_reason = NULL \
             WHERE id = ANY($1) AND deleted_at IS NOT NULL \
             RETURNING id",
            self.table
        ))
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await?;

        let restored: Vec<Uuid> = rows.iter().filter_map(|r| r.try_get("id").ok()).collect();
        info!(count = restored.len(), "Restored jobs");
        Ok(restored)
    }

    /// Counts for gating destructive operations.
    pub async fn impact(&self, filter: &DeleteFilter) -> Result<ImpactCounts> {
        let (where_sql, binds) = build_filter(filter, false, 1);

        let sql = format!(
            "SELECT COUNT(*) AS total_jobs, \
                    COUNT(*) FILTER (WHERE deleted_at IS NULL) AS active_jobs \
             FROM {} WHERE {where_sql}",
            self.table
        );
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = bind.apply(query);
        }
        let row = query.fetch_one(&self.pool).await?;

        let mut counts = ImpactCounts {
            total_jobs: row.try_get("total_jobs").unwrap_or(0),
            active_jobs: row.try_get("active_jobs").unwrap_or(0),
            ..Default::default()
        };

        // Collaborator tables may not exist in every deployment; count
        // best-effort.
        counts.shortlists = self.count_related("shortlists", "job_id", filter).await;
        counts.enrichment_reviews = self
            .count_related("enrichment_reviews", "job_id", filter)
            .await;
        counts.enrichment_history = self
            .count_related("enrichment_history", "job_id", filter)
            .await;
        counts.ground_truth = self.count_related("ground_truth", "job_id", filter).await;

        Ok(counts)
    }

    async fn count_related(&self, table: &str, fk: &str, filter: &DeleteFilter) -> i64 {
        if filter.job_ids.is_empty() {
            return 0;
        }
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {fk} = ANY($1)");
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(&filter.job_ids)
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0)
    }

    /// Jobs upserted but not yet enriched at the current version.
    pub async fn jobs_needing_enrichment(&self, limit: i64) -> Result<Vec<(Uuid, String, String, Option<String>, Option<String>)>> {
        let rows = sqlx::query(&format!(
            "SELECT id, title, COALESCE(description_snippet, '') AS description, org_name, location_raw \
             FROM {} \
             WHERE deleted_at IS NULL AND enriched_at IS NULL \
             ORDER BY fetched_at DESC \
             LIMIT $1",
            self.table
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.try_get("id").unwrap_or_else(|_| Uuid::nil()),
                    row.try_get("title").unwrap_or_default(),
                    row.try_get("description").unwrap_or_default(),
                    row.try_get("org_name").ok().flatten(),
                    row.try_get("location_raw").ok().flatten(),
                )
            })
            .collect())
    }

    /// Persist an enrichment block, snapshotting the prior block into
    /// `enrichment_history` first.
    pub async fn save_enrichment(
        &self,
        job_id: Uuid,
        enrichment: &EnrichmentBlock,
        change_reason: &str,
        changed_by: &str,
    ) -> Result<()> {
        let before: Option<Value> = sqlx::query_scalar::<_, Option<Value>>(&format!(
            "SELECT enrichment FROM {} WHERE id = $1",
            self.table
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()
        .flatten();

        let after = serde_json::to_value(enrichment).unwrap_or_default();

        let history = sqlx::query(
            r#"
            INSERT INTO enrichment_history
                (job_id, enrichment_before, enrichment_after, change_reason, changed_by,
                 enrichment_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(job_id)
        .bind(&before)
        .bind(&after)
        .bind(change_reason)
        .bind(changed_by)
        .bind(enrichment.enrichment_version)
        .execute(&self.pool)
        .await;
        if let Err(e) = history {
            warn!(%job_id, error = %e, "Failed to record enrichment history");
        }

        sqlx::query(&format!(
            "UPDATE {} SET enrichment = $1, enriched_at = NOW(), \
             needs_review = (needs_review OR $2), updated_at = NOW() WHERE id = $3",
            self.table
        ))
        .bind(&after)
        .bind(enrichment.low_confidence)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load one job as the shared domain type.
    pub async fn get(&self, id: Uuid) -> Result<Option<aidjobs_common::Job>> {
        let row = sqlx::query(&format!(
            "SELECT id, source_id, org_name, title, apply_url, location_raw, country, \
                    country_iso, city, latitude, longitude, is_remote, deadline, \
                    description_snippet, canonical_hash, status, fetched_at, last_seen_at, \
                    deleted_at, deleted_by, deletion_reason, raw_metadata, enrichment, \
                    quality_score, quality_grade, quality_factors, quality_issues, needs_review \
             FROM {} WHERE id = $1",
            self.table
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_job))
    }

    /// Active (non-deleted) job ids, for search-index reconciliation.
    pub async fn active_job_ids(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(&format!(
            "SELECT id FROM {} WHERE deleted_at IS NULL",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().filter_map(|r| r.try_get("id").ok()).collect())
    }

    /// Minimal search documents for a set of jobs.
    pub async fn search_documents(&self, ids: &[Uuid]) -> Result<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT id, title, org_name, location_raw, country_iso, deadline, apply_url \
             FROM {} WHERE id = ANY($1) AND deleted_at IS NULL",
            self.table
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                json!({
                    "id": row.try_get::<Uuid, _>("id").map(|u| u.to_string()).unwrap_or_default(),
                    "title": row.try_get::<String, _>("title").unwrap_or_default(),
                    "org_name": row.try_get::<Option<String>, _>("org_name").ok().flatten(),
                    "location_raw": row.try_get::<Option<String>, _>("location_raw").ok().flatten(),
                    "country_iso": row.try_get::<Option<String>, _>("country_iso").ok().flatten(),
                    "deadline": row.try_get::<Option<NaiveDate>, _>("deadline").ok().flatten()
                        .map(|d| d.to_string()),
                    "apply_url": row.try_get::<String, _>("apply_url").unwrap_or_default(),
                })
            })
            .collect())
    }

    /// Apply URLs for a set of jobs (link validation).
    pub async fn apply_urls(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT id, apply_url FROM {} WHERE id = ANY($1)",
            self.table
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some((
                    r.try_get("id").ok()?,
                    r.try_get::<String, _>("apply_url").ok()?,
                ))
            })
            .collect())
    }

    async fn remove_from_search(&self, ids: &[Uuid]) {
        if ids.is_empty() {
            return;
        }
        if let Some(search) = &self.search {
            let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            search.delete_documents(&id_strings).await;
        }
    }
}

enum UpsertAction {
    Inserted,
    Updated,
    Restored,
    Unchanged,
}

/// Whether the stored mutable identity fields already match the draft.
fn row_matches_draft(row: &PgRow, draft: &JobDraft) -> bool {
    let title: String = row.try_get("title").unwrap_or_default();
    let apply_url: String = row.try_get("apply_url").unwrap_or_default();
    let location: Option<String> = row.try_get("location_raw").ok().flatten();
    let deadline: Option<NaiveDate> = row.try_get("deadline").ok().flatten();

    title == draft.title
        && apply_url == draft.apply_url
        && location == draft.location_raw
        && (draft.deadline.is_none() || deadline == draft.deadline)
}

/// Bindable value for dynamically-assembled statements.
enum Bind {
    Text(String),
    OptText(Option<String>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Float(f64),
    Bool(bool),
    Json(Value),
    Uuid(Uuid),
    UuidArray(Vec<Uuid>),
}

impl Bind {
    fn apply<'q>(
        self,
        query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        match self {
            Bind::Text(v) => query.bind(v),
            Bind::OptText(v) => query.bind(v),
            Bind::Date(v) => query.bind(v),
            Bind::Timestamp(v) => query.bind(v),
            Bind::Float(v) => query.bind(v),
            Bind::Bool(v) => query.bind(v),
            Bind::Json(v) => query.bind(v),
            Bind::Uuid(v) => query.bind(v),
            Bind::UuidArray(v) => query.bind(v),
        }
    }
}

/// Shared mutable-field assembly for insert and update. Optional fields are
/// only written when present so updates never blank existing data.
fn push_draft_fields(qb: &mut QueryBuilder, binds: &mut Vec<Bind>, draft: &JobDraft, insert: bool) {
    binds.push(Bind::Text(draft.title.clone()));
    qb.field("title");
    binds.push(Bind::Text(draft.apply_url.clone()));
    qb.field("apply_url");
    binds.push(Bind::OptText(draft.location_raw.clone()));
    qb.field("location_raw");

    if insert || draft.org_name.is_some() {
        binds.push(Bind::OptText(draft.org_name.clone()));
        qb.field("org_name");
    }
    if let Some(deadline) = draft.deadline {
        binds.push(Bind::Date(deadline));
        qb.field("deadline");
    }
    if let Some(description) = &draft.description_snippet {
        binds.push(Bind::Text(description.clone()));
        qb.field("description_snippet");
    }
    if let Some(level) = &draft.level_norm {
        binds.push(Bind::Text(level.clone()));
        qb.field("level_norm");
    }
    if let Some(career) = &draft.career_type {
        binds.push(Bind::Text(career.clone()));
        qb.field("career_type");
    }
    if let Some(modality) = &draft.work_modality {
        binds.push(Bind::Text(modality.clone()));
        qb.field("work_modality");
    }
    if !draft.mission_tags.is_empty() || insert {
        binds.push(Bind::Json(json!(draft.mission_tags)));
        qb.field("mission_tags");
    }
    if let Some(eligible) = draft.international_eligible {
        binds.push(Bind::Bool(eligible));
        qb.field("international_eligible");
    }

    // Geocoding block.
    if let Some(latitude) = draft.latitude {
        binds.push(Bind::Float(latitude));
        qb.field("latitude");
        qb.raw_field("geocoded_at", "NOW()");
    }
    if let Some(longitude) = draft.longitude {
        binds.push(Bind::Float(longitude));
        qb.field("longitude");
    }
    if let Some(source) = &draft.geocoding_source {
        binds.push(Bind::Text(source.clone()));
        qb.field("geocoding_source");
    }
    if let Some(is_remote) = draft.is_remote {
        binds.push(Bind::Bool(is_remote));
        qb.field("is_remote");
    }
    if let Some(country) = &draft.country {
        binds.push(Bind::Text(country.clone()));
        qb.field("country");
    }
    if let Some(iso) = &draft.country_iso {
        binds.push(Bind::Text(iso.clone()));
        qb.field("country_iso");
    }
    if let Some(city) = &draft.city {
        binds.push(Bind::Text(city.clone()));
        qb.field("city");
    }

    // Quality block.
    if let Some(quality) = &draft.quality {
        binds.push(Bind::Float(quality.score));
        qb.field("quality_score");
        qb.raw_field("quality_scored_at", "NOW()");
        binds.push(Bind::Text(quality.grade.to_string()));
        qb.field("quality_grade");
        binds.push(Bind::Json(json!(quality.factors)));
        qb.field("quality_factors");
        binds.push(Bind::Json(json!(quality.issues)));
        qb.field("quality_issues");
        binds.push(Bind::Bool(quality.needs_review));
        qb.field("needs_review");
    }

    if let Some(metadata) = &draft.raw_metadata {
        binds.push(Bind::Json(metadata.clone()));
        qb.field("raw_metadata");
    }
}

fn map_job(row: &PgRow) -> aidjobs_common::Job {
    let enrichment: Option<EnrichmentBlock> = row
        .try_get::<Option<Value>, _>("enrichment")
        .ok()
        .flatten()
        .and_then(|v| serde_json::from_value(v).ok());

    let quality = row
        .try_get::<Option<f64>, _>("quality_score")
        .ok()
        .flatten()
        .map(|score| aidjobs_common::QualityBlock {
            score,
            grade: row
                .try_get::<Option<String>, _>("quality_grade")
                .ok()
                .flatten()
                .and_then(|g| g.chars().next())
                .unwrap_or('F'),
            factors: row
                .try_get::<Option<Value>, _>("quality_factors")
                .ok()
                .flatten()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            issues: row
                .try_get::<Option<Value>, _>("quality_issues")
                .ok()
                .flatten()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            needs_review: row.try_get("needs_review").unwrap_or(false),
        });

    aidjobs_common::Job {
        id: row.try_get("id").unwrap_or_else(|_| Uuid::nil()),
        source_id: row.try_get("source_id").ok().flatten(),
        org_name: row.try_get("org_name").ok().flatten(),
        title: row.try_get("title").unwrap_or_default(),
        apply_url: row.try_get("apply_url").unwrap_or_default(),
        location_raw: row.try_get("location_raw").ok().flatten(),
        country: row.try_get("country").ok().flatten(),
        country_iso: row.try_get("country_iso").ok().flatten(),
        city: row.try_get("city").ok().flatten(),
        latitude: row.try_get("latitude").ok().flatten(),
        longitude: row.try_get("longitude").ok().flatten(),
        is_remote: row.try_get("is_remote").unwrap_or(false),
        deadline: row.try_get("deadline").ok().flatten(),
        description_snippet: row.try_get("description_snippet").ok().flatten(),
        canonical_hash: row.try_get("canonical_hash").unwrap_or_default(),
        status: row.try_get("status").unwrap_or_else(|_| "active".to_string()),
        fetched_at: row.try_get("fetched_at").unwrap_or_else(|_| Utc::now()),
        last_seen_at: row.try_get("last_seen_at").unwrap_or_else(|_| Utc::now()),
        deleted_at: row.try_get("deleted_at").ok().flatten(),
        deleted_by: row.try_get("deleted_by").ok().flatten(),
        deletion_reason: row.try_get("deletion_reason").ok().flatten(),
        raw_metadata: row.try_get("raw_metadata").ok().flatten(),
        enrichment,
        quality,
    }
}

/// Pre-upsert invariants: title length and a usable apply URL.
pub(crate) fn validate_draft(draft: &JobDraft) -> std::result::Result<(), String> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err("missing title".to_string());
    }
    if title.chars().count() < 3 {
        return Err(format!("title too short: {title}"));
    }
    let url = draft.apply_url.trim();
    if url.is_empty() {
        return Err("missing apply URL".to_string());
    }
    if url.starts_with('#') || url.starts_with("javascript:") {
        return Err(format!("invalid apply URL: {url}"));
    }
    Ok(())
}

fn draft_payload(draft: &JobDraft) -> Value {
    json!({
        "title": draft.title,
        "apply_url": draft.apply_url,
        "org_name": draft.org_name,
        "location_raw": draft.location_raw,
        "deadline": draft.deadline.map(|d| d.to_string()),
        "canonical_hash": draft.canonical_hash,
    })
}

/// Assemble a WHERE clause for the delete filter. Returns SQL plus binds;
/// placeholder numbering starts at `first_index`.
fn build_filter(filter: &DeleteFilter, only_live: bool, first_index: usize) -> (String, Vec<Bind>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    let mut index = first_index;

    if !filter.job_ids.is_empty() {
        clauses.push(format!("id = ANY(${index})"));
        binds.push(Bind::UuidArray(filter.job_ids.clone()));
        index += 1;
    }
    if let Some(ref org_name) = filter.org_name {
        clauses.push(format!("org_name ILIKE ${index}"));
        binds.push(Bind::Text(format!("%{org_name}%")));
        index += 1;
    }
    if let Some(source_id) = filter.source_id {
        clauses.push(format!("source_id = ${index}"));
        binds.push(Bind::Uuid(source_id));
        index += 1;
    }
    if let Some(from) = filter.date_from {
        clauses.push(format!("created_at >= ${index}"));
        binds.push(Bind::Timestamp(from));
        index += 1;
    }
    if let Some(to) = filter.date_to {
        clauses.push(format!("created_at <= ${index}"));
        binds.push(Bind::Timestamp(to));
        index += 1;
    }
    if only_live {
        clauses.push("deleted_at IS NULL".to_string());
    }

    let _ = index;
    let where_sql = if clauses.is_empty() {
        "TRUE".to_string()
    } else {
        clauses.join(" AND ")
    };

    (where_sql, binds)
}
