use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use aidjobs_store::{DeleteFilter, DeleteMode, JobStore, SearchIndexClient, SourceStore};

use crate::link_validator::LinkValidator;
use crate::orchestrator::Orchestrator;

/// Named operations consumed by the collaborator front-end. Every call
/// returns the uniform `{status, data, error}` envelope.
pub struct AdminOps {
    orchestrator: Arc<Orchestrator>,
    sources: SourceStore,
    jobs: JobStore,
    search: Option<SearchIndexClient>,
    links: LinkValidator,
    /// Production masks internals; dev returns full error text.
    dev_mode: bool,
}

impl AdminOps {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        sources: SourceStore,
        jobs: JobStore,
        search: Option<SearchIndexClient>,
        links: LinkValidator,
        dev_mode: bool,
    ) -> Self {
        Self {
            orchestrator,
            sources,
            jobs,
            search,
            links,
            dev_mode,
        }
    }

    fn ok(data: Value) -> Value {
        json!({ "status": "ok", "data": data, "error": null })
    }

    fn err(&self, error: impl std::fmt::Display) -> Value {
        let message = if self.dev_mode {
            error.to_string()
        } else {
            "internal error".to_string()
        };
        json!({ "status": "error", "data": null, "error": message })
    }

    /// Trigger one crawl of a specific source, bypassing its schedule.
    pub async fn run_source(&self, id: Uuid) -> Value {
        match self.sources.get(id).await {
            Ok(Some(source)) => {
                let org_name = source.org_name.clone();
                Arc::clone(&self.orchestrator)
                    .run_source_with_lock(source)
                    .await;
                Self::ok(json!({ "ran": org_name }))
            }
            Ok(None) => json!({ "status": "error", "data": null, "error": "source not found" }),
            Err(e) => self.err(e),
        }
    }

    /// Run one scheduler tick now.
    pub async fn run_due(&self) -> Value {
        match Arc::clone(&self.orchestrator).run_due_once().await {
            Ok(queued) => Self::ok(json!({ "queued": queued })),
            Err(e) => self.err(e),
        }
    }

    /// Soft-delete jobs whose deadline has passed.
    pub async fn cleanup_expired(&self) -> Value {
        match self.jobs.cleanup_expired().await {
            Ok(outcome) => Self::ok(json!({
                "deleted_count": outcome.deleted_count,
                "deleted_ids": outcome.deleted_ids.iter().take(100).map(Uuid::to_string).collect::<Vec<_>>(),
            })),
            Err(e) => self.err(e),
        }
    }

    /// Bulk delete with soft/hard modes and optional pre-delete export.
    pub async fn delete_bulk(
        &self,
        filter: DeleteFilter,
        mode: DeleteMode,
        reason: Option<String>,
        export: bool,
    ) -> Value {
        let exported = if export {
            match self.jobs.search_documents(&filter.job_ids).await {
                Ok(docs) => Some(docs),
                Err(_) => None,
            }
        } else {
            None
        };

        match self
            .jobs
            .delete_bulk(&filter, mode, reason.as_deref(), "admin")
            .await
        {
            Ok(outcome) => Self::ok(json!({
                "deleted_count": outcome.deleted_count,
                "deleted_ids": outcome.deleted_ids.iter().take(100).map(Uuid::to_string).collect::<Vec<_>>(),
                "deletion_type": match mode { DeleteMode::Soft => "soft", DeleteMode::Hard => "hard" },
                "exported_data": exported,
            })),
            Err(e) => self.err(e),
        }
    }

    /// Restore soft-deleted jobs.
    pub async fn restore(&self, job_ids: Vec<Uuid>) -> Value {
        match self.jobs.restore(&job_ids).await {
            Ok(restored) => Self::ok(json!({
                "restored_count": restored.len(),
                "restored_ids": restored.iter().map(Uuid::to_string).collect::<Vec<_>>(),
            })),
            Err(e) => self.err(e),
        }
    }

    /// Validate apply URLs, by job id or raw URL, with a daily cache.
    pub async fn validate_links(
        &self,
        job_ids: Vec<Uuid>,
        urls: Vec<String>,
        use_cache: bool,
    ) -> Value {
        let mut targets = urls;
        if !job_ids.is_empty() {
            match self.jobs.apply_urls(&job_ids).await {
                Ok(pairs) => targets.extend(pairs.into_iter().map(|(_, url)| url)),
                Err(e) => return self.err(e),
            }
        }

        let results = self.links.validate_batch(&targets, use_cache).await;
        let valid = results.iter().filter(|r| r.valid).count();
        Self::ok(json!({
            "checked": results.len(),
            "valid": valid,
            "invalid": results.len() - valid,
            "results": results,
        }))
    }

    /// Reconcile the search index against the store. Dry-run by default;
    /// `execute` applies the adds and removals.
    pub async fn sync_search_index(&self, execute: bool) -> Value {
        let search = match &self.search {
            Some(s) => s,
            None => {
                return json!({
                    "status": "error", "data": null, "error": "search index not configured"
                })
            }
        };

        let active_ids = match self.jobs.active_job_ids().await {
            Ok(ids) => ids,
            Err(e) => return self.err(e),
        };
        let indexed_ids = match search.list_document_ids().await {
            Ok(ids) => ids,
            Err(e) => return self.err(e),
        };

        let active_strings: Vec<String> = active_ids.iter().map(Uuid::to_string).collect();
        let to_remove: Vec<String> = indexed_ids
            .iter()
            .filter(|id| !active_strings.contains(id))
            .cloned()
            .collect();
        let to_add: Vec<Uuid> = active_ids
            .iter()
            .filter(|id| !indexed_ids.contains(&id.to_string()))
            .copied()
            .collect();

        if execute {
            if !to_remove.is_empty() {
                search.delete_documents(&to_remove).await;
            }
            if !to_add.is_empty() {
                let documents = match self.jobs.search_documents(&to_add).await {
                    Ok(docs) => docs,
                    Err(e) => return self.err(e),
                };
                if let Err(e) = search.upsert_documents(&documents).await {
                    return self.err(e);
                }
            }
        }

        Self::ok(json!({
            "executed": execute,
            "to_add": to_add.len(),
            "to_remove": to_remove.len(),
            "indexed": indexed_ids.len(),
            "active": active_ids.len(),
        }))
    }
}
