use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::{Result, StoreError};

/// Meilisearch caps document-id batches at this size per call.
const DELETE_BATCH_SIZE: usize = 100;

/// Thin Meilisearch REST client for keeping the external search index in
/// step with the store. Index schema and queries belong to the search
/// collaborator; this client only adds and removes documents.
#[derive(Clone)]
pub struct SearchIndexClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    index: String,
}

impl SearchIndexClient {
    pub fn new(base_url: &str, api_key: &str, index: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            index: index.to_string(),
        }
    }

    /// Remove documents in batches of at most 100 ids. Per-batch failures
    /// are logged and skipped; deletions never fail because search is down.
    pub async fn delete_documents(&self, ids: &[String]) {
        for batch in ids.chunks(DELETE_BATCH_SIZE) {
            let url = format!(
                "{}/indexes/{}/documents/delete-batch",
                self.base_url, self.index
            );
            let result = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&batch)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    info!(count = batch.len(), "Deleted documents from search index");
                }
                Ok(resp) => {
                    warn!(status = resp.status().as_u16(), "Search index delete failed");
                }
                Err(e) => {
                    warn!(error = %e, "Search index unreachable during delete");
                }
            }
        }
    }

    /// Add or replace documents.
    pub async fn upsert_documents(&self, documents: &[Value]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let url = format!("{}/indexes/{}/documents", self.base_url, self.index);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(documents)
            .send()
            .await
            .map_err(|e| StoreError::Search(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(StoreError::Search(format!(
                "upsert returned HTTP {}",
                resp.status()
            )));
        }
        info!(count = documents.len(), "Upserted documents to search index");
        Ok(())
    }

    /// Ids currently present in the index (paged scroll).
    pub async fn list_document_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut offset = 0usize;
        let limit = 1000usize;

        loop {
            let url = format!(
                "{}/indexes/{}/documents?fields=id&limit={limit}&offset={offset}",
                self.base_url, self.index
            );
            let resp = self
                .http
                .get(&url)
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| StoreError::Search(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(StoreError::Search(format!(
                    "document listing returned HTTP {}",
                    resp.status()
                )));
            }

            let page: Value = resp
                .json()
                .await
                .map_err(|e| StoreError::Search(e.to_string()))?;
            let results = page
                .get("results")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let count = results.len();
            ids.extend(
                results
                    .iter()
                    .filter_map(|d| d.get("id"))
                    .map(|id| match id {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }),
            );
            if count < limit {
                break;
            }
            offset += limit;
        }
        Ok(ids)
    }
}
