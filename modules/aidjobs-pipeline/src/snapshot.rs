use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, error};

use aidjobs_common::{content_hash, extract_domain};

/// Append-only store of raw page bytes plus a sidecar metadata file,
/// keyed by SHA-256 of the URL and partitioned by domain:
/// `snapshots/<domain>/<sha256(url)>.html` + `.meta.json`.
pub struct SnapshotStore {
    base_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Write the raw body and its sidecar. Failures are logged, never
    /// propagated; snapshotting must not fail an extraction.
    pub async fn save(&self, url: &str, html: &str, extraction_result: serde_json::Value) {
        if let Err(e) = self.try_save(url, html, extraction_result).await {
            error!(url, error = %e, "Failed to save snapshot");
        }
    }

    async fn try_save(
        &self,
        url: &str,
        html: &str,
        extraction_result: serde_json::Value,
    ) -> std::io::Result<()> {
        let domain = extract_domain(url);
        let domain_dir = self.base_path.join(&domain);
        tokio::fs::create_dir_all(&domain_dir).await?;

        let url_hash = content_hash(url);
        let html_path = domain_dir.join(format!("{url_hash}.html"));
        tokio::fs::write(&html_path, html).await?;

        let metadata = serde_json::json!({
            "url": url,
            "domain": domain,
            "snapshot_at": Utc::now().to_rfc3339(),
            "html_size": html.len(),
            "extraction_result": extraction_result,
            "pipeline_version": crate::PIPELINE_VERSION,
        });
        let meta_path = domain_dir.join(format!("{url_hash}.meta.json"));
        tokio::fs::write(
            &meta_path,
            serde_json::to_vec_pretty(&metadata).unwrap_or_default(),
        )
        .await?;

        debug!(url, path = %html_path.display(), "Saved snapshot");
        Ok(())
    }

    /// Read back the sidecar metadata for a URL, if present.
    pub async fn retrieve(&self, url: &str) -> Option<serde_json::Value> {
        let domain = extract_domain(url);
        let url_hash = content_hash(url);
        let meta_path = self.base_path.join(domain).join(format!("{url_hash}.meta.json"));
        let bytes = tokio::fs::read(&meta_path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_retrieve_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let url = "https://www.example.org/jobs/1";

        store
            .save(url, "<html>job</html>", serde_json::json!({"is_job": true}))
            .await;

        let meta = store.retrieve(url).await.expect("snapshot written");
        assert_eq!(meta["url"], url);
        assert_eq!(meta["domain"], "example.org");
        assert_eq!(meta["html_size"], 16);
        assert_eq!(meta["extraction_result"]["is_job"], true);
        assert_eq!(meta["pipeline_version"], crate::PIPELINE_VERSION);

        // Raw bytes land next to the sidecar, partitioned by domain.
        let url_hash = content_hash(url);
        let html_path = dir.path().join("example.org").join(format!("{url_hash}.html"));
        assert!(html_path.exists());
    }

    #[tokio::test]
    async fn retrieve_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.retrieve("https://example.org/nope").await.is_none());
    }
}
