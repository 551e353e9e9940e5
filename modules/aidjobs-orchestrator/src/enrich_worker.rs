use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use aidjobs_enrich::{EnrichmentEngine, EnrichmentInput};
use aidjobs_store::JobStore;

/// Jobs enriched per sweep.
const BATCH_SIZE: i64 = 10;
/// Idle wait between sweeps when there is nothing to enrich.
const IDLE_INTERVAL: Duration = Duration::from_secs(120);

/// Asynchronous enrichment over newly upserted jobs. Runs independently of
/// the crawl loop so LLM latency never slows crawling.
pub struct EnrichWorker {
    engine: Arc<EnrichmentEngine>,
    jobs: JobStore,
    shutdown: watch::Receiver<bool>,
}

impl EnrichWorker {
    pub fn new(
        engine: Arc<EnrichmentEngine>,
        jobs: JobStore,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            jobs,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("Enrichment worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let processed = match self.sweep().await {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "Enrichment sweep failed");
                    0
                }
            };

            if processed == 0 {
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_INTERVAL) => {}
                    _ = self.shutdown.changed() => {}
                }
            }
        }
        info!("Enrichment worker stopped");
    }

    async fn sweep(&self) -> anyhow::Result<usize> {
        let pending = self.jobs.jobs_needing_enrichment(BATCH_SIZE).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut processed = 0;
        for (job_id, title, description, org_name, location) in pending {
            let input = EnrichmentInput {
                job_id: job_id.to_string(),
                title,
                description,
                org_name,
                location,
                functional_role_hint: None,
            };

            match self.engine.enrich(&input).await {
                Some(enrichment) => {
                    if let Err(e) = self
                        .jobs
                        .save_enrichment(job_id, &enrichment, "auto-enrichment", "ai_service")
                        .await
                    {
                        warn!(%job_id, error = %e, "Failed to save enrichment");
                    } else {
                        processed += 1;
                    }
                }
                None => {
                    warn!(%job_id, "Enrichment produced no data");
                }
            }

            if *self.shutdown.borrow() {
                break;
            }
        }

        info!(processed, "Enrichment sweep complete");
        Ok(processed)
    }
}
