use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aidjobs_common::Config;
use aidjobs_enrich::EnrichmentEngine;
use aidjobs_fetch::{ApiFetcher, BrowserFetcher, HostLimiters, PoliteFetcher, RobotsCache, RssFetcher};
use aidjobs_normalize::{AiNormalizer, Geocoder, Normalizer, TaxonomyCache};
use aidjobs_orchestrator::{EnrichWorker, Orchestrator, OrchestratorDeps};
use aidjobs_pipeline::{
    ai_fallback::AiFallbackExtractor, Extractor, PluginRegistry, SnapshotStore,
};
use aidjobs_store::{CrawlLogStore, JobStore, LockStore, SearchIndexClient, SourceStore};
use openrouter_client::OpenRouterClient;

#[derive(Parser, Debug)]
#[command(name = "aidjobs-crawler", about = "AidJobs crawl orchestrator")]
struct Args {
    /// Run one tick of due sources and exit instead of looping.
    #[arg(long)]
    once: bool,

    /// Skip the browser fallback even when configured.
    #[arg(long)]
    no_browser: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("aidjobs=info".parse()?))
        .init();

    let args = Args::parse();

    info!("AidJobs crawler starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&config.db_url)
        .await?;

    // Shared AI client (one circuit breaker per process).
    let ai_client = config
        .openrouter_api_key
        .as_deref()
        .map(|key| Arc::new(OpenRouterClient::new(key)));
    if ai_client.is_none() {
        info!("OPENROUTER_API_KEY not set, AI features disabled");
    }

    // Fetch layer.
    let robots = Arc::new(RobotsCache::new());
    let limiters = Arc::new(HostLimiters::new());
    let fetcher = PoliteFetcher::new(robots, limiters);
    let browser = if args.no_browser {
        None
    } else {
        Some(BrowserFetcher::new(&config.chrome_bin))
    };

    // Extraction pipeline.
    let ai_fallback = ai_client.as_ref().map(|client| {
        AiFallbackExtractor::new(
            Arc::clone(client),
            &config.openrouter_model,
            config.ai_extraction_max_calls,
        )
    });
    let extractor = Extractor::new(
        PluginRegistry::with_builtins(),
        ai_fallback,
        Some(SnapshotStore::new(&config.snapshot_path)),
    );

    // Normalization.
    let taxonomy = Arc::new(TaxonomyCache::load(&pool).await);
    let geocoder = Arc::new(Geocoder::new("geocache/locations.json", None).await);
    let ai_normalizer = ai_client
        .as_ref()
        .map(|client| AiNormalizer::new(Arc::clone(client), &config.openrouter_model));
    let normalizer = Normalizer::new(taxonomy, Some(geocoder), ai_normalizer);

    // Storage.
    let search = match (&config.meilisearch_url, &config.meilisearch_key) {
        (Some(url), Some(key)) => Some(SearchIndexClient::new(url, key, &config.meili_jobs_index)),
        _ => None,
    };
    let jobs = if config.extraction_use_storage && config.extraction_shadow_mode {
        info!("Shadow mode: upserts write to jobs_side");
        JobStore::shadow(pool.clone())
    } else {
        JobStore::new(pool.clone(), search.clone())
    };

    let orchestrator = Arc::new(Orchestrator::new(OrchestratorDeps {
        sources: SourceStore::new(pool.clone()),
        locks: LockStore::new(pool.clone()),
        crawl_logs: CrawlLogStore::new(pool.clone()),
        jobs: jobs.clone(),
        fetcher,
        rss: RssFetcher::new(),
        api: ApiFetcher::new(),
        browser,
        extractor,
        normalizer,
    }));

    if args.once {
        let queued = Arc::clone(&orchestrator).run_due_once().await?;
        info!(queued, "Single tick complete");
        return Ok(());
    }

    if config.disable_scheduler {
        info!("Scheduler disabled by AIDJOBS_DISABLE_SCHEDULER");
        return Ok(());
    }

    // Enrichment worker runs beside the crawl loop.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let enrich_handle = ai_client.as_ref().map(|client| {
        let engine = Arc::new(EnrichmentEngine::new(
            Arc::clone(client),
            &config.openrouter_model,
        ));
        let worker = EnrichWorker::new(engine, jobs.clone(), shutdown_rx.clone());
        tokio::spawn(worker.run())
    });

    let scheduler = tokio::spawn(Arc::clone(&orchestrator).scheduler_loop());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining in-flight crawls");
    orchestrator.stop();
    let _ = shutdown_tx.send(true);

    let _ = scheduler.await;
    if let Some(handle) = enrich_handle {
        let _ = handle.await;
    }

    info!("AidJobs crawler stopped");
    Ok(())
}
