use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use aidjobs_common::{
    CrawlCounts, CrawlOutcome, CrawlStatus, Source, SourceKind, SourceStatus,
};
use aidjobs_fetch::{
    needs_browser_render, ApiFetcher, BrowserFetcher, FetchOptions, PoliteFetcher, RawFeedRecord,
    RssFetcher,
};
use aidjobs_normalize::{Normalizer, RawRecord};
use aidjobs_pipeline::{Extractor, RawJob};
use aidjobs_store::{CrawlLogStore, JobStore, LockStore, SourceStore};

use crate::cadence::{compute_cadence_days, sample_jitter};

/// Process-wide ceiling on simultaneous crawls.
const GLOBAL_MAX_CONCURRENCY: usize = 3;
/// Scheduler tick interval.
const SCHEDULER_INTERVAL: Duration = Duration::from_secs(300);
/// Due sources picked up per tick.
const MAX_SOURCES_PER_TICK: i64 = 20;
/// Consecutive failures that trip the auto-pause circuit breaker.
const AUTO_PAUSE_FAILURES: i32 = 5;
/// Consecutive loop errors before the tick interval doubles once.
const MAX_LOOP_ERRORS: u32 = 5;

/// Everything the orchestrator needs, constructed explicitly at startup.
pub struct OrchestratorDeps {
    pub sources: SourceStore,
    pub locks: LockStore,
    pub crawl_logs: CrawlLogStore,
    pub jobs: JobStore,
    pub fetcher: PoliteFetcher,
    pub rss: RssFetcher,
    pub api: ApiFetcher,
    pub browser: Option<BrowserFetcher>,
    pub extractor: Extractor,
    pub normalizer: Normalizer,
}

/// Keeps the crawl fleet making progress within politeness and concurrency
/// budgets, and adapts each source's cadence to observed productivity.
pub struct Orchestrator {
    deps: Arc<OrchestratorDeps>,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

struct CrawlRun {
    outcome: CrawlOutcome,
    etag: Option<String>,
    last_modified: Option<String>,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            deps: Arc::new(deps),
            semaphore: Arc::new(Semaphore::new(GLOBAL_MAX_CONCURRENCY)),
            shutdown,
        }
    }

    /// Signal the loop to stop. In-flight crawls drain; no new work starts.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
        info!("Orchestrator stopping");
    }

    /// Run one tick: select due sources and crawl them under the
    /// concurrency gate. Returns how many were queued.
    pub async fn run_due_once(self: Arc<Self>) -> anyhow::Result<usize> {
        let sources = self.deps.sources.due_sources(MAX_SOURCES_PER_TICK).await?;
        if sources.is_empty() {
            info!("No due sources");
            return Ok(0);
        }

        info!(count = sources.len(), "Running due sources");
        let mut handles = Vec::with_capacity(sources.len());
        for source in sources {
            let this = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                this.run_source_with_lock(source).await;
            }));
        }
        let queued = handles.len();
        for handle in handles {
            let _ = handle.await;
        }
        Ok(queued)
    }

    /// Crawl one source under the global gate and its per-source lock.
    /// Lock contention is a silent skip; the lock is released on every
    /// exit path.
    pub async fn run_source_with_lock(self: Arc<Self>, source: Source) {
        let _permit = match self.semaphore.acquire().await {
            Ok(p) => p,
            Err(_) => return,
        };

        match self.deps.locks.acquire(source.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(org = %source.org_name, "Source already locked, skipping");
                return;
            }
            Err(e) => {
                error!(org = %source.org_name, error = %e, "Lock acquisition failed");
                return;
            }
        }

        let run = self.crawl_source(&source).await;
        self.update_source_after_crawl(&source, run).await;

        self.deps.locks.release(source.id).await;
    }

    /// Fetch, extract, normalize, and upsert one source. Never panics
    /// outward; every failure becomes a fail outcome.
    pub async fn crawl_source(&self, source: &Source) -> CrawlRunResult {
        let started = Instant::now();
        info!(org = %source.org_name, url = %source.careers_url, kind = %source.kind, "Starting crawl");

        let run = match source.kind {
            SourceKind::Rss => self.crawl_rss(source).await,
            SourceKind::Api => self.crawl_api(source).await,
            SourceKind::Html => self.crawl_html(source).await,
        };

        let duration_ms = started.elapsed().as_millis() as i64;
        let mut run = run;
        run.outcome.duration_ms = duration_ms;
        CrawlRunResult(run)
    }

    async fn crawl_html(&self, source: &Source) -> CrawlRun {
        let options = FetchOptions {
            etag: source.etag.clone(),
            last_modified: source.last_modified.clone(),
            max_size_kb: None,
        };
        let page = self.deps.fetcher.fetch(&source.careers_url, &options).await;

        match page.status {
            304 => return CrawlRun::not_modified(),
            403 => return CrawlRun::fail("Blocked by robots.txt"),
            0 => return CrawlRun::fail("Network error"),
            200 => {}
            status => return CrawlRun::fail(&format!("HTTP {status}")),
        }

        // Browser fallback for JS-rendered pages; the HTTP body proceeds
        // as-is when Chrome is unavailable or produces nothing.
        let mut body = page.body;
        if needs_browser_render(&source.careers_url, &body) {
            if let Some(browser) = &self.deps.browser {
                match browser.fetch(&source.careers_url).await {
                    Ok(rendered) if !rendered.is_empty() => {
                        info!(url = %source.careers_url, "Using browser-rendered DOM");
                        body = rendered;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(url = %source.careers_url, error = %e, "Browser render failed"),
                }
            }
        }

        let extraction = self
            .deps
            .extractor
            .extract_page(&body, &source.careers_url, source.parser_hint.as_deref())
            .await;

        let mut records: Vec<RawRecord> = extraction.jobs.iter().map(raw_job_to_record).collect();
        if records.is_empty() {
            if let Some(record) = page_level_record(&extraction) {
                records.push(record);
            }
        }

        let counts = self.normalize_and_upsert(records, source).await;
        CrawlRun::from_counts(counts).with_validators(page.etag, page.last_modified)
    }

    async fn crawl_rss(&self, source: &Source) -> CrawlRun {
        let options = FetchOptions {
            etag: source.etag.clone(),
            last_modified: source.last_modified.clone(),
            max_size_kb: None,
        };
        let (page, records) = self
            .deps
            .rss
            .fetch_feed(&self.deps.fetcher, &source.careers_url, &options)
            .await;

        match page.status {
            304 => return CrawlRun::not_modified(),
            403 => return CrawlRun::fail("Blocked by robots.txt"),
            0 => return CrawlRun::fail("Network error"),
            200 => {}
            status => return CrawlRun::fail(&format!("HTTP {status}")),
        }

        let records: Vec<RawRecord> = records.iter().map(feed_record_to_record).collect();
        let counts = self.normalize_and_upsert(records, source).await;
        CrawlRun::from_counts(counts).with_validators(page.etag, page.last_modified)
    }

    async fn crawl_api(&self, source: &Source) -> CrawlRun {
        let hint = match source.parser_hint.as_deref() {
            Some(h) => h,
            None => return CrawlRun::fail("api source has no parser config"),
        };

        // Policy failures (missing secret, schema mismatch) and first-page
        // categorized errors all surface as the crawl's fatal error.
        let items = match self
            .deps
            .api
            .fetch(hint, Some(&source.careers_url), source.last_crawled_at)
            .await
        {
            Ok(items) => items,
            Err(e) => return CrawlRun::fail(&e.to_string()),
        };

        let records: Vec<RawRecord> = items.iter().filter_map(api_item_to_record).collect();
        let counts = self.normalize_and_upsert(records, source).await;
        CrawlRun::from_counts(counts)
    }

    async fn normalize_and_upsert(&self, records: Vec<RawRecord>, source: &Source) -> CrawlCounts {
        let today = Utc::now().date_naive();
        let mut drafts = Vec::with_capacity(records.len());
        for record in records {
            let draft = self
                .deps
                .normalizer
                .normalize(record, Some(&source.org_name), today)
                .await;
            drafts.push(draft);
        }
        self.deps
            .jobs
            .upsert_drafts(&drafts, source.id, &source.careers_url)
            .await
    }

    /// Post-crawl bookkeeping: counters, adaptive cadence, circuit breaker,
    /// crawl log.
    pub async fn update_source_after_crawl(&self, source: &Source, run: CrawlRunResult) {
        let CrawlRunResult(run) = run;
        let mut outcome = run.outcome;

        let (consecutive_failures, consecutive_nochange) = next_counters(
            &outcome,
            source.consecutive_failures,
            source.consecutive_nochange,
        );

        let cadence_days = compute_cadence_days(
            source.cadence_days,
            source.org_category,
            outcome.counts.inserted,
            outcome.counts.updated,
            consecutive_failures,
            consecutive_nochange,
            sample_jitter(),
        );
        let next_run_at = Utc::now()
            + chrono::Duration::milliseconds((cadence_days * 24.0 * 3600.0 * 1000.0) as i64);

        let mut status = source.status;
        if consecutive_failures >= AUTO_PAUSE_FAILURES {
            status = SourceStatus::Paused;
            outcome
                .message
                .push_str(&format!(" (auto-paused after {AUTO_PAUSE_FAILURES} failures)"));
            warn!(org = %source.org_name, "Circuit breaker tripped, source paused");
        }

        let update = aidjobs_store::sources::SourceUpdate {
            last_crawl_status: outcome.status,
            last_crawl_message: aidjobs_common::truncate_message(&outcome.message, 500),
            consecutive_failures,
            consecutive_nochange,
            next_run_at,
            status,
            etag: run.etag,
            last_modified: run.last_modified,
        };

        if let Err(e) = self.deps.sources.update_after_crawl(source.id, &update).await {
            error!(org = %source.org_name, error = %e, "Failed to update source after crawl");
        }
        self.deps.crawl_logs.record(source.id, &outcome).await;
    }

    /// Background loop: wake every 5 minutes, run due sources, absorb
    /// errors. After 5 consecutive loop errors the next sleep doubles once.
    pub async fn scheduler_loop(self: Arc<Self>) {
        info!("Scheduler started");
        let mut shutdown = self.shutdown.subscribe();
        let mut consecutive_errors = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match Arc::clone(&self).run_due_once().await {
                Ok(_) => consecutive_errors = 0,
                Err(e) => {
                    consecutive_errors += 1;
                    error!(
                        error = %e,
                        consecutive = consecutive_errors,
                        "Scheduler tick failed"
                    );
                }
            }

            let mut interval = SCHEDULER_INTERVAL;
            if consecutive_errors >= MAX_LOOP_ERRORS {
                warn!("Too many consecutive scheduler errors, doubling tick interval");
                interval *= 2;
                consecutive_errors = 0;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}

/// Roll the per-source counters forward after a run. Failures reset the
/// no-change streak; a conditional-GET hit proves nothing about staleness
/// and leaves the no-change counter untouched.
fn next_counters(
    outcome: &CrawlOutcome,
    prev_failures: i32,
    prev_nochange: i32,
) -> (i32, i32) {
    if outcome.status == CrawlStatus::Fail {
        (prev_failures + 1, 0)
    } else if outcome.not_modified {
        (0, prev_nochange)
    } else if outcome.counts.changes() == 0 {
        (0, prev_nochange + 1)
    } else {
        (0, 0)
    }
}

/// Public wrapper so admin operations can reuse the crawl result.
pub struct CrawlRunResult(CrawlRun);

impl CrawlRunResult {
    pub fn outcome(&self) -> &CrawlOutcome {
        &self.0.outcome
    }
}

impl CrawlRun {
    fn not_modified() -> Self {
        Self {
            outcome: CrawlOutcome {
                status: CrawlStatus::Ok,
                message: "Not modified (304)".to_string(),
                counts: CrawlCounts::default(),
                duration_ms: 0,
                not_modified: true,
            },
            etag: None,
            last_modified: None,
        }
    }

    fn fail(message: &str) -> Self {
        Self {
            outcome: CrawlOutcome {
                status: CrawlStatus::Fail,
                message: message.to_string(),
                counts: CrawlCounts::default(),
                duration_ms: 0,
                not_modified: false,
            },
            etag: None,
            last_modified: None,
        }
    }

    fn from_counts(counts: CrawlCounts) -> Self {
        let (status, message) = if counts.inserted > 0 || counts.updated > 0 {
            (
                CrawlStatus::Ok,
                format!(
                    "Found {}, inserted {}, updated {}",
                    counts.found, counts.inserted, counts.updated
                ),
            )
        } else if counts.found == 0 {
            (CrawlStatus::Warn, "No jobs found".to_string())
        } else {
            (CrawlStatus::Ok, "No changes".to_string())
        };

        Self {
            outcome: CrawlOutcome {
                status,
                message,
                counts,
                duration_ms: 0,
                not_modified: false,
            },
            etag: None,
            last_modified: None,
        }
    }

    fn with_validators(mut self, etag: Option<String>, last_modified: Option<String>) -> Self {
        self.etag = etag;
        self.last_modified = last_modified;
        self
    }
}

fn raw_job_to_record(job: &RawJob) -> RawRecord {
    RawRecord {
        title: job.title.clone(),
        apply_url: job.apply_url.clone(),
        org_name: job.org_name.clone(),
        location_raw: job.location_raw.clone(),
        deadline_raw: job.deadline_raw.clone(),
        description_snippet: job.description_snippet.clone(),
        salary_raw: None,
    }
}

fn feed_record_to_record(record: &RawFeedRecord) -> RawRecord {
    RawRecord {
        title: record.title.clone(),
        apply_url: record.link.clone(),
        org_name: None,
        location_raw: record.location_raw.clone(),
        deadline_raw: record.deadline_raw.clone(),
        description_snippet: record.description.clone(),
        salary_raw: None,
    }
}

/// Map a config-mapped API item into a raw record, tolerating the common
/// alternative key names.
fn api_item_to_record(item: &Value) -> Option<RawRecord> {
    let get = |keys: &[&str]| -> Option<String> {
        keys.iter().find_map(|key| {
            item.get(*key).and_then(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        })
    };

    let title = get(&["title", "name", "position", "job_title"])?;
    let apply_url = get(&["apply_url", "url", "link", "application_url", "href"])?;

    Some(RawRecord {
        title,
        apply_url,
        org_name: get(&["org_name", "organization", "company", "employer"]),
        location_raw: get(&["location_raw", "location", "duty_station", "city", "country"]),
        deadline_raw: get(&["deadline", "closing_date", "application_deadline"]),
        description_snippet: get(&["description_snippet", "description", "summary", "details"]),
        salary_raw: get(&["salary", "compensation"]),
    })
}

/// Build a single record from the page-level cascade when the page itself
/// is a job detail page.
fn page_level_record(extraction: &aidjobs_pipeline::PageExtraction) -> Option<RawRecord> {
    if !extraction.result.is_job {
        return None;
    }
    let title = extraction.result.field_text("title")?.to_string();
    let apply_url = extraction
        .result
        .field_text("application_url")
        .unwrap_or(&extraction.result.url)
        .to_string();

    Some(RawRecord {
        title,
        apply_url,
        org_name: extraction.result.field_text("employer").map(String::from),
        location_raw: extraction.result.field_text("location").map(String::from),
        deadline_raw: extraction.result.field_text("deadline").map(String::from),
        description_snippet: extraction.result.field_text("description").map(String::from),
        salary_raw: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_item_mapping_with_alternate_keys() {
        let item = json!({
            "name": "WASH Officer",
            "link": "https://api.example.org/jobs/1",
            "duty_station": "Nairobi",
            "closing_date": "2026-09-15"
        });
        let record = api_item_to_record(&item).unwrap();
        assert_eq!(record.title, "WASH Officer");
        assert_eq!(record.apply_url, "https://api.example.org/jobs/1");
        assert_eq!(record.location_raw.as_deref(), Some("Nairobi"));
        assert_eq!(record.deadline_raw.as_deref(), Some("2026-09-15"));
    }

    #[test]
    fn api_item_without_title_dropped() {
        let item = json!({"link": "https://api.example.org/jobs/1"});
        assert!(api_item_to_record(&item).is_none());
    }

    #[test]
    fn outcome_messages_follow_counts() {
        let run = CrawlRun::from_counts(CrawlCounts {
            found: 12,
            inserted: 3,
            updated: 2,
            skipped: 1,
            failed: 0,
        });
        assert_eq!(run.outcome.status, CrawlStatus::Ok);
        assert_eq!(run.outcome.message, "Found 12, inserted 3, updated 2");

        let run = CrawlRun::from_counts(CrawlCounts::default());
        assert_eq!(run.outcome.status, CrawlStatus::Warn);
        assert_eq!(run.outcome.message, "No jobs found");

        let run = CrawlRun::from_counts(CrawlCounts {
            found: 5,
            ..Default::default()
        });
        assert_eq!(run.outcome.status, CrawlStatus::Ok);
        assert_eq!(run.outcome.message, "No changes");
    }

    #[test]
    fn not_modified_outcome_is_ok_with_zero_counts() {
        let run = CrawlRun::not_modified();
        assert_eq!(run.outcome.status, CrawlStatus::Ok);
        assert!(run.outcome.not_modified);
        assert_eq!(run.outcome.counts, CrawlCounts::default());
    }

    #[test]
    fn failure_increments_and_resets_nochange() {
        let run = CrawlRun::fail("HTTP 500");
        let (failures, nochange) = next_counters(&run.outcome, 2, 4);
        assert_eq!(failures, 3);
        assert_eq!(nochange, 0);
    }

    #[test]
    fn fifth_failure_reaches_pause_threshold() {
        let run = CrawlRun::fail("HTTP 500");
        let (failures, _) = next_counters(&run.outcome, 4, 0);
        assert_eq!(failures, AUTO_PAUSE_FAILURES);
    }

    #[test]
    fn not_modified_leaves_nochange_untouched() {
        let run = CrawlRun::not_modified();
        let (failures, nochange) = next_counters(&run.outcome, 3, 2);
        assert_eq!(failures, 0);
        assert_eq!(nochange, 2);
    }

    #[test]
    fn zero_changes_increments_nochange() {
        let run = CrawlRun::from_counts(CrawlCounts {
            found: 5,
            ..Default::default()
        });
        let (failures, nochange) = next_counters(&run.outcome, 0, 2);
        assert_eq!(failures, 0);
        assert_eq!(nochange, 3);
    }

    #[test]
    fn changes_reset_both_counters() {
        let run = CrawlRun::from_counts(CrawlCounts {
            found: 5,
            inserted: 2,
            ..Default::default()
        });
        let (failures, nochange) = next_counters(&run.outcome, 3, 4);
        assert_eq!(failures, 0);
        assert_eq!(nochange, 0);
    }
}
