use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Source ---

/// How a source is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Html,
    Rss,
    Api,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Html => write!(f, "html"),
            SourceKind::Rss => write!(f, "rss"),
            SourceKind::Api => write!(f, "api"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "html" => Ok(Self::Html),
            "rss" => Ok(Self::Rss),
            "api" => Ok(Self::Api),
            other => Err(format!("unknown SourceKind: {other}")),
        }
    }
}

/// Organization category. Seeds the default crawl cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgCategory {
    Un,
    Ingo,
    Ngo,
    Private,
    Academic,
    Other,
}

impl OrgCategory {
    /// Default cadence in days when a source has none configured.
    pub fn default_cadence_days(&self) -> f64 {
        match self {
            OrgCategory::Un => 1.0,
            OrgCategory::Ingo => 2.0,
            OrgCategory::Ngo => 3.0,
            OrgCategory::Private => 5.0,
            OrgCategory::Academic => 7.0,
            OrgCategory::Other => 3.0,
        }
    }
}

impl std::fmt::Display for OrgCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrgCategory::Un => write!(f, "un"),
            OrgCategory::Ingo => write!(f, "ingo"),
            OrgCategory::Ngo => write!(f, "ngo"),
            OrgCategory::Private => write!(f, "private"),
            OrgCategory::Academic => write!(f, "academic"),
            OrgCategory::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for OrgCategory {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "un" => Ok(Self::Un),
            "ingo" => Ok(Self::Ingo),
            "ngo" => Ok(Self::Ngo),
            "private" => Ok(Self::Private),
            "academic" => Ok(Self::Academic),
            _ => Ok(Self::Other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Paused,
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Active => write!(f, "active"),
            SourceStatus::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for SourceStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown SourceStatus: {other}")),
        }
    }
}

/// A polled origin of job postings.
///
/// Mutated only by the orchestrator after a run; `paused` sources are not
/// eligible for scheduling until an operator clears them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub org_name: String,
    pub careers_url: String,
    pub kind: SourceKind,
    /// CSS selector (html) or v1 JSON config (api).
    pub parser_hint: Option<String>,
    pub org_category: OrgCategory,
    pub status: SourceStatus,
    /// Base cadence in days; None falls back to the category default.
    pub cadence_days: Option<f64>,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub last_crawl_status: Option<CrawlStatus>,
    pub last_crawl_message: Option<String>,
    pub consecutive_failures: i32,
    pub consecutive_nochange: i32,
    pub next_run_at: Option<DateTime<Utc>>,
    /// Stored ETag from the last successful fetch (conditional GET).
    pub etag: Option<String>,
    /// Stored Last-Modified from the last successful fetch.
    pub last_modified: Option<String>,
}

// --- Crawl results ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Ok,
    Warn,
    Fail,
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlStatus::Ok => write!(f, "ok"),
            CrawlStatus::Warn => write!(f, "warn"),
            CrawlStatus::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for CrawlStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown CrawlStatus: {other}")),
        }
    }
}

/// Aggregate counts for one source run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCounts {
    pub found: u32,
    pub inserted: u32,
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl CrawlCounts {
    pub fn changes(&self) -> u32 {
        self.inserted + self.updated
    }

    pub fn merge(&mut self, other: &CrawlCounts) {
        self.found += other.found;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Outcome of a single crawl, before it is written to the crawl log.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub status: CrawlStatus,
    pub message: String,
    pub counts: CrawlCounts,
    pub duration_ms: i64,
    /// Conditional-GET hit: ok with zero counts, and the no-change counter
    /// is left untouched.
    pub not_modified: bool,
}

/// An immutable record of one source run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlLog {
    pub id: Uuid,
    pub source_id: Uuid,
    pub ran_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub found: i32,
    pub inserted: i32,
    pub updated: i32,
    pub skipped: i32,
    pub status: CrawlStatus,
    pub message: String,
}

// --- Jobs ---

/// Enrichment output attached to a job after the rule pipeline runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentBlock {
    #[serde(default)]
    pub impact_domain: Vec<String>,
    #[serde(default)]
    pub impact_confidences: HashMap<String, f64>,
    #[serde(default)]
    pub functional_role: Vec<String>,
    #[serde(default)]
    pub functional_confidences: HashMap<String, f64>,
    pub experience_level: Option<String>,
    pub experience_confidence: Option<f64>,
    #[serde(default)]
    pub estimated_experience_years: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub sdgs: Vec<u8>,
    #[serde(default)]
    pub sdg_confidences: HashMap<String, f64>,
    pub sdg_explanation: Option<String>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    pub confidence_overall: Option<f64>,
    #[serde(default)]
    pub low_confidence: bool,
    pub low_confidence_reason: Option<String>,
    #[serde(default = "default_enrichment_version")]
    pub enrichment_version: i32,
    pub enriched_at: Option<DateTime<Utc>>,
}

fn default_enrichment_version() -> i32 {
    1
}

/// Data-quality output attached pre-upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityBlock {
    /// 0.0 to 1.0.
    pub score: f64,
    /// Letter grade A through F.
    pub grade: char,
    pub factors: HashMap<String, f64>,
    pub issues: Vec<String>,
    pub needs_review: bool,
}

/// A deduplicated job posting as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Weak reference; survives source deletion.
    pub source_id: Option<Uuid>,
    pub org_name: Option<String>,
    pub title: String,
    pub apply_url: String,
    pub location_raw: Option<String>,
    pub country: Option<String>,
    pub country_iso: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_remote: bool,
    pub deadline: Option<NaiveDate>,
    pub description_snippet: Option<String>,
    pub canonical_hash: String,
    pub status: String,
    pub fetched_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub deletion_reason: Option<String>,
    pub raw_metadata: Option<serde_json::Value>,
    pub enrichment: Option<EnrichmentBlock>,
    pub quality: Option<QualityBlock>,
}

/// A job as produced by extraction + normalization, before upsert.
///
/// Field presence mirrors what the pipeline managed to extract; the storage
/// adapter validates the invariants (title length, usable apply URL) and
/// skips drafts that fail them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDraft {
    pub title: String,
    pub apply_url: String,
    pub org_name: Option<String>,
    pub location_raw: Option<String>,
    pub country: Option<String>,
    pub country_iso: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_remote: Option<bool>,
    pub geocoding_source: Option<String>,
    /// `YYYY-MM-DD` when parseable; unparseable deadlines are dropped.
    pub deadline: Option<NaiveDate>,
    pub description_snippet: Option<String>,
    pub level_norm: Option<String>,
    pub career_type: Option<String>,
    pub work_modality: Option<String>,
    pub mission_tags: Vec<String>,
    pub international_eligible: Option<bool>,
    pub canonical_hash: String,
    pub raw_metadata: Option<serde_json::Value>,
    pub quality: Option<QualityBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_category_default_cadence() {
        assert_eq!(OrgCategory::Un.default_cadence_days(), 1.0);
        assert_eq!(OrgCategory::Ingo.default_cadence_days(), 2.0);
        assert_eq!(OrgCategory::Ngo.default_cadence_days(), 3.0);
        assert_eq!(OrgCategory::Private.default_cadence_days(), 5.0);
        assert_eq!(OrgCategory::Academic.default_cadence_days(), 7.0);
        assert_eq!(OrgCategory::Other.default_cadence_days(), 3.0);
    }

    #[test]
    fn org_category_parses_unknown_as_other() {
        let cat: OrgCategory = "foundation".parse().unwrap();
        assert_eq!(cat, OrgCategory::Other);
    }

    #[test]
    fn crawl_counts_changes_and_merge() {
        let mut a = CrawlCounts {
            found: 10,
            inserted: 3,
            updated: 2,
            skipped: 1,
            failed: 0,
        };
        assert_eq!(a.changes(), 5);
        let b = CrawlCounts {
            found: 4,
            inserted: 1,
            updated: 0,
            skipped: 0,
            failed: 2,
        };
        a.merge(&b);
        assert_eq!(a.found, 14);
        assert_eq!(a.inserted, 4);
        assert_eq!(a.failed, 2);
    }

    #[test]
    fn source_kind_round_trips() {
        for kind in [SourceKind::Html, SourceKind::Rss, SourceKind::Api] {
            let parsed: SourceKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }
}
