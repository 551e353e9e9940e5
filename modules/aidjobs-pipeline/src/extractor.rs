use chrono::{NaiveDate, Utc};
use scraper::Html;
use serde_json::json;
use tracing::debug;

use crate::ai_fallback::AiFallbackExtractor;
use crate::classifier::{page_text, JobPageClassifier};
use crate::field::{FieldResult, FieldSource};
use crate::heuristics::HeuristicExtractor;
use crate::jsonld::JsonLdExtractor;
use crate::meta::MetaExtractor;
use crate::plugins::{PluginRegistry, RawJob};
use crate::regex_fallback::RegexFallback;
use crate::result::ExtractionResult;
use crate::snapshot::SnapshotStore;

/// Locations too generic to trust.
const GENERIC_LOCATIONS: [&str; 5] = ["n/a", "tbd", "to be determined", "multiple", "various"];

/// Everything extracted from one page: per-field cascade result plus the
/// plugin-level job rows (for listing pages).
#[derive(Debug)]
pub struct PageExtraction {
    pub result: ExtractionResult,
    /// Job rows from the site plugin; empty for detail-only pages.
    pub jobs: Vec<RawJob>,
    pub plugin_confidence: f64,
    pub plugin_message: Option<String>,
    pub manual_review: bool,
    pub validation_issues: Vec<String>,
}

/// The seven-stage extraction cascade.
pub struct Extractor {
    classifier: JobPageClassifier,
    registry: PluginRegistry,
    ai: Option<AiFallbackExtractor>,
    snapshots: Option<SnapshotStore>,
}

impl Extractor {
    pub fn new(
        registry: PluginRegistry,
        ai: Option<AiFallbackExtractor>,
        snapshots: Option<SnapshotStore>,
    ) -> Self {
        Self {
            classifier: JobPageClassifier::new(),
            registry,
            ai,
            snapshots,
        }
    }

    /// Run all stages against a fetched page.
    pub async fn extract_page(
        &self,
        html: &str,
        url: &str,
        parser_hint: Option<&str>,
    ) -> PageExtraction {
        let today = Utc::now().date_naive();

        // Stages 1-6 parse the DOM and must finish before any await: the
        // parsed document is not Send.
        let staged = self.run_sync_stages(html, url, parser_hint, today);
        let SyncStages {
            mut result,
            jobs,
            plugin_confidence,
            plugin_message,
            text,
        } = staged;

        // Stage 7: AI fallback, only when the deterministic stages left
        // more than one critical field weak.
        if let Some(ai) = &self.ai {
            if result.needs_ai_fallback() {
                debug!(url, "Invoking AI fallback");
                let fields = ai.extract(&text, html, url).await;
                for (name, field) in fields {
                    result.set_field(&name, field);
                }
            }
        }

        result.finalize();

        let (manual_review, validation_issues) = validate(&result, today);

        if let Some(snapshots) = &self.snapshots {
            let mut meta = result.to_snapshot_json();
            if let Some(map) = meta.as_object_mut() {
                map.insert("manual_review".to_string(), json!(manual_review));
                map.insert("validation_issues".to_string(), json!(validation_issues));
            }
            snapshots.save(url, html, meta).await;
        }

        PageExtraction {
            result,
            jobs,
            plugin_confidence,
            plugin_message,
            manual_review,
            validation_issues,
        }
    }

    fn run_sync_stages(
        &self,
        html: &str,
        url: &str,
        parser_hint: Option<&str>,
        today: NaiveDate,
    ) -> SyncStages {
        let document = Html::parse_document(html);
        let text = page_text(&document);
        let mut result = ExtractionResult::new(url);

        // Stage 1: classifier. Non-job pages continue through extraction.
        let (is_job, score) = self.classifier.classify(&document, url);
        result.is_job = is_job;
        result.classifier_score = score;
        if !is_job {
            debug!(url, score, "Page classified as non-job");
        }

        // Stage 2: JSON-LD.
        for (name, field) in JsonLdExtractor::extract(&document, url) {
            result.set_field(&name, field);
        }

        // Stage 3: meta/OpenGraph.
        for (name, field) in MetaExtractor::extract(&document) {
            result.set_field(&name, field);
        }

        // Stage 4: DOM selectors via site plugins.
        let plugin_result = self.registry.extract(html, url, parser_hint);
        if let [job] = plugin_result.jobs.as_slice() {
            // A single extracted row doubles as the page's own fields.
            merge_job_fields(&mut result, job);
        }

        // Stage 5: label heuristics.
        let heuristics = HeuristicExtractor::new(today);
        for (name, field) in heuristics.extract(&document, &text) {
            result.set_field(&name, field);
        }

        // Stage 6: regex fallback.
        let regex_fallback = RegexFallback::new(today);
        for (name, field) in regex_fallback.extract(&text) {
            result.set_field(&name, field);
        }

        SyncStages {
            result,
            jobs: plugin_result.jobs,
            plugin_confidence: plugin_result.confidence,
            plugin_message: plugin_result.message,
            text,
        }
    }
}

struct SyncStages {
    result: ExtractionResult,
    jobs: Vec<RawJob>,
    plugin_confidence: f64,
    plugin_message: Option<String>,
    text: String,
}

fn merge_job_fields(result: &mut ExtractionResult, job: &RawJob) {
    result.set_field(
        "title",
        FieldResult::new(job.title.as_str(), FieldSource::Dom, None),
    );
    result.set_field(
        "application_url",
        FieldResult::new(job.apply_url.as_str(), FieldSource::Dom, None),
    );
    if let Some(ref location) = job.location_raw {
        result.set_field(
            "location",
            FieldResult::new(location.as_str(), FieldSource::Dom, None),
        );
    }
    if let Some(ref deadline) = job.deadline_raw {
        result.set_field(
            "deadline",
            FieldResult::new(deadline.as_str(), FieldSource::Dom, None),
        );
    }
    if let Some(ref description) = job.description_snippet {
        result.set_field(
            "description",
            FieldResult::new(description.as_str(), FieldSource::Dom, None),
        );
    }
}

/// Flag results a reviewer should look at: missing title, deadline before
/// posted date, generic location.
fn validate(result: &ExtractionResult, today: NaiveDate) -> (bool, Vec<String>) {
    let mut issues = Vec::new();

    match result.field("title") {
        Some(f) if f.is_valid() => {}
        _ => issues.push("missing_title".to_string()),
    }

    if let Some(deadline_text) = result.field_text("deadline") {
        match crate::dates::parse_date(deadline_text, true, today) {
            Some(deadline) => {
                if let Some(posted_text) = result.field_text("posted_on") {
                    if let Some(posted) = crate::dates::parse_date(posted_text, false, today) {
                        if deadline < posted {
                            issues.push("deadline_before_posted".to_string());
                        }
                    }
                }
            }
            None => issues.push("invalid_deadline_format".to_string()),
        }
    }

    if let Some(location) = result.field_text("location") {
        if GENERIC_LOCATIONS.contains(&location.trim().to_lowercase().as_str()) {
            issues.push("generic_location".to_string());
        }
    }

    (!issues.is_empty(), issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;

    fn extractor() -> Extractor {
        Extractor::new(PluginRegistry::with_builtins(), None, None)
    }

    const JOB_PAGE: &str = r#"<html><head>
        <title>Careers</title>
        <script type="application/ld+json">{
            "@type": "JobPosting",
            "title": "WASH Officer",
            "hiringOrganization": {"name": "UNICEF"},
            "jobLocation": {"address": {"addressLocality": "Nairobi", "addressCountry": "KE"}},
            "datePosted": "2026-07-01",
            "validThrough": "2026-09-15",
            "url": "https://example.org/jobs/wash-officer"
        }</script>
        </head><body>
        <h1>WASH Officer vacancy</h1>
        <dl><dt>Location</dt><dd>Somewhere Else</dd></dl>
        <a href="/apply">Apply now</a>
        </body></html>"#;

    #[tokio::test]
    async fn jsonld_beats_heuristics() {
        let extraction = extractor()
            .extract_page(JOB_PAGE, "https://example.org/jobs/wash-officer", None)
            .await;
        let result = &extraction.result;

        // Stage precedence: the JSON-LD location (0.90) wins over the
        // labeled heuristic (0.60).
        assert_eq!(result.field_text("location"), Some("Nairobi, KE"));
        assert_eq!(result.field("location").unwrap().source, FieldSource::Jsonld);
        assert_eq!(result.field_text("title"), Some("WASH Officer"));
        assert!(result.is_job);
        assert!(!result.dedupe_hash.is_empty());
    }

    #[tokio::test]
    async fn validation_flags_missing_title() {
        let extraction = extractor()
            .extract_page("<html><body><p>Nothing here</p></body></html>", "https://example.org/empty", None)
            .await;
        assert!(extraction.manual_review);
        assert!(extraction
            .validation_issues
            .contains(&"missing_title".to_string()));
    }

    #[tokio::test]
    async fn validation_flags_deadline_before_posted() {
        let html = r#"<html><head>
            <script type="application/ld+json">{
                "@type": "JobPosting",
                "title": "Backwards Job",
                "datePosted": "2026-09-01",
                "validThrough": "2026-08-01"
            }</script></head><body>job vacancy apply</body></html>"#;
        let extraction = extractor()
            .extract_page(html, "https://example.org/jobs/backwards", None)
            .await;
        assert!(extraction
            .validation_issues
            .contains(&"deadline_before_posted".to_string()));
    }

    #[tokio::test]
    async fn validation_flags_generic_location() {
        let html = r#"<html><head>
            <script type="application/ld+json">{
                "@type": "JobPosting",
                "title": "Roving Officer",
                "jobLocation": {"address": {"addressLocality": "Multiple"}}
            }</script></head><body>job vacancy apply</body></html>"#;
        let extraction = extractor()
            .extract_page(html, "https://example.org/jobs/roving", None)
            .await;
        assert!(extraction
            .validation_issues
            .contains(&"generic_location".to_string()));
    }

    #[tokio::test]
    async fn listing_page_produces_job_rows() {
        let html = r#"<html><body><table>
            <tr><th>Job Title</th><th>Location</th><th>Deadline</th></tr>
            <tr><td><a href="/p/1">Nutrition Officer - Sudan Emergency</a></td><td>Port Sudan</td><td>2026-09-01</td></tr>
            <tr><td><a href="/p/2">Supply Chain Manager - Regional</a></td><td>Nairobi</td><td>2026-09-10</td></tr>
        </table></body></html>"#;
        let extraction = extractor()
            .extract_page(html, "https://smallngo.example.org/careers", None)
            .await;
        assert_eq!(extraction.jobs.len(), 2);
        assert!(extraction.plugin_confidence > 0.0);
    }

    #[tokio::test]
    async fn snapshot_written_when_store_configured() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(
            PluginRegistry::with_builtins(),
            None,
            Some(SnapshotStore::new(dir.path())),
        );
        let url = "https://example.org/jobs/snap";
        let extraction = extractor.extract_page(JOB_PAGE, url, None).await;
        assert!(extraction.result.is_job);

        let store = SnapshotStore::new(dir.path());
        let meta = store.retrieve(url).await.expect("snapshot exists");
        assert_eq!(meta["extraction_result"]["is_job"], true);
        assert!(meta["extraction_result"]["validation_issues"].is_array());
    }

    #[test]
    fn requirements_field_value_serializes_as_list() {
        let value = FieldValue::List(vec!["Degree".into(), "French".into()]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!(["Degree", "French"]));
    }
}
