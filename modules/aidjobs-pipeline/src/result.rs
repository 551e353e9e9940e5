use std::collections::HashMap;

use aidjobs_common::{content_hash, short_hash};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::field::FieldResult;
#[cfg(test)]
use crate::field::FieldSource;

/// Fields the cascade extracts, in snapshot order.
pub const EXTRACTED_FIELDS: [&str; 8] = [
    "title",
    "employer",
    "location",
    "posted_on",
    "deadline",
    "description",
    "requirements",
    "application_url",
];

/// Query-parameter keys that look like job identifiers; kept when deriving
/// the canonical id.
const ID_PARAM_MARKERS: [&str; 4] = ["id", "job", "position", "vacancy"];

/// Complete per-page extraction result. Each field keeps the
/// highest-confidence proposal seen across stages.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub url: String,
    pub canonical_id: String,
    pub extracted_at: DateTime<Utc>,
    pub pipeline_version: String,
    pub fields: HashMap<String, FieldResult>,
    pub is_job: bool,
    pub classifier_score: f64,
    pub dedupe_hash: String,
}

impl ExtractionResult {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            canonical_id: canonical_id(url),
            extracted_at: Utc::now(),
            pipeline_version: crate::PIPELINE_VERSION.to_string(),
            fields: HashMap::new(),
            is_job: false,
            classifier_score: 0.0,
            dedupe_hash: String::new(),
        }
    }

    /// Propose a field result; the highest confidence wins.
    pub fn set_field(&mut self, name: &str, result: FieldResult) {
        match self.fields.get(name) {
            Some(existing) if existing.confidence >= result.confidence => {}
            _ => {
                self.fields.insert(name.to_string(), result);
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldResult> {
        self.fields.get(name)
    }

    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|f| f.value.as_text())
    }

    /// Whether a critical field is missing, empty, or below the given
    /// confidence.
    pub fn field_weak(&self, name: &str, min_confidence: f64) -> bool {
        match self.fields.get(name) {
            Some(f) => !f.is_valid() || f.confidence < min_confidence,
            None => true,
        }
    }

    /// Compute and store the dedupe hash over the lowercased pipeline
    /// fields `employer|title|location|application_url`.
    pub fn finalize(&mut self) {
        self.dedupe_hash = self.compute_dedupe_hash();
    }

    fn compute_dedupe_hash(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for name in ["employer", "title", "location"] {
            if let Some(text) = self.field_text(name) {
                if !text.trim().is_empty() {
                    parts.push(text.trim().to_lowercase());
                }
            }
        }
        if let Some(url) = self.field_text("application_url") {
            if !url.trim().is_empty() {
                parts.push(url.trim().to_string());
            }
        }
        if parts.is_empty() {
            return String::new();
        }
        content_hash(&parts.join("|"))
    }

    /// Whether the AI fallback should run: more than one of the critical
    /// fields is missing or weak.
    pub fn needs_ai_fallback(&self) -> bool {
        let weak = ["title", "employer", "location"]
            .iter()
            .filter(|f| self.field_weak(f, 0.5))
            .count();
        weak > 1
    }

    /// Snapshot-sidecar shape: every extractable field present, null-filled
    /// when no stage proposed a value.
    pub fn to_snapshot_json(&self) -> serde_json::Value {
        let mut fields = serde_json::Map::new();
        for name in EXTRACTED_FIELDS {
            let value = match self.fields.get(name) {
                Some(field) => serde_json::to_value(field).unwrap_or(serde_json::Value::Null),
                None => serde_json::json!({
                    "value": null,
                    "source": null,
                    "confidence": 0.0,
                    "raw_snippet": null,
                }),
            };
            fields.insert(name.to_string(), value);
        }

        serde_json::json!({
            "url": self.url,
            "canonical_id": self.canonical_id,
            "extracted_at": self.extracted_at.to_rfc3339(),
            "pipeline_version": self.pipeline_version,
            "fields": fields,
            "is_job": self.is_job,
            "classifier_score": (self.classifier_score * 100.0).round() / 100.0,
            "dedupe_hash": self.dedupe_hash,
        })
    }
}

/// Stable identity for a posting URL: 16-hex SHA-256 prefix over host+path,
/// plus any query params that look like job ids.
pub fn canonical_id(url: &str) -> String {
    let parsed = match url::Url::parse(url) {
        Ok(u) => u,
        Err(_) => return short_hash(url),
    };

    let mut base = format!("{}{}", parsed.host_str().unwrap_or(""), parsed.path());

    if let Some(query) = parsed.query() {
        let id_params: Vec<&str> = query
            .split('&')
            .filter(|p| {
                let lower = p.to_lowercase();
                ID_PARAM_MARKERS.iter().any(|marker| lower.contains(marker))
            })
            .collect();
        if !id_params.is_empty() {
            base.push('?');
            base.push_str(&id_params.join("&"));
        }
    }

    short_hash(&base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_id_ignores_tracking_params() {
        let a = canonical_id("https://example.org/jobs/officer?utm_source=rss");
        let b = canonical_id("https://example.org/jobs/officer");
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_id_keeps_id_params() {
        let with_id = canonical_id("https://example.org/jobs?job_id=42");
        let without = canonical_id("https://example.org/jobs");
        assert_ne!(with_id, without);

        // Same id param, stable.
        assert_eq!(with_id, canonical_id("https://example.org/jobs?job_id=42"));
    }

    #[test]
    fn higher_confidence_wins() {
        let mut result = ExtractionResult::new("https://example.org/jobs/1");
        result.set_field(
            "title",
            FieldResult::new("Heuristic Title", FieldSource::Heuristic, None),
        );
        result.set_field(
            "title",
            FieldResult::new("JSON-LD Title", FieldSource::Jsonld, None),
        );
        assert_eq!(result.field_text("title"), Some("JSON-LD Title"));

        // Lower confidence does not displace.
        result.set_field(
            "title",
            FieldResult::new("Regex Title", FieldSource::Regex, None),
        );
        assert_eq!(result.field_text("title"), Some("JSON-LD Title"));
    }

    #[test]
    fn dedupe_hash_lowercases_identity_fields() {
        let mut a = ExtractionResult::new("https://example.org/p/1");
        a.set_field("employer", FieldResult::new("UNDP", FieldSource::Jsonld, None));
        a.set_field("title", FieldResult::new("WASH Officer", FieldSource::Jsonld, None));
        a.set_field("location", FieldResult::new("Nairobi", FieldSource::Jsonld, None));
        a.finalize();

        let mut b = ExtractionResult::new("https://example.org/p/1");
        b.set_field("employer", FieldResult::new("undp", FieldSource::Meta, None));
        b.set_field("title", FieldResult::new("wash officer", FieldSource::Meta, None));
        b.set_field("location", FieldResult::new("NAIROBI", FieldSource::Meta, None));
        b.finalize();

        assert_eq!(a.dedupe_hash, b.dedupe_hash);
        assert_eq!(a.dedupe_hash.len(), 64);
    }

    #[test]
    fn empty_result_has_empty_dedupe_hash() {
        let mut result = ExtractionResult::new("https://example.org/");
        result.finalize();
        assert!(result.dedupe_hash.is_empty());
    }

    #[test]
    fn ai_fallback_gate_counts_weak_criticals() {
        let mut result = ExtractionResult::new("https://example.org/p/1");
        assert!(result.needs_ai_fallback());

        result.set_field("title", FieldResult::new("Officer", FieldSource::Jsonld, None));
        // employer + location still missing -> 2 weak -> AI needed
        assert!(result.needs_ai_fallback());

        result.set_field("employer", FieldResult::new("UNDP", FieldSource::Meta, None));
        // Only location weak -> no AI
        assert!(!result.needs_ai_fallback());
    }

    #[test]
    fn snapshot_json_null_fills_missing_fields() {
        let mut result = ExtractionResult::new("https://example.org/p/1");
        result.set_field("title", FieldResult::new("Officer", FieldSource::Meta, None));
        result.finalize();

        let json = result.to_snapshot_json();
        let fields = json["fields"].as_object().unwrap();
        assert_eq!(fields.len(), EXTRACTED_FIELDS.len());
        assert_eq!(fields["title"]["value"], "Officer");
        assert_eq!(fields["title"]["source"], "meta");
        assert!(fields["deadline"]["value"].is_null());
        assert_eq!(fields["deadline"]["confidence"], 0.0);
    }

    #[test]
    fn low_confidence_field_counts_as_weak() {
        let mut result = ExtractionResult::new("https://example.org/p/1");
        result.set_field("title", FieldResult::new("Officer", FieldSource::Ai, None));
        result.set_field("employer", FieldResult::new("UNDP", FieldSource::Ai, None));
        result.set_field("location", FieldResult::new("Nairobi", FieldSource::Jsonld, None));
        // title and employer at 0.40 < 0.5 -> 2 weak
        assert!(result.needs_ai_fallback());
    }
}
