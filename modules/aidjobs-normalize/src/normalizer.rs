use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::debug;

use aidjobs_common::{short_hash, JobDraft};

use crate::ai_normalizer::AiNormalizer;
use crate::geocode::Geocoder;
use crate::keywords;
use crate::quality::QualityScorer;
use crate::taxonomy::TaxonomyCache;
use crate::unknowns::capture_unknowns;

/// A raw record as handed over by the extraction pipeline: strings only,
/// nothing validated yet.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub title: String,
    pub apply_url: String,
    pub org_name: Option<String>,
    pub location_raw: Option<String>,
    pub deadline_raw: Option<String>,
    pub description_snippet: Option<String>,
    pub salary_raw: Option<String>,
}

/// Canonicalizes raw records against the taxonomy, parses deadlines,
/// geocodes, scores quality, and derives the canonical hash. The AI
/// normalizer and geocoder are best-effort; their absence or failure never
/// blocks a draft.
pub struct Normalizer {
    taxonomy: Arc<TaxonomyCache>,
    quality: QualityScorer,
    geocoder: Option<Arc<Geocoder>>,
    ai: Option<AiNormalizer>,
}

impl Normalizer {
    pub fn new(
        taxonomy: Arc<TaxonomyCache>,
        geocoder: Option<Arc<Geocoder>>,
        ai: Option<AiNormalizer>,
    ) -> Self {
        Self {
            taxonomy,
            quality: QualityScorer::new(),
            geocoder,
            ai,
        }
    }

    pub async fn normalize(
        &self,
        record: RawRecord,
        source_org_name: Option<&str>,
        today: NaiveDate,
    ) -> JobDraft {
        let mut draft = JobDraft {
            title: record.title.trim().to_string(),
            apply_url: record.apply_url.trim().to_string(),
            org_name: record
                .org_name
                .clone()
                .or_else(|| source_org_name.map(String::from)),
            location_raw: record
                .location_raw
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            description_snippet: record
                .description_snippet
                .as_deref()
                .map(|d| d.chars().take(500).collect::<String>()),
            ..Default::default()
        };

        // Keyword tagging from the title, validated against the taxonomy.
        draft.level_norm = keywords::level_from_title(&draft.title)
            .and_then(|level| self.taxonomy.norm_level(level));
        draft.career_type = Some(keywords::career_type_from_title(&draft.title).to_string());
        let modality = keywords::modality_from_title(&draft.title);
        draft.work_modality = self
            .taxonomy
            .norm_modality(modality)
            .or_else(|| Some(modality.to_string()));

        let raw_tags = draft
            .description_snippet
            .as_deref()
            .map(keywords::mission_tags_from_text)
            .unwrap_or_default();
        draft.mission_tags = self.taxonomy.norm_tags(&raw_tags);
        draft.international_eligible = Some(keywords::international_eligible(
            &draft.title,
            draft.work_modality.as_deref().unwrap_or("onsite"),
        ));

        // AI assist for ambiguous fields only.
        let mut deadline_raw = record.deadline_raw.clone();
        if let Some(ai) = &self.ai {
            if AiNormalizer::is_ambiguous(
                record.deadline_raw.as_deref(),
                record.location_raw.as_deref(),
                record.salary_raw.as_deref(),
            ) {
                let corrected = ai
                    .normalize(
                        record.deadline_raw.as_deref(),
                        record.location_raw.as_deref(),
                        record.salary_raw.as_deref(),
                    )
                    .await;
                if corrected.deadline.is_some() {
                    deadline_raw = corrected.deadline;
                }
                if let Some(location) = corrected.location {
                    draft.location_raw = Some(location);
                }
            }
        }

        draft.deadline = deadline_raw.as_deref().and_then(|d| parse_deadline(d, today));

        // Country from the location text, then geocoding for coordinates.
        if let Some(ref location) = draft.location_raw {
            if let Some((name, iso)) = self.taxonomy.find_country_in_text(location) {
                draft.country = Some(titlecase(name));
                draft.country_iso = Some(iso.to_string());
            }
            if let Some(geocoder) = &self.geocoder {
                let geo = geocoder.geocode(location).await;
                draft.is_remote = Some(geo.is_remote);
                if geo.country.is_some() {
                    draft.country = geo.country;
                }
                if geo.country_iso.is_some() {
                    draft.country_iso = geo.country_iso;
                }
                draft.city = geo.city;
                draft.latitude = geo.latitude;
                draft.longitude = geo.longitude;
                draft.geocoding_source = geo.source;
            }
        }
        if draft.is_remote.is_none() {
            draft.is_remote = Some(draft.work_modality.as_deref() == Some("remote"));
        }

        let mut metadata = serde_json::Map::new();

        // Unknown capture for reviewer follow-up.
        let raw_tags_value = json!(raw_tags);
        let norm_tags_value = json!(draft.mission_tags);
        let unknowns = capture_unknowns(
            &[("mission_tags", &raw_tags_value)],
            &[("mission_tags", &norm_tags_value)],
        );
        if !unknowns.is_empty() {
            debug!(count = unknowns.len(), "Captured unknown taxonomy values");
            metadata.insert("unknown".to_string(), json!(unknowns));
        }

        // Compensation, when the posting surfaces any.
        if let Some(ref salary) = record.salary_raw {
            let compensation = crate::parse::parse_compensation(Some(salary), None);
            if compensation.visible {
                metadata.insert(
                    "compensation".to_string(),
                    json!({
                        "type": compensation.comp_type,
                        "min_usd": compensation.min_usd,
                        "max_usd": compensation.max_usd,
                        "currency": compensation.currency,
                        "confidence": compensation.confidence,
                    }),
                );
            }
        }

        if !metadata.is_empty() {
            draft.raw_metadata = Some(serde_json::Value::Object(metadata));
        }

        draft.canonical_hash = canonical_hash(&draft.title, &draft.apply_url);
        draft.quality = Some(self.quality.score(&draft, today));

        draft
    }
}

/// Stable identity across re-fetches: 16-hex SHA-256 over the lowercased
/// title and apply URL.
pub fn canonical_hash(title: &str, apply_url: &str) -> String {
    short_hash(&format!("{}|{}", title.to_lowercase(), apply_url.to_lowercase()))
}

/// Parse a deadline to a date, day-first, preferring future readings.
/// Unparseable deadlines are dropped rather than stored raw.
pub fn parse_deadline(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
        return Some(date);
    }

    for format in ["%d %B %Y", "%d %b %Y", "%B %d, %Y", "%b %d, %Y", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, format) {
            return Some(date);
        }
    }

    let day_first = ["%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y"]
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(cleaned, f).ok());
    let month_first = ["%m/%d/%Y", "%m-%d-%Y", "%m/%d/%y"]
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(cleaned, f).ok());

    match (day_first, month_first) {
        (Some(d), Some(m)) if d != m && d < today && m >= today => Some(m),
        (Some(d), _) => Some(d),
        (None, m) => m,
    }
}

fn titlecase(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(Arc::new(TaxonomyCache::fallback()), None, None)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    fn record() -> RawRecord {
        RawRecord {
            title: "Senior WASH Officer".to_string(),
            apply_url: "https://example.org/jobs/1".to_string(),
            org_name: None,
            location_raw: Some("Nairobi, Kenya".to_string()),
            deadline_raw: Some("15/09/2026".to_string()),
            description_snippet: Some(
                "Water and sanitation programming for displaced communities.".to_string(),
            ),
            salary_raw: None,
        }
    }

    #[tokio::test]
    async fn full_normalization() {
        let draft = normalizer().normalize(record(), Some("Example Org"), today()).await;

        assert_eq!(draft.org_name.as_deref(), Some("Example Org"));
        assert_eq!(draft.level_norm.as_deref(), Some("senior"));
        assert_eq!(draft.career_type.as_deref(), Some("staff"));
        assert_eq!(draft.work_modality.as_deref(), Some("onsite"));
        assert_eq!(draft.deadline, NaiveDate::from_ymd_opt(2026, 9, 15));
        assert_eq!(draft.country_iso.as_deref(), Some("KE"));
        assert_eq!(draft.country.as_deref(), Some("Kenya"));
        assert!(draft.mission_tags.contains(&"wash".to_string()));
        assert_eq!(draft.canonical_hash.len(), 16);
        assert!(draft.quality.is_some());
    }

    #[tokio::test]
    async fn source_org_name_only_fills_gaps() {
        let mut r = record();
        r.org_name = Some("UNICEF".to_string());
        let draft = normalizer().normalize(r, Some("Example Org"), today()).await;
        assert_eq!(draft.org_name.as_deref(), Some("UNICEF"));
    }

    #[tokio::test]
    async fn unparseable_deadline_dropped() {
        let mut r = record();
        r.deadline_raw = Some("as soon as possible".to_string());
        let draft = normalizer().normalize(r, None, today()).await;
        assert!(draft.deadline.is_none());
    }

    #[tokio::test]
    async fn normalization_is_idempotent() {
        let n = normalizer();
        let first = n.normalize(record(), Some("Example Org"), today()).await;

        let again = RawRecord {
            title: first.title.clone(),
            apply_url: first.apply_url.clone(),
            org_name: first.org_name.clone(),
            location_raw: first.location_raw.clone(),
            deadline_raw: first.deadline.map(|d| d.format("%Y-%m-%d").to_string()),
            description_snippet: first.description_snippet.clone(),
            salary_raw: None,
        };
        let second = n.normalize(again, Some("Example Org"), today()).await;

        assert_eq!(second.title, first.title);
        assert_eq!(second.level_norm, first.level_norm);
        assert_eq!(second.work_modality, first.work_modality);
        assert_eq!(second.mission_tags, first.mission_tags);
        assert_eq!(second.deadline, first.deadline);
        assert_eq!(second.country_iso, first.country_iso);
        assert_eq!(second.canonical_hash, first.canonical_hash);
    }

    #[tokio::test]
    async fn remote_title_sets_modality_and_eligibility() {
        let mut r = record();
        r.title = "Data Analyst (Remote)".to_string();
        let draft = normalizer().normalize(r, None, today()).await;
        assert_eq!(draft.work_modality.as_deref(), Some("remote"));
        assert_eq!(draft.is_remote, Some(true));
        assert_eq!(draft.international_eligible, Some(true));
    }

    #[tokio::test]
    async fn salary_text_lands_in_raw_metadata() {
        let mut r = record();
        r.salary_raw = Some("USD 50,000 - 70,000 per year".to_string());
        let draft = normalizer().normalize(r, None, today()).await;
        let metadata = draft.raw_metadata.expect("metadata present");
        let compensation = &metadata["compensation"];
        assert_eq!(compensation["currency"], "USD");
        assert_eq!(compensation["min_usd"], 50000.0);
        assert_eq!(compensation["max_usd"], 70000.0);
    }

    #[test]
    fn canonical_hash_case_insensitive() {
        assert_eq!(
            canonical_hash("WASH Officer", "https://EXAMPLE.org/p/1"),
            canonical_hash("wash officer", "https://example.org/p/1")
        );
    }

    #[test]
    fn deadline_round_trip() {
        let date = parse_deadline("2026-09-15", today()).unwrap();
        assert_eq!(date.format("%Y-%m-%d").to_string(), "2026-09-15");
    }
}
