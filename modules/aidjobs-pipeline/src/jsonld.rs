use std::collections::HashMap;

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::dates::{format_iso, iso_datetime_to_date};
use crate::field::{snippet, FieldResult, FieldSource};

/// Extract job fields from Schema.org `JobPosting` JSON-LD blocks.
pub struct JsonLdExtractor;

impl JsonLdExtractor {
    pub fn extract(document: &Html, _url: &str) -> HashMap<String, FieldResult> {
        let mut fields: HashMap<String, FieldResult> = HashMap::new();
        let selector =
            Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector");

        for script in document.select(&selector) {
            let raw = script.text().collect::<String>();
            let data: Value = match serde_json::from_str(&raw) {
                Ok(d) => d,
                Err(e) => {
                    debug!(error = %e, "Failed to parse JSON-LD block");
                    continue;
                }
            };

            for item in flatten(&data) {
                if !is_job_posting(item) {
                    continue;
                }
                for (name, result) in extract_job_posting(item) {
                    match fields.get(&name) {
                        Some(existing) if existing.confidence >= result.confidence => {}
                        _ => {
                            fields.insert(name, result);
                        }
                    }
                }
            }
        }

        fields
    }
}

/// Flatten a JSON-LD document into candidate items: top-level objects,
/// `@graph` members, and `itemListElement` items.
fn flatten(data: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    match data {
        Value::Object(map) => {
            if is_job_posting(data) {
                items.push(data);
            } else if let Some(Value::Array(graph)) = map.get("@graph") {
                items.extend(graph.iter().filter(|v| v.is_object()));
            } else if let Some(Value::Array(list)) = map.get("itemListElement") {
                for element in list {
                    if let Some(item) = element.get("item") {
                        items.push(item);
                    } else if element.is_object() {
                        items.push(element);
                    }
                }
            }
        }
        Value::Array(array) => items.extend(array.iter().filter(|v| v.is_object())),
        _ => {}
    }
    items
}

fn is_job_posting(item: &Value) -> bool {
    match item.get("@type") {
        Some(Value::String(t)) => t.contains("JobPosting"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|s| s.contains("JobPosting"))),
        _ => false,
    }
}

fn extract_job_posting(job: &Value) -> HashMap<String, FieldResult> {
    let mut fields = HashMap::new();
    let source = FieldSource::Jsonld;

    if let Some(title) = job.get("title").and_then(Value::as_str) {
        fields.insert(
            "title".to_string(),
            FieldResult::new(title.trim(), source, Some(snippet(title, 200))),
        );
    }

    if let Some(employer) = hiring_organization(job) {
        fields.insert(
            "employer".to_string(),
            FieldResult::new(employer.trim(), source, Some(snippet(&employer, 200))),
        );
    }

    if let Some(location) = job_location(job) {
        fields.insert(
            "location".to_string(),
            FieldResult::new(location.trim(), source, Some(snippet(&location, 200))),
        );
    }

    if let Some(posted) = job.get("datePosted").and_then(Value::as_str) {
        if let Some(date) = iso_datetime_to_date(posted) {
            fields.insert(
                "posted_on".to_string(),
                FieldResult::new(format_iso(date), source, Some(posted.to_string())),
            );
        }
    }

    let deadline_raw = job
        .get("validThrough")
        .or_else(|| job.get("applicationDeadline"))
        .and_then(Value::as_str);
    if let Some(deadline) = deadline_raw {
        if let Some(date) = iso_datetime_to_date(deadline) {
            fields.insert(
                "deadline".to_string(),
                FieldResult::new(format_iso(date), source, Some(deadline.to_string())),
            );
        }
    }

    if let Some(description) = job.get("description").and_then(Value::as_str) {
        fields.insert(
            "description".to_string(),
            FieldResult::new(description.trim(), source, Some(snippet(description, 500))),
        );
    }

    if let Some(url) = job.get("url").and_then(Value::as_str) {
        fields.insert(
            "application_url".to_string(),
            FieldResult::new(url.trim(), source, Some(url.to_string())),
        );
    }

    fields
}

fn hiring_organization(job: &Value) -> Option<String> {
    match job.get("hiringOrganization") {
        Some(Value::Object(org)) => org
            .get("name")
            .or_else(|| org.get("legalName"))
            .and_then(Value::as_str)
            .map(String::from),
        Some(Value::String(name)) => Some(name.clone()),
        _ => job
            .get("employer")
            .and_then(Value::as_str)
            .map(String::from),
    }
}

/// Join addressLocality, addressRegion, addressCountry with commas.
fn job_location(job: &Value) -> Option<String> {
    let loc = job.get("jobLocation")?;
    // jobLocation may be a single place or an array of places.
    let place = match loc {
        Value::Array(places) => places.first()?,
        other => other,
    };

    match place {
        Value::String(name) => Some(name.clone()),
        Value::Object(map) => {
            if let Some(address) = map.get("address") {
                match address {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(addr) => {
                        let parts: Vec<&str> = ["addressLocality", "addressRegion", "addressCountry"]
                            .iter()
                            .filter_map(|k| addr.get(*k).and_then(Value::as_str))
                            .filter(|s| !s.trim().is_empty())
                            .collect();
                        if parts.is_empty() {
                            None
                        } else {
                            Some(parts.join(", "))
                        }
                    }
                    _ => None,
                }
            } else {
                map.get("name").and_then(Value::as_str).map(String::from)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(jsonld: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><head><script type="application/ld+json">{jsonld}</script></head><body></body></html>"#
        ))
    }

    #[test]
    fn extracts_full_job_posting() {
        let document = doc(
            r#"{
            "@context": "https://schema.org",
            "@type": "JobPosting",
            "title": "WASH Officer",
            "hiringOrganization": {"@type": "Organization", "name": "UNICEF"},
            "jobLocation": {"@type": "Place", "address": {
                "addressLocality": "Nairobi", "addressRegion": "Nairobi County", "addressCountry": "KE"}},
            "datePosted": "2026-07-01",
            "validThrough": "2026-09-15T23:59:00Z",
            "description": "Lead WASH programming.",
            "url": "https://example.org/jobs/wash-officer"
        }"#,
        );

        let fields = JsonLdExtractor::extract(&document, "https://example.org/jobs/wash-officer");
        assert_eq!(fields["title"].value.as_text(), Some("WASH Officer"));
        assert_eq!(fields["employer"].value.as_text(), Some("UNICEF"));
        assert_eq!(
            fields["location"].value.as_text(),
            Some("Nairobi, Nairobi County, KE")
        );
        assert_eq!(fields["posted_on"].value.as_text(), Some("2026-07-01"));
        assert_eq!(fields["deadline"].value.as_text(), Some("2026-09-15"));
        assert_eq!(fields["title"].confidence, 0.90);
        assert_eq!(fields["title"].source, FieldSource::Jsonld);
    }

    #[test]
    fn flattens_graph() {
        let document = doc(
            r#"{"@graph": [
                {"@type": "WebPage", "name": "Careers"},
                {"@type": "JobPosting", "title": "Nutrition Specialist"}
            ]}"#,
        );
        let fields = JsonLdExtractor::extract(&document, "https://example.org/x");
        assert_eq!(fields["title"].value.as_text(), Some("Nutrition Specialist"));
    }

    #[test]
    fn flattens_item_list() {
        let document = doc(
            r#"{"@type": "ItemList", "itemListElement": [
                {"@type": "ListItem", "item": {"@type": "JobPosting", "title": "Driver"}}
            ]}"#,
        );
        let fields = JsonLdExtractor::extract(&document, "https://example.org/x");
        assert_eq!(fields["title"].value.as_text(), Some("Driver"));
    }

    #[test]
    fn ignores_non_job_types() {
        let document = doc(r#"{"@type": "Organization", "name": "UNICEF"}"#);
        let fields = JsonLdExtractor::extract(&document, "https://example.org/x");
        assert!(fields.is_empty());
    }

    #[test]
    fn type_array_matches() {
        let document = doc(r#"{"@type": ["JobPosting", "Thing"], "title": "Medic"}"#);
        let fields = JsonLdExtractor::extract(&document, "https://example.org/x");
        assert_eq!(fields["title"].value.as_text(), Some("Medic"));
    }

    #[test]
    fn application_deadline_alias() {
        let document =
            doc(r#"{"@type": "JobPosting", "title": "X", "applicationDeadline": "2026-10-01"}"#);
        let fields = JsonLdExtractor::extract(&document, "https://example.org/x");
        assert_eq!(fields["deadline"].value.as_text(), Some("2026-10-01"));
    }

    #[test]
    fn malformed_block_skipped() {
        let document = doc("{ not json ");
        let fields = JsonLdExtractor::extract(&document, "https://example.org/x");
        assert!(fields.is_empty());
    }
}
