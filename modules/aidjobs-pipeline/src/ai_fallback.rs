use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use aidjobs_common::content_hash;
use openrouter_client::{ChatMessage, ChatRequest, OpenRouterClient};

use crate::field::{snippet, FieldResult, FieldSource, FieldValue};

/// Bytes of page body mixed into the cache key.
const CACHE_BODY_PREFIX: usize = 1000;
/// Page text budget sent to the model.
const PROMPT_TEXT_LIMIT: usize = 5000;

/// LLM extractor of last resort. Gated on a global call budget and a
/// same-page cache; prompts are deterministic (temperature 0.1, fixed
/// few-shot examples).
pub struct AiFallbackExtractor {
    client: Arc<OpenRouterClient>,
    model: String,
    max_calls: u32,
    call_count: AtomicU32,
    cache: Mutex<HashMap<String, HashMap<String, FieldResult>>>,
}

impl AiFallbackExtractor {
    pub fn new(client: Arc<OpenRouterClient>, model: &str, max_calls: u32) -> Self {
        Self {
            client,
            model: model.to_string(),
            max_calls,
            call_count: AtomicU32::new(0),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls_made(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Extract fields from page text. `page_text` should be the visible
    /// text, already reduced from HTML.
    pub async fn extract(
        &self,
        page_text: &str,
        body_prefix: &str,
        url: &str,
    ) -> HashMap<String, FieldResult> {
        if self.call_count.load(Ordering::Relaxed) >= self.max_calls {
            warn!(max_calls = self.max_calls, "AI extraction budget exhausted");
            return HashMap::new();
        }

        let cache_key = cache_key(url, body_prefix);
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&cache_key) {
                debug!(url, "AI extraction cache hit");
                return cached.clone();
            }
        }

        let prompt = build_prompt(page_text, url);
        let request = ChatRequest::new(
            &self.model,
            vec![
                ChatMessage::system(
                    "You are a job extraction assistant. Return only valid JSON.",
                ),
                ChatMessage::user(prompt),
            ],
        )
        .with_temperature(0.1)
        .with_max_tokens(2000);

        let response = match self.client.chat_json(&request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "AI extraction failed");
                return HashMap::new();
            }
        };
        self.call_count.fetch_add(1, Ordering::Relaxed);

        let fields = parse_response(&response);

        let mut cache = self.cache.lock().await;
        cache.insert(cache_key, fields.clone());
        fields
    }
}

pub(crate) fn cache_key(url: &str, body_prefix: &str) -> String {
    let prefix: String = body_prefix.chars().take(CACHE_BODY_PREFIX).collect();
    content_hash(&format!("{url}:{prefix}"))
}

fn build_prompt(page_text: &str, url: &str) -> String {
    let text: String = page_text.chars().take(PROMPT_TEXT_LIMIT).collect();
    format!(
        r#"Extract job information from the following HTML page.

URL: {url}

Page text (first {PROMPT_TEXT_LIMIT} chars):
{text}

Extract the following fields:
- title: Job title
- employer: Organization/company name
- location: Duty station or work location
- posted_on: Date posted (YYYY-MM-DD format)
- deadline: Application deadline (YYYY-MM-DD format)
- description: Job description
- requirements: List of requirements/qualifications
- application_url: URL to apply

Return ONLY valid JSON in this exact format:
{{
  "title": "string or null",
  "employer": "string or null",
  "location": "string or null",
  "posted_on": "YYYY-MM-DD or null",
  "deadline": "YYYY-MM-DD or null",
  "description": "string or null",
  "requirements": ["string"] or null,
  "application_url": "string or null",
  "confidence": 0.0-1.0
}}

Examples:
1. Job posting with all fields:
{{
  "title": "Program Officer - Climate",
  "employer": "UNDP",
  "location": "New York, USA",
  "posted_on": "2025-01-01",
  "deadline": "2025-02-15",
  "description": "Manage climate programs...",
  "requirements": ["Master's degree", "5 years experience"],
  "application_url": "https://jobs.undp.org/apply/123",
  "confidence": 0.9
}}

2. Partial information:
{{
  "title": "Finance Manager",
  "employer": null,
  "location": "Remote",
  "posted_on": null,
  "deadline": "2025-03-01",
  "description": "Manage finance operations...",
  "requirements": null,
  "application_url": "https://example.com/apply",
  "confidence": 0.7
}}

Now extract from the provided page:"#
    )
}

/// Coerce the model's JSON into field results at the AI confidence tier.
/// A self-reported confidence above 0.8 earns a modest boost.
pub(crate) fn parse_response(response: &Value) -> HashMap<String, FieldResult> {
    let mut fields = HashMap::new();

    let reported = response
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(FieldSource::Ai.confidence());
    let confidence = if reported > 0.8 {
        (FieldSource::Ai.confidence() + 0.2).min(0.9)
    } else {
        FieldSource::Ai.confidence()
    };

    for name in [
        "title",
        "employer",
        "location",
        "posted_on",
        "deadline",
        "description",
        "application_url",
    ] {
        if let Some(text) = response.get(name).and_then(Value::as_str) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                fields.insert(
                    name.to_string(),
                    FieldResult::new(trimmed, FieldSource::Ai, Some(snippet(trimmed, 200)))
                        .with_confidence(confidence),
                );
            }
        }
    }

    if let Some(Value::Array(items)) = response.get("requirements") {
        let requirements: Vec<String> = items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .collect();
        if !requirements.is_empty() {
            let preview = serde_json::to_string(&requirements).unwrap_or_default();
            fields.insert(
                "requirements".to_string(),
                FieldResult::new(
                    FieldValue::List(requirements),
                    FieldSource::Ai,
                    Some(snippet(&preview, 500)),
                )
                .with_confidence(confidence),
            );
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_response_at_boosted_confidence() {
        let response = json!({
            "title": "Program Officer",
            "employer": "UNDP",
            "location": "Nairobi",
            "deadline": "2026-09-15",
            "requirements": ["Degree", "French"],
            "confidence": 0.9
        });
        let fields = parse_response(&response);
        assert_eq!(fields["title"].value.as_text(), Some("Program Officer"));
        assert!((fields["title"].confidence - 0.6).abs() < 1e-9);
        match &fields["requirements"].value {
            FieldValue::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn low_reported_confidence_stays_at_tier() {
        let response = json!({"title": "Driver", "confidence": 0.5});
        let fields = parse_response(&response);
        assert!((fields["title"].confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn nulls_and_blanks_dropped() {
        let response = json!({"title": "X", "employer": null, "location": "  "});
        let fields = parse_response(&response);
        assert!(fields.contains_key("title"));
        assert!(!fields.contains_key("employer"));
        assert!(!fields.contains_key("location"));
    }

    #[test]
    fn cache_key_depends_on_url_and_prefix() {
        let a = cache_key("https://example.org/1", "<html>a</html>");
        let b = cache_key("https://example.org/1", "<html>b</html>");
        let c = cache_key("https://example.org/2", "<html>a</html>");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, cache_key("https://example.org/1", "<html>a</html>"));
    }
}
