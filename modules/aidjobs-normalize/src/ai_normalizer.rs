use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use openrouter_client::{ChatMessage, ChatRequest, OpenRouterClient};

/// LLM-assisted normalizer, invoked only for ambiguous fields so spend
/// stays low: deadlines not already `YYYY-MM-DD`, locations with multiple
/// separators, unstructured salary text.
pub struct AiNormalizer {
    client: Arc<OpenRouterClient>,
    model: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormalizedFields {
    pub deadline: Option<String>,
    pub location: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
}

impl AiNormalizer {
    pub fn new(client: Arc<OpenRouterClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    /// Whether any of the fields is ambiguous enough to justify a call.
    pub fn is_ambiguous(
        deadline_raw: Option<&str>,
        location_raw: Option<&str>,
        salary_raw: Option<&str>,
    ) -> bool {
        deadline_raw.is_some_and(deadline_is_ambiguous)
            || location_raw.is_some_and(location_is_ambiguous)
            || salary_raw.is_some_and(|s| !s.trim().is_empty())
    }

    /// Normalize the ambiguous subset. Returns defaults on any failure;
    /// the caller keeps its deterministic values.
    pub async fn normalize(
        &self,
        deadline_raw: Option<&str>,
        location_raw: Option<&str>,
        salary_raw: Option<&str>,
    ) -> NormalizedFields {
        let mut parts = Vec::new();
        if let Some(deadline) = deadline_raw.filter(|d| deadline_is_ambiguous(d)) {
            parts.push(format!("deadline: {deadline}"));
        }
        if let Some(location) = location_raw.filter(|l| location_is_ambiguous(l)) {
            parts.push(format!("location: {location}"));
        }
        if let Some(salary) = salary_raw.filter(|s| !s.trim().is_empty()) {
            parts.push(format!("salary: {salary}"));
        }
        if parts.is_empty() {
            return NormalizedFields::default();
        }

        let prompt = format!(
            r#"Normalize these job posting fields. Return ONLY valid JSON:
{{
  "deadline": "YYYY-MM-DD or null",
  "location": "City, Country or null",
  "salary_min": number or null,
  "salary_max": number or null,
  "salary_currency": "ISO code or null"
}}

Fields:
{}"#,
            parts.join("\n")
        );

        let request = ChatRequest::new(
            &self.model,
            vec![
                ChatMessage::system("You normalize messy job fields. Return only valid JSON."),
                ChatMessage::user(prompt),
            ],
        )
        .with_temperature(0.0)
        .with_max_tokens(300);

        match self.client.chat_json(&request).await {
            Ok(value) => {
                debug!("AI normalizer returned corrections");
                serde_json::from_value(value).unwrap_or_default()
            }
            Err(e) => {
                warn!(error = %e, "AI normalization failed");
                NormalizedFields::default()
            }
        }
    }
}

fn deadline_is_ambiguous(deadline: &str) -> bool {
    let iso = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex");
    !deadline.trim().is_empty() && !iso.is_match(deadline.trim())
}

fn location_is_ambiguous(location: &str) -> bool {
    let separators = location.matches([',', '/', '|', ';']).count();
    separators >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_deadline_not_ambiguous() {
        assert!(!AiNormalizer::is_ambiguous(Some("2026-09-15"), None, None));
        assert!(AiNormalizer::is_ambiguous(Some("15th Sept 26"), None, None));
    }

    #[test]
    fn multi_separator_location_ambiguous() {
        assert!(!AiNormalizer::is_ambiguous(None, Some("Nairobi, Kenya"), None));
        assert!(AiNormalizer::is_ambiguous(
            None,
            Some("Nairobi, Kenya / Kampala, Uganda"),
            None
        ));
    }

    #[test]
    fn any_salary_text_ambiguous() {
        assert!(AiNormalizer::is_ambiguous(None, None, Some("competitive, circa 50k")));
        assert!(!AiNormalizer::is_ambiguous(None, None, Some("  ")));
        assert!(!AiNormalizer::is_ambiguous(None, None, None));
    }
}
