use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use aidjobs_common::EnrichmentBlock;
use openrouter_client::{ChatMessage, ChatRequest, OpenRouterClient};

use crate::canonical::{
    CANONICAL_EXPERIENCE_LEVELS, CANONICAL_FUNCTIONAL_ROLES, CANONICAL_IMPACT_DOMAINS,
};
use crate::rules::{apply_enrichment_rules, validate_enrichment};

/// Fields handed to the enrichment prompt.
#[derive(Debug, Clone)]
pub struct EnrichmentInput {
    pub job_id: String,
    pub title: String,
    pub description: String,
    pub org_name: Option<String>,
    pub location: Option<String>,
    pub functional_role_hint: Option<String>,
}

/// Shape the model must return. The schema is injected into the prompt.
#[derive(Debug, Default, Deserialize, JsonSchema)]
struct EnrichmentResponse {
    #[serde(default)]
    impact_domain: Vec<String>,
    #[serde(default)]
    impact_confidences: HashMap<String, f64>,
    #[serde(default)]
    functional_role: Vec<String>,
    #[serde(default)]
    functional_confidences: HashMap<String, f64>,
    experience_level: Option<String>,
    experience_confidence: Option<f64>,
    #[serde(default)]
    estimated_experience_years: HashMap<String, serde_json::Value>,
    #[serde(default)]
    sdgs: Vec<u8>,
    #[serde(default)]
    sdg_confidences: HashMap<String, f64>,
    sdg_explanation: Option<String>,
    #[serde(default)]
    matched_keywords: Vec<String>,
    confidence_overall: Option<f64>,
}

/// Classifies free-text jobs into the fixed taxonomy via the LLM, then
/// applies validation and the deterministic rule pipeline.
pub struct EnrichmentEngine {
    client: Arc<OpenRouterClient>,
    model: String,
}

impl EnrichmentEngine {
    pub fn new(client: Arc<OpenRouterClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    /// Enrich one job. Returns None when the model yields nothing usable;
    /// the job keeps its previous enrichment in that case.
    pub async fn enrich(&self, input: &EnrichmentInput) -> Option<EnrichmentBlock> {
        info!(
            job_id = %input.job_id,
            title = %input.title.chars().take(50).collect::<String>(),
            desc_length = input.description.len(),
            "Enriching job"
        );

        let request = ChatRequest::new(
            &self.model,
            vec![
                ChatMessage::system(
                    "You classify humanitarian and development job postings into a fixed \
                     taxonomy. Return only valid JSON.",
                ),
                ChatMessage::user(self.build_prompt(input)),
            ],
        )
        .with_temperature(0.0)
        .with_max_tokens(1500)
        .with_json_response();

        let value = match self.client.chat_json(&request).await {
            Ok(v) => v,
            Err(e) => {
                warn!(job_id = %input.job_id, error = %e, "Enrichment call failed");
                return None;
            }
        };

        let response: EnrichmentResponse = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(job_id = %input.job_id, error = %e, "Enrichment response did not match schema");
                return None;
            }
        };

        let mut enrichment = EnrichmentBlock {
            impact_domain: response.impact_domain,
            impact_confidences: response.impact_confidences,
            functional_role: response.functional_role,
            functional_confidences: response.functional_confidences,
            experience_level: response.experience_level,
            experience_confidence: response.experience_confidence,
            estimated_experience_years: response.estimated_experience_years,
            sdgs: response.sdgs,
            sdg_confidences: response.sdg_confidences,
            sdg_explanation: response.sdg_explanation,
            matched_keywords: response.matched_keywords,
            confidence_overall: response.confidence_overall,
            low_confidence: false,
            low_confidence_reason: None,
            enrichment_version: 1,
            enriched_at: Some(Utc::now()),
        };

        validate_enrichment(&mut enrichment);
        apply_enrichment_rules(&mut enrichment);

        info!(
            job_id = %input.job_id,
            confidence_overall = ?enrichment.confidence_overall,
            low_confidence = enrichment.low_confidence,
            impact_domains = enrichment.impact_domain.len(),
            functional_roles = enrichment.functional_role.len(),
            "Enrichment complete"
        );

        Some(enrichment)
    }

    fn build_prompt(&self, input: &EnrichmentInput) -> String {
        let schema = schemars::schema_for!(EnrichmentResponse);
        let schema_json = serde_json::to_string(&schema).unwrap_or_default();

        let mut context = format!("Title: {}\n", input.title);
        if let Some(ref org) = input.org_name {
            context.push_str(&format!("Organization: {org}\n"));
        }
        if let Some(ref location) = input.location {
            context.push_str(&format!("Location: {location}\n"));
        }
        if let Some(ref hint) = input.functional_role_hint {
            context.push_str(&format!("Role hint: {hint}\n"));
        }
        let description: String = input.description.chars().take(4000).collect();
        context.push_str(&format!("Description:\n{description}\n"));

        format!(
            r#"Classify this job posting.

{context}
Allowed impact domains: {impact_domains}

Allowed functional roles: {functional_roles}

Allowed experience levels: {experience_levels}

SDGs are integers 1-17. Provide a per-item confidence in [0,1] for every
impact domain, functional role, and SDG you assign, plus
experience_confidence and confidence_overall. Only assign SDGs when the
role directly advances them.

Respond with JSON matching this schema:
{schema_json}"#,
            impact_domains = CANONICAL_IMPACT_DOMAINS.join("; "),
            functional_roles = CANONICAL_FUNCTIONAL_ROLES.join("; "),
            experience_levels = CANONICAL_EXPERIENCE_LEVELS.join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_deserializes_with_defaults() {
        let raw = r#"{"functional_role": ["Project Management"], "confidence_overall": 0.8}"#;
        let response: EnrichmentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.functional_role, vec!["Project Management"]);
        assert!(response.impact_domain.is_empty());
        assert!(response.sdgs.is_empty());
        assert_eq!(response.confidence_overall, Some(0.8));
    }

    #[test]
    fn prompt_lists_canonical_sets() {
        let engine = EnrichmentEngine::new(
            Arc::new(OpenRouterClient::new("test-key")),
            "anthropic/claude-3-haiku",
        );
        let prompt = engine.build_prompt(&EnrichmentInput {
            job_id: "j1".to_string(),
            title: "WASH Officer".to_string(),
            description: "Water and sanitation".to_string(),
            org_name: Some("UNICEF".to_string()),
            location: Some("Nairobi".to_string()),
            functional_role_hint: None,
        });
        assert!(prompt.contains("Water, Sanitation & Hygiene (WASH)"));
        assert!(prompt.contains("MEAL / Research / Evidence"));
        assert!(prompt.contains("Head of Unit / Director"));
        assert!(prompt.contains("WASH Officer"));
    }
}
