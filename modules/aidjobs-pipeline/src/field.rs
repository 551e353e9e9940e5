use serde::{Deserialize, Serialize};

/// Which stage produced a field value. The confidence is the extractor's
/// credence in the field, not a global quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Jsonld,
    Api,
    Meta,
    Dom,
    Heuristic,
    Regex,
    Ai,
}

impl FieldSource {
    pub fn confidence(&self) -> f64 {
        match self {
            FieldSource::Jsonld => 0.90,
            FieldSource::Api => 0.90,
            FieldSource::Meta => 0.80,
            FieldSource::Dom => 0.70,
            FieldSource::Heuristic => 0.60,
            FieldSource::Regex => 0.50,
            FieldSource::Ai => 0.40,
        }
    }
}

impl std::fmt::Display for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSource::Jsonld => write!(f, "jsonld"),
            FieldSource::Api => write!(f, "api"),
            FieldSource::Meta => write!(f, "meta"),
            FieldSource::Dom => write!(f, "dom"),
            FieldSource::Heuristic => write!(f, "heuristic"),
            FieldSource::Regex => write!(f, "regex"),
            FieldSource::Ai => write!(f, "ai"),
        }
    }
}

/// A field value: most fields are text, requirements are a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Result for a single extracted field, with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResult {
    pub value: FieldValue,
    pub source: FieldSource,
    pub confidence: f64,
    pub raw_snippet: Option<String>,
}

impl FieldResult {
    /// A field result at its source's standard confidence tier.
    pub fn new(value: impl Into<FieldValue>, source: FieldSource, raw_snippet: Option<String>) -> Self {
        Self {
            value: value.into(),
            source,
            confidence: source.confidence(),
            raw_snippet,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.value.is_empty()
    }
}

/// Truncate a snippet for storage, on a char boundary.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_table_matches_contract() {
        assert_eq!(FieldSource::Jsonld.confidence(), 0.90);
        assert_eq!(FieldSource::Api.confidence(), 0.90);
        assert_eq!(FieldSource::Meta.confidence(), 0.80);
        assert_eq!(FieldSource::Dom.confidence(), 0.70);
        assert_eq!(FieldSource::Heuristic.confidence(), 0.60);
        assert_eq!(FieldSource::Regex.confidence(), 0.50);
        assert_eq!(FieldSource::Ai.confidence(), 0.40);
    }

    #[test]
    fn confidences_all_within_unit_interval() {
        for source in [
            FieldSource::Jsonld,
            FieldSource::Api,
            FieldSource::Meta,
            FieldSource::Dom,
            FieldSource::Heuristic,
            FieldSource::Regex,
            FieldSource::Ai,
        ] {
            let c = source.confidence();
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn empty_values_invalid() {
        let blank = FieldResult::new("  ", FieldSource::Meta, None);
        assert!(!blank.is_valid());
        let empty_list = FieldResult::new(FieldValue::List(vec![]), FieldSource::Ai, None);
        assert!(!empty_list.is_valid());
        let ok = FieldResult::new("WASH Officer", FieldSource::Jsonld, None);
        assert!(ok.is_valid());
    }

    #[test]
    fn with_confidence_clamps() {
        let r = FieldResult::new("x", FieldSource::Ai, None).with_confidence(1.5);
        assert_eq!(r.confidence, 1.0);
    }
}
