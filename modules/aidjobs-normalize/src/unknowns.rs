use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw value dropped during normalization, kept in `raw_metadata.unknown`
/// so reviewers can promote it into the taxonomy later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownValue {
    pub field: String,
    pub value: String,
}

/// Diff raw values against their normalized counterparts and capture what
/// was dropped. For list fields the set difference is captured; for scalars
/// a raw value with an empty normalization is captured whole.
pub fn capture_unknowns(
    raw: &[(&str, &Value)],
    normalized: &[(&str, &Value)],
) -> Vec<UnknownValue> {
    let mut unknowns = Vec::new();

    for (field, raw_value) in raw {
        let norm_value = normalized
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| *v);

        match (raw_value, norm_value) {
            (Value::Array(raw_items), Some(Value::Array(norm_items))) => {
                let kept: Vec<String> = norm_items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_lowercase())
                    .collect();
                for item in raw_items {
                    if let Some(s) = item.as_str() {
                        let key = s.trim().to_lowercase();
                        // Raw values are compared post-cleanup so synonym
                        // rewrites don't count as drops.
                        let cleaned = key.replace(['-', ' '], "_");
                        if !key.is_empty()
                            && !kept.contains(&key)
                            && !kept.contains(&cleaned)
                        {
                            unknowns.push(UnknownValue {
                                field: field.to_string(),
                                value: key,
                            });
                        }
                    }
                }
            }
            (raw_value, norm_value) => {
                let raw_present = !matches!(raw_value, Value::Null)
                    && raw_value.as_str().map_or(true, |s| !s.trim().is_empty());
                let norm_missing = match norm_value {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.trim().is_empty(),
                    _ => false,
                };
                if raw_present && norm_missing {
                    let rendered = match raw_value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    unknowns.push(UnknownValue {
                        field: field.to_string(),
                        value: rendered,
                    });
                }
            }
        }
    }

    unknowns
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dropped_list_values_captured() {
        let raw_tags = json!(["health", "blockchain", "wash"]);
        let norm_tags = json!(["health", "wash"]);
        let unknowns = capture_unknowns(
            &[("mission_tags", &raw_tags)],
            &[("mission_tags", &norm_tags)],
        );
        assert_eq!(
            unknowns,
            vec![UnknownValue {
                field: "mission_tags".to_string(),
                value: "blockchain".to_string()
            }]
        );
    }

    #[test]
    fn scalar_dropped_to_null_captured() {
        let raw = json!("Wizard Level");
        let norm = json!(null);
        let unknowns = capture_unknowns(&[("level", &raw)], &[("level", &norm)]);
        assert_eq!(unknowns[0].value, "Wizard Level");
    }

    #[test]
    fn kept_values_not_captured() {
        let raw = json!("senior");
        let norm = json!("senior");
        assert!(capture_unknowns(&[("level", &raw)], &[("level", &norm)]).is_empty());
    }

    #[test]
    fn synonym_rewrites_not_counted_as_drops() {
        let raw = json!(["human-rights"]);
        let norm = json!(["human_rights"]);
        assert!(capture_unknowns(&[("tags", &raw)], &[("tags", &norm)]).is_empty());
    }
}
