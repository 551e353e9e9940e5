use tracing::warn;

use aidjobs_common::EnrichmentBlock;

use crate::canonical::{
    is_meal_role, is_operational_role, CANONICAL_EXPERIENCE_LEVELS, CANONICAL_FUNCTIONAL_ROLES,
    CANONICAL_IMPACT_DOMAINS,
};

/// Per-item SDG confidence floor.
const SDG_CONFIDENCE_FLOOR: f64 = 0.60;
/// Most SDGs a job may keep.
const SDG_CAP: usize = 2;
/// Top SDG confidence a MEAL role must reach to keep any SDGs.
const MEAL_SDG_THRESHOLD: f64 = 0.85;
/// Impact domains below this are dropped.
const IMPACT_CONFIDENCE_FLOOR: f64 = 0.65;
/// Experience levels below this are cleared.
const EXPERIENCE_CONFIDENCE_FLOOR: f64 = 0.70;
/// Overall confidence floor.
const OVERALL_CONFIDENCE_FLOOR: f64 = 0.65;

/// Strip values outside the canonical sets and null confidences outside
/// [0, 1]. Runs before the rules so they only see sane data.
pub fn validate_enrichment(enrichment: &mut EnrichmentBlock) {
    enrichment.impact_domain.retain(|domain| {
        let keep = CANONICAL_IMPACT_DOMAINS.contains(&domain.as_str());
        if !keep {
            warn!(domain = %domain, "Dropping non-canonical impact domain");
        }
        keep
    });
    enrichment
        .impact_confidences
        .retain(|_, confidence| (0.0..=1.0).contains(confidence));

    enrichment.functional_role.retain(|role| {
        let keep = CANONICAL_FUNCTIONAL_ROLES.contains(&role.as_str());
        if !keep {
            warn!(role = %role, "Dropping non-canonical functional role");
        }
        keep
    });
    enrichment
        .functional_confidences
        .retain(|_, confidence| (0.0..=1.0).contains(confidence));

    if let Some(ref level) = enrichment.experience_level {
        if !CANONICAL_EXPERIENCE_LEVELS.contains(&level.as_str()) {
            warn!(level = %level, "Dropping non-canonical experience level");
            enrichment.experience_level = None;
            enrichment.experience_confidence = None;
            enrichment.estimated_experience_years.clear();
        }
    }

    if let Some(confidence) = enrichment.experience_confidence {
        if !(0.0..=1.0).contains(&confidence) {
            enrichment.experience_confidence = None;
        }
    }
    if let Some(confidence) = enrichment.confidence_overall {
        if !(0.0..=1.0).contains(&confidence) {
            enrichment.confidence_overall = None;
        }
    }

    enrichment.sdgs.retain(|sdg| (1..=17).contains(sdg));
    enrichment
        .sdg_confidences
        .retain(|_, confidence| (0.0..=1.0).contains(confidence));
}

/// Deterministic editorial rules applied after every enrichment call.
/// The pipeline is idempotent: applying it to an already-applied block
/// yields the same block.
pub fn apply_enrichment_rules(enrichment: &mut EnrichmentBlock) {
    let mut low_confidence = false;
    let mut reasons: Vec<String> = Vec::new();

    let is_operational = enrichment
        .functional_role
        .iter()
        .any(|role| is_operational_role(role));
    let is_meal = enrichment.functional_role.iter().any(|role| is_meal_role(role));

    // Rule 1: operational/support roles carry no SDG labels.
    if is_operational {
        enrichment.sdgs.clear();
        enrichment.sdg_confidences.clear();
        enrichment.sdg_explanation = None;
        low_confidence = true;
        reasons.push("operational/support role".to_string());
    }

    // Rule 2: per-item SDG confidence floor.
    if !is_operational && !enrichment.sdgs.is_empty() {
        let confidences = enrichment.sdg_confidences.clone();
        enrichment.sdgs.retain(|sdg| {
            confidences
                .get(&sdg.to_string())
                .is_some_and(|c| *c >= SDG_CONFIDENCE_FLOOR)
        });
        let kept: Vec<String> = enrichment.sdgs.iter().map(|s| s.to_string()).collect();
        enrichment.sdg_confidences.retain(|key, _| kept.contains(key));
    }

    // Rule 3: keep at most the 2 highest-confidence SDGs.
    if !is_operational && enrichment.sdgs.len() > SDG_CAP {
        let mut scored: Vec<(u8, f64)> = enrichment
            .sdgs
            .iter()
            .map(|sdg| {
                (
                    *sdg,
                    enrichment
                        .sdg_confidences
                        .get(&sdg.to_string())
                        .copied()
                        .unwrap_or(0.0),
                )
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(SDG_CAP);
        enrichment.sdgs = scored.iter().map(|(sdg, _)| *sdg).collect();
        let kept: Vec<String> = enrichment.sdgs.iter().map(|s| s.to_string()).collect();
        enrichment.sdg_confidences.retain(|key, _| kept.contains(key));
    }

    // Rule 4: MEAL roles require a very confident top SDG.
    if is_meal && !enrichment.sdgs.is_empty() {
        let top = enrichment
            .sdg_confidences
            .values()
            .cloned()
            .fold(0.0_f64, f64::max);
        if top < MEAL_SDG_THRESHOLD {
            enrichment.sdgs.clear();
            enrichment.sdg_confidences.clear();
            enrichment.sdg_explanation = None;
            low_confidence = true;
            reasons.push(format!(
                "MEAL role requires SDG confidence >= {MEAL_SDG_THRESHOLD:.2}"
            ));
        }
    }

    // Rule 5: impact-domain confidence floor.
    if !enrichment.impact_domain.is_empty() {
        let confidences = enrichment.impact_confidences.clone();
        enrichment.impact_domain.retain(|domain| {
            let confidence = confidences.get(domain).copied().unwrap_or(0.0);
            if confidence < IMPACT_CONFIDENCE_FLOOR {
                warn!(
                    domain = %domain,
                    confidence,
                    "Rejecting impact domain below confidence floor"
                );
                false
            } else {
                true
            }
        });
        let kept = enrichment.impact_domain.clone();
        enrichment.impact_confidences.retain(|key, _| kept.contains(key));

        if enrichment.impact_domain.is_empty() {
            low_confidence = true;
            reasons.push(format!(
                "all impact_domains below confidence threshold ({IMPACT_CONFIDENCE_FLOOR:.2})"
            ));
        }
    }

    // Rule 6: experience confidence floor.
    if enrichment.experience_level.is_some() {
        let confidence = enrichment.experience_confidence.unwrap_or(0.0);
        if confidence < EXPERIENCE_CONFIDENCE_FLOOR {
            warn!(confidence, "Clearing experience level below confidence floor");
            enrichment.experience_level = None;
            enrichment.experience_confidence = None;
            enrichment.estimated_experience_years.clear();
            low_confidence = true;
            reasons.push(format!(
                "experience_level confidence {confidence:.2} < {EXPERIENCE_CONFIDENCE_FLOOR:.2}"
            ));
        }
    }

    // Rule 7: overall confidence floor.
    let overall = enrichment.confidence_overall.unwrap_or(0.0);
    if overall < OVERALL_CONFIDENCE_FLOOR {
        low_confidence = true;
        reasons.push(format!(
            "overall confidence {overall:.2} < {OVERALL_CONFIDENCE_FLOOR:.2}"
        ));
    }

    enrichment.low_confidence = low_confidence;
    enrichment.low_confidence_reason = if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn block() -> EnrichmentBlock {
        EnrichmentBlock {
            confidence_overall: Some(0.9),
            ..Default::default()
        }
    }

    fn confidences(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn operational_role_suppresses_sdgs() {
        let mut e = block();
        e.functional_role = vec!["Finance, Accounting & Audit".to_string()];
        e.sdgs = vec![4, 5];
        e.sdg_confidences = confidences(&[("4", 0.9), ("5", 0.8)]);
        e.sdg_explanation = Some("education focus".to_string());

        apply_enrichment_rules(&mut e);

        assert!(e.sdgs.is_empty());
        assert!(e.sdg_confidences.is_empty());
        assert!(e.sdg_explanation.is_none());
        assert!(e.low_confidence);
        assert!(e
            .low_confidence_reason
            .as_deref()
            .unwrap()
            .contains("operational/support role"));
    }

    #[test]
    fn sdg_floor_removes_weak_items() {
        let mut e = block();
        e.functional_role = vec!["Program & Field Implementation".to_string()];
        e.sdgs = vec![3, 6];
        e.sdg_confidences = confidences(&[("3", 0.55), ("6", 0.80)]);

        apply_enrichment_rules(&mut e);

        assert_eq!(e.sdgs, vec![6]);
        assert!(e.sdg_confidences.contains_key("6"));
        assert!(!e.sdg_confidences.contains_key("3"));
    }

    #[test]
    fn sdg_cap_and_meal_threshold_scenario() {
        // MEAL role with sdgs [4, 5, 13] at {0.82, 0.70, 0.91}:
        // floor passes all, cap keeps {13, 4}, MEAL gate passes (0.91).
        let mut e = block();
        e.functional_role = vec!["MEAL / Research / Evidence".to_string()];
        e.sdgs = vec![4, 5, 13];
        e.sdg_confidences = confidences(&[("4", 0.82), ("5", 0.70), ("13", 0.91)]);

        apply_enrichment_rules(&mut e);

        assert_eq!(e.sdgs, vec![13, 4]);
        assert_eq!(e.sdg_confidences.len(), 2);
        assert!(!e.low_confidence);
    }

    #[test]
    fn meal_role_clears_sdgs_below_threshold() {
        let mut e = block();
        e.functional_role = vec!["Data & GIS".to_string()];
        e.sdgs = vec![9];
        e.sdg_confidences = confidences(&[("9", 0.80)]);

        apply_enrichment_rules(&mut e);

        assert!(e.sdgs.is_empty());
        assert!(e.low_confidence);
        assert!(e
            .low_confidence_reason
            .as_deref()
            .unwrap()
            .contains("MEAL role"));
    }

    #[test]
    fn impact_floor_flags_when_all_dropped() {
        let mut e = block();
        e.impact_domain = vec![
            "Climate & Environment".to_string(),
            "Education in Emergencies".to_string(),
        ];
        e.impact_confidences =
            confidences(&[("Climate & Environment", 0.5), ("Education in Emergencies", 0.6)]);

        apply_enrichment_rules(&mut e);

        assert!(e.impact_domain.is_empty());
        assert!(e.low_confidence);
        assert!(e
            .low_confidence_reason
            .as_deref()
            .unwrap()
            .contains("impact_domains"));
    }

    #[test]
    fn experience_floor_clears_level() {
        let mut e = block();
        e.experience_level = Some("Specialist / Advisor".to_string());
        e.experience_confidence = Some(0.6);
        e.estimated_experience_years
            .insert("min".to_string(), serde_json::json!(5));

        apply_enrichment_rules(&mut e);

        assert!(e.experience_level.is_none());
        assert!(e.experience_confidence.is_none());
        assert!(e.estimated_experience_years.is_empty());
        assert!(e.low_confidence);
    }

    #[test]
    fn overall_floor_sets_reason() {
        let mut e = block();
        e.confidence_overall = Some(0.5);

        apply_enrichment_rules(&mut e);

        assert!(e.low_confidence);
        assert!(e
            .low_confidence_reason
            .as_deref()
            .unwrap()
            .contains("overall confidence 0.50 < 0.65"));
    }

    #[test]
    fn rules_are_idempotent() {
        let mut e = block();
        e.functional_role = vec!["MEAL / Research / Evidence".to_string()];
        e.sdgs = vec![4, 5, 13];
        e.sdg_confidences = confidences(&[("4", 0.82), ("5", 0.70), ("13", 0.91)]);
        e.impact_domain = vec!["Climate & Environment".to_string()];
        e.impact_confidences = confidences(&[("Climate & Environment", 0.7)]);
        e.experience_level = Some("Specialist / Advisor".to_string());
        e.experience_confidence = Some(0.8);

        apply_enrichment_rules(&mut e);
        let once = e.clone();
        apply_enrichment_rules(&mut e);

        assert_eq!(e, once);
    }

    #[test]
    fn validation_strips_non_canonical_values() {
        let mut e = block();
        e.impact_domain = vec![
            "Climate & Environment".to_string(),
            "Blockchain for Good".to_string(),
        ];
        e.functional_role = vec!["Project Management".to_string(), "Ninja".to_string()];
        e.experience_level = Some("Apprentice".to_string());
        e.confidence_overall = Some(1.4);
        e.sdgs = vec![0, 5, 18];
        e.sdg_confidences = confidences(&[("5", 1.2)]);

        validate_enrichment(&mut e);

        assert_eq!(e.impact_domain, vec!["Climate & Environment"]);
        assert_eq!(e.functional_role, vec!["Project Management"]);
        assert!(e.experience_level.is_none());
        assert!(e.confidence_overall.is_none());
        assert_eq!(e.sdgs, vec![5]);
        assert!(e.sdg_confidences.is_empty());
    }

    #[test]
    fn post_rule_invariants_hold() {
        // For arbitrary-ish inputs: |sdgs| <= 2 and every kept SDG has
        // confidence >= 0.60 (or the set is empty).
        let mut e = block();
        e.functional_role = vec!["Program & Field Implementation".to_string()];
        e.sdgs = vec![1, 2, 3, 4, 5];
        e.sdg_confidences =
            confidences(&[("1", 0.61), ("2", 0.95), ("3", 0.10), ("4", 0.75), ("5", 0.62)]);

        apply_enrichment_rules(&mut e);

        assert!(e.sdgs.len() <= 2);
        for sdg in &e.sdgs {
            assert!(e.sdg_confidences[&sdg.to_string()] >= SDG_CONFIDENCE_FLOOR);
        }
        assert_eq!(e.sdgs, vec![2, 4]);
    }
}
