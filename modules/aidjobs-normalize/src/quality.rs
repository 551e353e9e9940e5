use std::collections::HashMap;

use chrono::NaiveDate;

use aidjobs_common::{JobDraft, QualityBlock};

/// Factor weights; they sum to 1.0.
const WEIGHTS: [(&str, f64); 5] = [
    ("title", 0.30),
    ("apply_url", 0.25),
    ("location", 0.15),
    ("deadline", 0.15),
    ("description", 0.15),
];

/// Locations that carry no information.
const GENERIC_LOCATIONS: [&str; 5] = ["n/a", "tbd", "to be determined", "multiple", "various"];

/// Scores a draft 0-1 with a factor breakdown, a letter grade, and a
/// needs-review flag. Best-effort; never blocks the upsert.
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, draft: &JobDraft, today: NaiveDate) -> QualityBlock {
        let mut factors = HashMap::new();
        let mut issues = Vec::new();

        let title_factor = score_title(&draft.title, &mut issues);
        factors.insert("title".to_string(), title_factor);

        let url_factor = score_apply_url(&draft.apply_url, &mut issues);
        factors.insert("apply_url".to_string(), url_factor);

        let location_factor = score_location(draft.location_raw.as_deref(), &mut issues);
        factors.insert("location".to_string(), location_factor);

        let deadline_factor = score_deadline(draft.deadline, today, &mut issues);
        factors.insert("deadline".to_string(), deadline_factor);

        let description_factor = score_description(draft.description_snippet.as_deref());
        factors.insert("description".to_string(), description_factor);

        let score: f64 = WEIGHTS
            .iter()
            .map(|(name, weight)| factors.get(*name).copied().unwrap_or(0.0) * weight)
            .sum();
        let score = (score * 100.0).round() / 100.0;

        let grade = grade_for(score);
        let needs_review = score < 0.5 || !issues.is_empty();

        QualityBlock {
            score,
            grade,
            factors,
            issues,
            needs_review,
        }
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn score_title(title: &str, issues: &mut Vec<String>) -> f64 {
    let len = title.trim().chars().count();
    if len < 3 {
        issues.push("title_too_short".to_string());
        0.0
    } else if len < 10 {
        0.6
    } else if len <= 150 {
        1.0
    } else {
        issues.push("title_too_long".to_string());
        0.5
    }
}

fn score_apply_url(url: &str, issues: &mut Vec<String>) -> f64 {
    if url.is_empty() || url.starts_with('#') || url.starts_with("javascript:") {
        issues.push("unusable_apply_url".to_string());
        return 0.0;
    }
    match url::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
            // A detail path beats a bare host.
            if parsed.path().len() > 1 {
                1.0
            } else {
                0.6
            }
        }
        _ => {
            issues.push("unparseable_apply_url".to_string());
            0.2
        }
    }
}

fn score_location(location: Option<&str>, issues: &mut Vec<String>) -> f64 {
    match location {
        None => 0.0,
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                0.0
            } else if GENERIC_LOCATIONS.contains(&trimmed.to_lowercase().as_str()) {
                issues.push("generic_location".to_string());
                0.2
            } else {
                1.0
            }
        }
    }
}

fn score_deadline(deadline: Option<NaiveDate>, today: NaiveDate, issues: &mut Vec<String>) -> f64 {
    match deadline {
        None => 0.3,
        Some(date) if date < today => {
            issues.push("deadline_in_past".to_string());
            0.2
        }
        Some(_) => 1.0,
    }
}

fn score_description(description: Option<&str>) -> f64 {
    match description.map(|d| d.trim().chars().count()).unwrap_or(0) {
        0 => 0.0,
        1..=49 => 0.4,
        50..=199 => 0.8,
        _ => 1.0,
    }
}

fn grade_for(score: f64) -> char {
    if score >= 0.9 {
        'A'
    } else if score >= 0.75 {
        'B'
    } else if score >= 0.6 {
        'C'
    } else if score >= 0.45 {
        'D'
    } else {
        'F'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    fn full_draft() -> JobDraft {
        JobDraft {
            title: "WASH Officer - Emergency Response".to_string(),
            apply_url: "https://example.org/jobs/wash-officer".to_string(),
            location_raw: Some("Nairobi, Kenya".to_string()),
            deadline: NaiveDate::from_ymd_opt(2026, 9, 15),
            description_snippet: Some("Lead WASH programming across three field offices, coordinating with partners and government counterparts on water and sanitation interventions for displaced populations.".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn complete_draft_grades_a() {
        let quality = QualityScorer::new().score(&full_draft(), today());
        assert!(quality.score >= 0.9, "score was {}", quality.score);
        assert_eq!(quality.grade, 'A');
        assert!(!quality.needs_review);
        assert!(quality.issues.is_empty());
    }

    #[test]
    fn sparse_draft_needs_review() {
        let draft = JobDraft {
            title: "Job".to_string(),
            apply_url: "#".to_string(),
            ..Default::default()
        };
        let quality = QualityScorer::new().score(&draft, today());
        assert_eq!(quality.grade, 'F');
        assert!(quality.needs_review);
        assert!(quality.issues.contains(&"unusable_apply_url".to_string()));
    }

    #[test]
    fn past_deadline_flagged() {
        let mut draft = full_draft();
        draft.deadline = NaiveDate::from_ymd_opt(2026, 1, 1);
        let quality = QualityScorer::new().score(&draft, today());
        assert!(quality.issues.contains(&"deadline_in_past".to_string()));
        assert!(quality.needs_review);
    }

    #[test]
    fn generic_location_penalized() {
        let mut draft = full_draft();
        draft.location_raw = Some("TBD".to_string());
        let quality = QualityScorer::new().score(&draft, today());
        assert!(quality.issues.contains(&"generic_location".to_string()));
    }

    #[test]
    fn score_within_unit_interval() {
        let quality = QualityScorer::new().score(&JobDraft::default(), today());
        assert!((0.0..=1.0).contains(&quality.score));
    }
}
