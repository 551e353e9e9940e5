/// Keyword tagging over raw titles and descriptions. These run before the
/// taxonomy lookups and only propose values; normalization validates them.

const LEVEL_KEYWORDS: [(&str, &[&str]); 4] = [
    ("intern", &["intern", "internship", "trainee", "graduate"]),
    ("junior", &["junior", "entry", "assistant", "associate", "coordinator"]),
    ("mid", &["specialist", "analyst", "officer"]),
    (
        "senior",
        &["senior", "lead", "principal", "manager", "chief", "head", "director"],
    ),
];

const MISSION_KEYWORDS: [(&str, &[&str]); 9] = [
    ("health", &["health", "medical", "healthcare", "clinic"]),
    ("education", &["education", "school", "learning", "training"]),
    ("wash", &["wash", "water", "sanitation", "hygiene"]),
    ("climate", &["climate", "environment", "sustainability"]),
    ("gender", &["gender", "women", "equality", "empowerment"]),
    ("protection", &["protection", "safeguarding", "child protection"]),
    ("nutrition", &["nutrition", "food security", "hunger"]),
    ("livelihoods", &["livelihood", "economic", "employment"]),
    ("shelter", &["shelter", "housing", "settlement"]),
];

/// Level from title keywords; first family match wins.
pub fn level_from_title(title: &str) -> Option<&'static str> {
    let lower = title.to_lowercase();
    LEVEL_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(level, _)| *level)
}

/// Career type from title: consultancy, fellowship, internship, else staff.
pub fn career_type_from_title(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    if lower.contains("consult") {
        "consultancy"
    } else if lower.contains("fellow") {
        "fellowship"
    } else if lower.contains("intern") {
        "internship"
    } else {
        "staff"
    }
}

/// Work modality from title keywords; onsite by default.
pub fn modality_from_title(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    if lower.contains("remote") || lower.contains("telework") || lower.contains("work from home") {
        "remote"
    } else if lower.contains("hybrid") {
        "hybrid"
    } else {
        "onsite"
    }
}

/// Mission tags from description keywords, capped at 3.
pub fn mission_tags_from_text(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    MISSION_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(tag, _)| tag.to_string())
        .take(3)
        .collect()
}

/// Remote, international, or global postings accept candidates anywhere.
pub fn international_eligible(title: &str, modality: &str) -> bool {
    let lower = title.to_lowercase();
    modality == "remote" || lower.contains("international") || lower.contains("global")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_families() {
        assert_eq!(level_from_title("Senior Programme Manager"), Some("senior"));
        assert_eq!(level_from_title("WASH Officer"), Some("mid"));
        assert_eq!(level_from_title("Graduate Trainee"), Some("intern"));
        assert_eq!(level_from_title("Driver"), None);
    }

    #[test]
    fn career_types() {
        assert_eq!(career_type_from_title("Consultant - Evaluation"), "consultancy");
        assert_eq!(career_type_from_title("Research Fellowship 2026"), "fellowship");
        assert_eq!(career_type_from_title("Communications Intern"), "internship");
        assert_eq!(career_type_from_title("Logistics Officer"), "staff");
    }

    #[test]
    fn modality_defaults_to_onsite() {
        assert_eq!(modality_from_title("Data Analyst (Remote)"), "remote");
        assert_eq!(modality_from_title("Hybrid Programme Officer"), "hybrid");
        assert_eq!(modality_from_title("Field Coordinator"), "onsite");
    }

    #[test]
    fn mission_tags_capped_at_three() {
        let tags = mission_tags_from_text(
            "health clinic, school education, water sanitation, climate, gender",
        );
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn international_eligibility() {
        assert!(international_eligible("Officer", "remote"));
        assert!(international_eligible("International Consultant", "onsite"));
        assert!(international_eligible("Global Lead", "onsite"));
        assert!(!international_eligible("Field Officer", "onsite"));
    }
}
