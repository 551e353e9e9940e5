use std::collections::HashMap;

use chrono::NaiveDate;
use regex::Regex;

use crate::dates::{format_iso, parse_date};
use crate::field::{snippet, FieldResult, FieldSource};

/// Last-resort regex pass over the raw page text.
pub struct RegexFallback {
    date_patterns: Vec<Regex>,
    location_pattern: Regex,
    today: NaiveDate,
}

impl RegexFallback {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date_patterns: vec![
                Regex::new(
                    r"(?i)(?:deadline|closing|apply by|due date)[:\s]+(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})",
                )
                .expect("valid regex"),
                Regex::new(
                    r"(?i)\b(\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{4})\b",
                )
                .expect("valid regex"),
            ],
            location_pattern: Regex::new(
                r"(?i)(?:location|duty station)[:\s]+([A-Z][a-zA-Z]+(?:[\s,]+[A-Z][a-zA-Z]+)*)",
            )
            .expect("valid regex"),
            today,
        }
    }

    pub fn extract(&self, text: &str) -> HashMap<String, FieldResult> {
        let mut fields = HashMap::new();

        for pattern in &self.date_patterns {
            if let Some(captures) = pattern.captures(text) {
                if let Some(date) = parse_date(captures[1].trim(), true, self.today) {
                    fields.insert(
                        "deadline".to_string(),
                        FieldResult::new(
                            format_iso(date),
                            FieldSource::Regex,
                            Some(snippet(&captures[0], 100)),
                        ),
                    );
                    break;
                }
            }
        }

        if let Some(captures) = self.location_pattern.captures(text) {
            let location = captures[1].trim().to_string();
            if location.len() > 2 && location.len() < 100 {
                fields.insert(
                    "location".to_string(),
                    FieldResult::new(
                        location.as_str(),
                        FieldSource::Regex,
                        Some(snippet(&captures[0], 100)),
                    ),
                );
            }
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> RegexFallback {
        RegexFallback::new(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap())
    }

    #[test]
    fn labeled_numeric_deadline() {
        let fields = fallback().extract("Deadline: 15/09/2026. Apply online.");
        assert_eq!(fields["deadline"].value.as_text(), Some("2026-09-15"));
        assert_eq!(fields["deadline"].confidence, 0.50);
    }

    #[test]
    fn month_name_date_without_label() {
        let fields = fallback().extract("Applications close 30 Sept 2026 at midnight.");
        assert_eq!(fields["deadline"].value.as_text(), Some("2026-09-30"));
    }

    #[test]
    fn location_label() {
        let fields = fallback().extract("Duty Station: Cox's Bazar Bangladesh");
        assert!(fields.contains_key("location"));
    }

    #[test]
    fn nothing_matches_nothing_extracted() {
        let fields = fallback().extract("We are a great team.");
        assert!(fields.is_empty());
    }
}
