use std::collections::HashMap;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::dates::{format_iso, parse_date};
use crate::field::{snippet, FieldResult, FieldSource};

/// Label-based extractor: find `<dt|th|label|span>` elements whose text
/// matches a known label and read the adjacent sibling's text; fall back to
/// regex over the page text.
pub struct HeuristicExtractor {
    location_labels: Regex,
    deadline_labels: Regex,
    posted_labels: Regex,
    location_fallback: Vec<Regex>,
    today: NaiveDate,
}

impl HeuristicExtractor {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            location_labels: Regex::new(r"(?i)\b(?:location|duty station)\b").expect("valid regex"),
            deadline_labels: Regex::new(
                r"(?i)\b(?:deadline|closing date|apply by|application deadline|due date)\b",
            )
            .expect("valid regex"),
            posted_labels: Regex::new(r"(?i)\b(?:posted(?:\s+on)?|published|date posted)\b")
                .expect("valid regex"),
            location_fallback: vec![
                Regex::new(
                    r"(?i)(?:location|duty station|based in|work location)[:\s]+([A-Z][a-zA-Z\s,]+(?:,\s*[A-Z][a-zA-Z\s]+)?)",
                )
                .expect("valid regex"),
            ],
            today,
        }
    }

    pub fn extract(&self, document: &Html, text: &str) -> HashMap<String, FieldResult> {
        let mut fields = HashMap::new();

        if let Some(location) = self.extract_location(document, text) {
            fields.insert("location".to_string(), location);
        }
        if let Some(deadline) = self.extract_date(document, text, &self.deadline_labels, true) {
            fields.insert("deadline".to_string(), deadline);
        }
        if let Some(posted) = self.extract_date(document, text, &self.posted_labels, false) {
            fields.insert("posted_on".to_string(), posted);
        }
        if let Some(requirements) = self.extract_requirements(document) {
            fields.insert("requirements".to_string(), requirements);
        }

        fields
    }

    fn extract_location(&self, document: &Html, text: &str) -> Option<FieldResult> {
        if let Some((label, value)) = labeled_value(document, &self.location_labels) {
            if value.len() > 2 {
                return Some(FieldResult::new(
                    value.as_str(),
                    FieldSource::Heuristic,
                    Some(snippet(&format!("{label}: {value}"), 200)),
                ));
            }
        }

        for pattern in &self.location_fallback {
            if let Some(captures) = pattern.captures(text) {
                let location = captures[1].trim().to_string();
                if location.len() > 2 && location.len() < 100 {
                    return Some(FieldResult::new(
                        location.as_str(),
                        FieldSource::Heuristic,
                        Some(snippet(&captures[0], 200)),
                    ));
                }
            }
        }
        None
    }

    fn extract_date(
        &self,
        document: &Html,
        text: &str,
        labels: &Regex,
        prefer_future: bool,
    ) -> Option<FieldResult> {
        if let Some((label, value)) = labeled_value(document, labels) {
            if let Some(date) = parse_date(&value, prefer_future, self.today) {
                return Some(FieldResult::new(
                    format_iso(date),
                    FieldSource::Heuristic,
                    Some(snippet(&format!("{label}: {value}"), 200)),
                ));
            }
        }

        // Regex over the whole text: label followed by a date-ish token.
        let pattern = Regex::new(&format!(
            r"(?i){}[:\s]+([0-9]{{1,2}}[-/. ][0-9]{{1,2}}[-/. ][0-9]{{2,4}}|[0-9]{{1,2}}\s+[A-Za-z]{{3,9}},?\s+[0-9]{{4}}|[A-Za-z]{{3,9}}\s+[0-9]{{1,2}},?\s+[0-9]{{4}}|[0-9]{{4}}-[0-9]{{2}}-[0-9]{{2}})",
            labels.as_str()
        ))
        .ok()?;
        let captures = pattern.captures(text)?;
        let date = parse_date(captures[1].trim(), prefer_future, self.today)?;
        Some(FieldResult::new(
            format_iso(date),
            FieldSource::Heuristic,
            Some(snippet(&captures[0], 200)),
        ))
    }

    fn extract_requirements(&self, document: &Html) -> Option<FieldResult> {
        let heading_selector = Selector::parse("h2, h3, h4").expect("valid selector");
        let heading_pattern =
            Regex::new(r"(?i)requirement|qualification|skill").expect("valid regex");

        for heading in document.select(&heading_selector) {
            let heading_text = heading.text().collect::<String>();
            if !heading_pattern.is_match(&heading_text) {
                continue;
            }
            // Walk following siblings until the next heading; collect the
            // first list's items.
            let mut sibling = next_element(heading);
            while let Some(el) = sibling {
                let name = el.value().name();
                if matches!(name, "h1" | "h2" | "h3" | "h4") {
                    break;
                }
                if matches!(name, "ul" | "ol") {
                    let item_selector = Selector::parse("li").expect("valid selector");
                    let items: Vec<String> = el
                        .select(&item_selector)
                        .map(|li| li.text().collect::<String>().trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect();
                    if !items.is_empty() {
                        let preview = items
                            .iter()
                            .take(5)
                            .cloned()
                            .collect::<Vec<_>>()
                            .join("\n");
                        return Some(FieldResult::new(
                            crate::field::FieldValue::List(items),
                            FieldSource::Heuristic,
                            Some(snippet(&preview, 500)),
                        ));
                    }
                }
                sibling = next_element(el);
            }
        }
        None
    }
}

/// Find the first `<dt|th|label|span>` matching the label pattern and return
/// (label text, adjacent sibling text).
fn labeled_value(document: &Html, labels: &Regex) -> Option<(String, String)> {
    let selector = Selector::parse("dt, th, label, span").expect("valid selector");
    for el in document.select(&selector) {
        let label_text = el.text().collect::<String>();
        let trimmed = label_text.trim();
        // Labels are short; long spans matching the word are prose, not labels.
        if trimmed.len() > 40 || !labels.is_match(trimmed) {
            continue;
        }
        if let Some(value_el) = next_element(el) {
            let name = value_el.value().name();
            if matches!(name, "dd" | "td" | "div" | "span") {
                let value = value_el.text().collect::<String>().trim().to_string();
                if !value.is_empty() {
                    return Some((trimmed.to_string(), value));
                }
            }
        }
    }
    None
}

fn next_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}
