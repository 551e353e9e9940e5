use std::collections::HashMap;

use scraper::{Html, Selector};

use crate::field::{snippet, FieldResult, FieldSource};

/// Extract page-level fields from OpenGraph/meta tags and `<title>`.
pub struct MetaExtractor;

impl MetaExtractor {
    pub fn extract(document: &Html) -> HashMap<String, FieldResult> {
        let mut fields = HashMap::new();

        if let Some(title) = first_content(
            document,
            &[r#"meta[property="og:title"]"#, r#"meta[name="title"]"#],
        )
        .or_else(|| element_text(document, "title"))
        {
            let title = title.trim().to_string();
            if !title.is_empty() {
                fields.insert(
                    "title".to_string(),
                    FieldResult::new(title.as_str(), FieldSource::Meta, Some(snippet(&title, 200))),
                );
            }
        }

        if let Some(description) = first_content(
            document,
            &[
                r#"meta[property="og:description"]"#,
                r#"meta[name="description"]"#,
            ],
        ) {
            let description = description.trim().to_string();
            if !description.is_empty() {
                fields.insert(
                    "description".to_string(),
                    FieldResult::new(
                        description.as_str(),
                        FieldSource::Meta,
                        Some(snippet(&description, 500)),
                    ),
                );
            }
        }

        fields
    }
}

fn first_content(document: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let selector = Selector::parse(raw).ok()?;
        if let Some(el) = document.select(&selector).next() {
            if let Some(content) = el.value().attr("content") {
                if !content.trim().is_empty() {
                    return Some(content.to_string());
                }
            }
        }
    }
    None
}

fn element_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .filter(|t| !t.trim().is_empty())
}
