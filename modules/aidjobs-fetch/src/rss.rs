use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{info, warn};

use crate::http::{FetchOptions, FetchedPage, PoliteFetcher};

/// One feed entry reduced to the fields the pipeline consumes.
#[derive(Debug, Clone)]
pub struct RawFeedRecord {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
    /// Regex-extracted from the description when labeled.
    pub location_raw: Option<String>,
    /// Regex-extracted from the description when labeled.
    pub deadline_raw: Option<String>,
}

/// RSS/Atom fetcher. Feeds are treated as structured input; each entry
/// becomes one raw record.
pub struct RssFetcher {
    location_patterns: Vec<Regex>,
    deadline_patterns: Vec<Regex>,
}

impl RssFetcher {
    pub fn new() -> Self {
        let location_patterns = vec![
            Regex::new(r"[Ll]ocation[:\s]+([A-Z][a-zA-Z\s,]+(?:,\s*[A-Z][a-zA-Z\s]+)?)")
                .expect("valid regex"),
            Regex::new(r"[Dd]uty\s+[Ss]tation[:\s]+([A-Z][a-zA-Z\s,]+(?:,\s*[A-Z][a-zA-Z\s]+)?)")
                .expect("valid regex"),
        ];
        let deadline_patterns = vec![
            Regex::new(r"[Dd]eadline[:\s]+(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})").expect("valid regex"),
            Regex::new(r"[Cc]losing\s+[Dd]ate[:\s]+(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})")
                .expect("valid regex"),
            Regex::new(r"[Aa]pply\s+[Bb]y[:\s]+(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})")
                .expect("valid regex"),
        ];
        Self {
            location_patterns,
            deadline_patterns,
        }
    }

    /// Fetch a feed URL politely and parse it into raw records.
    /// Returns the page alongside so the caller can see 304/403/statuses.
    pub async fn fetch_feed(
        &self,
        fetcher: &PoliteFetcher,
        url: &str,
        options: &FetchOptions,
    ) -> (FetchedPage, Vec<RawFeedRecord>) {
        let page = fetcher.fetch(url, options).await;
        if page.status != 200 {
            return (page, Vec::new());
        }

        let records = self.parse_feed(&page.body, url);
        info!(url, entries = records.len(), "Parsed RSS feed");
        (page, records)
    }

    /// Parse feed XML into raw records. Entries without a title or link are
    /// dropped.
    pub fn parse_feed(&self, body: &str, url: &str) -> Vec<RawFeedRecord> {
        let feed = match feed_rs::parser::parse(body.as_bytes()) {
            Ok(f) => f,
            Err(e) => {
                warn!(url, error = %e, "Failed to parse feed");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for entry in feed.entries {
            let title = match entry.title {
                Some(t) if !t.content.trim().is_empty() => t.content.trim().to_string(),
                _ => continue,
            };
            let link = match entry.links.first() {
                Some(l) => l.href.clone(),
                None => continue,
            };

            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .filter(|d| !d.trim().is_empty());

            let (location_raw, deadline_raw) = match description.as_deref() {
                Some(desc) => (self.extract_location(desc), self.extract_deadline(desc)),
                None => (None, None),
            };

            records.push(RawFeedRecord {
                title,
                link,
                description,
                published: entry.published.or(entry.updated),
                location_raw,
                deadline_raw,
            });
        }
        records
    }

    fn extract_location(&self, description: &str) -> Option<String> {
        for pattern in &self.location_patterns {
            if let Some(captures) = pattern.captures(description) {
                return Some(captures[1].trim().to_string());
            }
        }
        None
    }

    fn extract_deadline(&self, description: &str) -> Option<String> {
        for pattern in &self.deadline_patterns {
            if let Some(captures) = pattern.captures(description) {
                return Some(captures[1].trim().to_string());
            }
        }
        None
    }
}

impl Default for RssFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Jobs</title>
    <item>
      <title>WASH Officer</title>
      <link>https://example.org/jobs/wash-officer</link>
      <description>Duty Station: Nairobi, Kenya. Deadline: 15/09/2026</description>
    </item>
    <item>
      <title>Programme Assistant</title>
      <link>https://example.org/jobs/programme-assistant</link>
      <description>Location: Geneva, Switzerland</description>
    </item>
    <item>
      <title></title>
      <link>https://example.org/jobs/untitled</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_entries_with_location_and_deadline() {
        let fetcher = RssFetcher::new();
        let records = fetcher.parse_feed(FEED, "https://example.org/feed");
        assert_eq!(records.len(), 2);

        let wash = &records[0];
        assert_eq!(wash.title, "WASH Officer");
        assert_eq!(wash.link, "https://example.org/jobs/wash-officer");
        assert_eq!(wash.location_raw.as_deref(), Some("Nairobi, Kenya"));
        assert_eq!(wash.deadline_raw.as_deref(), Some("15/09/2026"));

        let assistant = &records[1];
        assert_eq!(assistant.location_raw.as_deref(), Some("Geneva, Switzerland"));
        assert!(assistant.deadline_raw.is_none());
    }

    #[test]
    fn untitled_entries_dropped() {
        let fetcher = RssFetcher::new();
        let records = fetcher.parse_feed(FEED, "https://example.org/feed");
        assert!(records.iter().all(|r| !r.title.is_empty()));
    }

    #[test]
    fn invalid_xml_yields_empty() {
        let fetcher = RssFetcher::new();
        assert!(fetcher.parse_feed("not xml", "https://example.org/feed").is_empty());
    }
}
