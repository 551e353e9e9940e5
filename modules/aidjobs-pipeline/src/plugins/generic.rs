use scraper::{Html, Selector};
use tracing::debug;

use crate::plugins::{
    dedupe_by_url, element_text, job_from_container, resolve_href, JobPlugin, PluginResult, RawJob,
};

/// Class-heuristic selectors for job listing containers.
const JOB_SELECTORS: [&str; 12] = [
    ".job-listing",
    ".job-item",
    ".career-item",
    ".position",
    "article.job",
    "div.vacancy",
    "tr.job-row",
    "li.job",
    "[class*=\"job\"]",
    "[class*=\"vacancy\"]",
    "ul.jobs li",
    "[role=\"article\"]",
];

/// Link-text/href keywords suggesting a job detail link.
const LINK_KEYWORDS: [&str; 10] = [
    "position",
    "job",
    "vacancy",
    "career",
    "opening",
    "opportunity",
    "recruitment",
    "hiring",
    "apply",
    "posting",
];

/// Navigation anchors that are never job links.
const NAV_STOPWORDS: [&str; 12] = [
    "home",
    "about",
    "contact",
    "login",
    "sign in",
    "register",
    "privacy",
    "terms",
    "donate",
    "news",
    "search",
    "back to",
];

/// Header cell names used to map table columns.
const HEADER_KEYWORDS: [(&str, &str); 6] = [
    ("title", "title"),
    ("position", "title"),
    ("job", "title"),
    ("location", "location"),
    ("duty station", "location"),
    ("deadline", "deadline"),
];

/// Fallback plugin, priority 10. Strategies in order: configured CSS
/// selector, header-mapped tables, class-heuristic containers, substantial
/// links in the main content, microdata.
pub struct GenericPlugin;

impl GenericPlugin {
    pub fn new() -> Self {
        Self
    }

    fn extract_with_hint(&self, document: &Html, base_url: &str, hint: &str) -> Vec<RawJob> {
        let selector = match Selector::parse(hint) {
            Ok(s) => s,
            Err(_) => {
                debug!(hint, "Unparseable parser hint selector");
                return Vec::new();
            }
        };
        document
            .select(&selector)
            .filter_map(|el| job_from_container(el, base_url))
            .collect()
    }

    /// Tables whose header row names job columns; each body row is one job.
    fn extract_from_tables(&self, document: &Html, base_url: &str) -> Vec<RawJob> {
        let table_selector = Selector::parse("table").expect("valid selector");
        let row_selector = Selector::parse("tr").expect("valid selector");
        let cell_selector = Selector::parse("th, td").expect("valid selector");
        let link_selector = Selector::parse("a[href]").expect("valid selector");

        let mut jobs = Vec::new();
        for table in document.select(&table_selector) {
            let mut rows = table.select(&row_selector);
            let header = match rows.next() {
                Some(h) => h,
                None => continue,
            };

            // Map column index -> field from the header text.
            let mut columns: Vec<Option<&str>> = Vec::new();
            let mut mapped = 0;
            for cell in header.select(&cell_selector) {
                let text = element_text(cell).to_lowercase();
                let field = HEADER_KEYWORDS
                    .iter()
                    .find(|(kw, _)| text.contains(kw))
                    .map(|(_, field)| *field);
                if field.is_some() {
                    mapped += 1;
                }
                columns.push(field);
            }
            if mapped < 2 {
                continue;
            }

            for row in rows {
                let cells: Vec<_> = row.select(&cell_selector).collect();
                if cells.is_empty() {
                    continue;
                }
                let mut job = RawJob::default();
                for (idx, cell) in cells.iter().enumerate() {
                    match columns.get(idx).copied().flatten() {
                        Some("title") => job.title = element_text(*cell),
                        Some("location") => {
                            let text = element_text(*cell);
                            if !text.is_empty() {
                                job.location_raw = Some(text);
                            }
                        }
                        Some("deadline") => {
                            let text = element_text(*cell);
                            if !text.is_empty() {
                                job.deadline_raw = Some(text);
                            }
                        }
                        _ => {}
                    }
                }
                if job.title.len() < 3 {
                    continue;
                }
                job.apply_url = row
                    .select(&link_selector)
                    .filter_map(|a| a.value().attr("href"))
                    .find_map(|href| resolve_href(base_url, href))
                    .unwrap_or_else(|| base_url.to_string());
                job.description_snippet = Some(element_text(row).chars().take(500).collect());
                jobs.push(job);
            }

            if !jobs.is_empty() {
                break;
            }
        }
        jobs
    }

    fn extract_from_containers(&self, document: &Html, base_url: &str) -> Vec<RawJob> {
        for raw in JOB_SELECTORS {
            let selector = match Selector::parse(raw) {
                Ok(s) => s,
                Err(_) => continue,
            };
            let jobs: Vec<RawJob> = document
                .select(&selector)
                .filter_map(|el| job_from_container(el, base_url))
                .filter(|j| j.title.len() >= 3)
                .take(50)
                .collect();
            if !jobs.is_empty() {
                debug!(selector = raw, count = jobs.len(), "Containers matched");
                return jobs;
            }
        }
        Vec::new()
    }

    /// Substantial links in the content area: text of at least 10 chars,
    /// job keyword in text or href, not in the navigation stopword set.
    fn extract_from_links(&self, document: &Html, base_url: &str) -> Vec<RawJob> {
        let link_selector = Selector::parse("a[href]").expect("valid selector");
        let mut jobs = Vec::new();

        for link in document.select(&link_selector) {
            let text = element_text(link);
            if text.len() < 10 {
                continue;
            }
            let text_lower = text.to_lowercase();
            if NAV_STOPWORDS.iter().any(|s| text_lower.starts_with(s)) {
                continue;
            }
            let href = link.value().attr("href").unwrap_or("");
            let href_lower = href.to_lowercase();
            let keyword_hit = LINK_KEYWORDS
                .iter()
                .any(|kw| text_lower.contains(kw) || href_lower.contains(&format!("/{kw}")));
            if !keyword_hit {
                continue;
            }
            let apply_url = match resolve_href(base_url, href) {
                Some(u) => u,
                None => continue,
            };
            jobs.push(RawJob {
                title: text,
                apply_url,
                ..Default::default()
            });
            if jobs.len() >= 50 {
                break;
            }
        }
        jobs
    }

    fn extract_from_microdata(&self, document: &Html, base_url: &str) -> Vec<RawJob> {
        let selector = Selector::parse(r#"[itemtype*="JobPosting"]"#).expect("valid selector");
        document
            .select(&selector)
            .filter_map(|el| job_from_container(el, base_url))
            .take(50)
            .collect()
    }
}

impl Default for GenericPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl JobPlugin for GenericPlugin {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn can_handle(&self, _url: &str, _html: &str, _config: Option<&str>) -> bool {
        true
    }

    fn extract(&self, html: &str, base_url: &str, config: Option<&str>) -> PluginResult {
        let document = Html::parse_document(html);

        let strategies: [(&str, Vec<RawJob>); 5] = [
            (
                "hint",
                config
                    .map(|hint| self.extract_with_hint(&document, base_url, hint))
                    .unwrap_or_default(),
            ),
            ("tables", self.extract_from_tables(&document, base_url)),
            ("containers", self.extract_from_containers(&document, base_url)),
            ("links", self.extract_from_links(&document, base_url)),
            ("microdata", self.extract_from_microdata(&document, base_url)),
        ];

        for (strategy, jobs) in strategies {
            if !jobs.is_empty() {
                let jobs = dedupe_by_url(jobs);
                let count = jobs.len();
                return PluginResult {
                    jobs,
                    confidence: 0.6,
                    message: Some(format!("generic/{strategy} extracted {count} jobs")),
                    metadata: [(
                        "strategy".to_string(),
                        serde_json::Value::String(strategy.to_string()),
                    )]
                    .into_iter()
                    .collect(),
                };
            }
        }

        PluginResult::empty("No jobs found by generic strategies")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_mapped_table() {
        let html = r#"<html><body><table>
            <tr><th>Job Title</th><th>Location</th><th>Deadline</th></tr>
            <tr><td><a href="/p/1">WASH Officer</a></td><td>Nairobi</td><td>2026-09-15</td></tr>
            <tr><td><a href="/p/2">Nutrition Specialist</a></td><td>Juba</td><td>2026-10-01</td></tr>
        </table></body></html>"#;

        let result = GenericPlugin::new().extract(html, "https://example.org/careers", None);
        assert_eq!(result.jobs.len(), 2);
        assert_eq!(result.jobs[0].title, "WASH Officer");
        assert_eq!(result.jobs[0].apply_url, "https://example.org/p/1");
        assert_eq!(result.jobs[0].location_raw.as_deref(), Some("Nairobi"));
        assert_eq!(result.jobs[0].deadline_raw.as_deref(), Some("2026-09-15"));
    }

    #[test]
    fn parser_hint_takes_precedence() {
        let html = r#"<html><body>
            <div class="opening"><h3>Field Coordinator</h3><a href="/jobs/7">View</a></div>
            <table><tr><th>Job Title</th><th>Location</th></tr>
            <tr><td>Other Job</td><td>Paris</td></tr></table>
        </body></html>"#;

        let result =
            GenericPlugin::new().extract(html, "https://example.org/careers", Some("div.opening"));
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].title, "Field Coordinator");
    }

    #[test]
    fn link_heuristics_skip_navigation() {
        let html = r#"<html><body>
            <a href="/about">About our organization</a>
            <a href="/jobs/wash-officer-nairobi">WASH Officer - Nairobi (P3)</a>
            <a href="/jobs/a">Go</a>
        </body></html>"#;

        let result = GenericPlugin::new().extract(html, "https://example.org/", None);
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].title, "WASH Officer - Nairobi (P3)");
    }

    #[test]
    fn microdata_fallback() {
        let html = r#"<html><body>
            <div itemscope itemtype="https://schema.org/JobPosting">
                <h2>Protection Officer</h2>
                <a href="/apply/55">Apply</a>
            </div>
        </body></html>"#;

        let result = GenericPlugin::new().extract(html, "https://example.org/", None);
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].title, "Protection Officer");
        assert_eq!(result.jobs[0].apply_url, "https://example.org/apply/55");
    }

    #[test]
    fn empty_page_yields_empty_result() {
        let result = GenericPlugin::new().extract("<html><body></body></html>", "https://example.org/", None);
        assert!(!result.is_success());
        assert_eq!(result.confidence, 0.0);
    }
}
