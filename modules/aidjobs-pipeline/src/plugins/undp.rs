use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use aidjobs_common::normalize_apply_url;

use crate::plugins::{element_text, resolve_href, JobPlugin, PluginResult, RawJob};

/// UNDP listing pages repeat a "Job Title <title> Apply by <date>
/// Location <location>" pattern per table row. Link selection is scored and
/// strict per-page apply-URL uniqueness is enforced: no two jobs from one
/// page may share a normalized URL.
pub struct UndpPlugin {
    job_title_pattern: Regex,
    title_capture: Regex,
    location_capture: Regex,
    deadline_capture: Regex,
}

impl UndpPlugin {
    pub fn new() -> Self {
        Self {
            job_title_pattern: Regex::new(r"(?i)Job Title\s+").expect("valid regex"),
            title_capture: Regex::new(
                r"(?i)Job Title\s+(.+?)(?:\s+Apply by|\s+Deadline|\s+Closing date|\s+Location|\s+View|\s+Details|\s*$)",
            )
            .expect("valid regex"),
            location_capture: Regex::new(
                r"(?i)Location\s*:?\s*(.+?)(?:\s+Apply by|\s+Deadline|\s+View|\s+Details|\s*$)",
            )
            .expect("valid regex"),
            deadline_capture: Regex::new(
                r"(?i)(?:Apply by|Deadline|Closing date)\s*:?\s*(.+?)(?:\s+Location|\s+View|\s+Details|\s*$)",
            )
            .expect("valid regex"),
        }
    }

    /// Score a candidate link: reward detail-page shapes and numeric/slug
    /// identifiers, penalize listing-index paths.
    fn score_link(
        &self,
        href: &str,
        link_text: &str,
        title: &str,
        base_url: &str,
        in_title_cell: bool,
    ) -> f64 {
        let mut score = if in_title_cell { 100.0 } else { 50.0 };
        let href_lower = href.to_lowercase();
        let link_text = link_text.to_lowercase();

        let numeric_id = Regex::new(r"/\d{4,}").expect("valid regex");
        let long_slug = Regex::new(r"/[a-z0-9-]{15,}").expect("valid regex");
        let id_param = Regex::new(r"(?i)/id[=:](\d+|[a-z0-9-]+)").expect("valid regex");

        if numeric_id.is_match(&href_lower) {
            score += 50.0;
        } else if long_slug.is_match(&href_lower) {
            score += 40.0;
        } else if id_param.is_match(&href_lower) {
            score += 45.0;
        }

        const DETAIL_PATHS: [&str; 10] = [
            "/job/", "/position/", "/vacancy/", "/detail", "/view/", "/apply", "/post/",
            "/consultant/", "/opportunity/", "/consultancy/",
        ];
        if DETAIL_PATHS.iter().any(|p| href_lower.contains(p)) {
            score += 30.0;
        }

        const DETAIL_WORDS: [&str; 7] =
            ["view", "details", "read more", "apply", "see more", "full", "more info"];
        if DETAIL_WORDS.iter().any(|w| link_text.contains(w)) {
            score += 20.0;
        }

        const LISTING_PATHS: [&str; 9] = [
            "/jobs", "/careers", "/vacancies", "/opportunities", "/list", "/search",
            "/cj_view_consultancies", "/all", "/index",
        ];
        if LISTING_PATHS.iter().any(|p| href_lower.contains(p)) {
            score -= 100.0;
        }

        // Link back to the listing page itself is useless.
        if let (Ok(base), Ok(target)) = (url::Url::parse(base_url), url::Url::parse(href)) {
            if target.path().trim_end_matches('/') == base.path().trim_end_matches('/') {
                score -= 50.0;
            }
        }

        let title_prefix: String = title.to_lowercase().chars().take(20).collect();
        if !title_prefix.is_empty() && link_text.contains(&title_prefix) {
            score += 15.0;
        }

        score
    }

    fn title_is_plausible(&self, title: &str) -> bool {
        if title.len() < 5 {
            return false;
        }
        let lower = title.to_lowercase();
        let date_patterns = [
            Regex::new(r"^\d{1,2}[-/]\d{1,2}[-/]\d{2,4}$").expect("valid regex"),
            Regex::new(r"^\d{1,2}\s+[a-z]{3,9}\s+\d{2,4}$").expect("valid regex"),
            Regex::new(r"^[a-z]{3,9}\s+\d{1,2},?\s+\d{2,4}$").expect("valid regex"),
        ];
        if date_patterns.iter().any(|p| p.is_match(&lower)) {
            return false;
        }
        const MONTHS: [&str; 12] = [
            "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
        ];
        !MONTHS.contains(&lower.as_str())
    }

    fn best_link_for_row(
        &self,
        row: ElementRef<'_>,
        title: &str,
        base_url: &str,
        used_links: &HashSet<String>,
    ) -> Option<(String, String)> {
        let cell_selector = Selector::parse("td, th").expect("valid selector");
        let link_selector = Selector::parse("a[href]").expect("valid selector");

        let mut candidates: Vec<(f64, String, String)> = Vec::new();
        for cell in row.select(&cell_selector) {
            let cell_text = element_text(cell).to_lowercase();
            let in_title_cell = cell_text.contains(&title.to_lowercase())
                || self.job_title_pattern.is_match(&cell_text);

            for link in cell.select(&link_selector) {
                let href = link.value().attr("href").unwrap_or("");
                let resolved = match resolve_href(base_url, href) {
                    Some(r) => r,
                    None => continue,
                };
                let normalized = normalize_apply_url(&resolved);
                if used_links.contains(&normalized) {
                    debug!(href, "Link already claimed by another row");
                    continue;
                }
                let score =
                    self.score_link(&resolved, &element_text(link), title, base_url, in_title_cell);
                candidates.push((score, resolved, normalized));
            }
        }

        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates
            .into_iter()
            .next()
            .filter(|(score, _, _)| *score > 0.0)
            .map(|(_, resolved, normalized)| (resolved, normalized))
    }
}

impl Default for UndpPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl JobPlugin for UndpPlugin {
    fn name(&self) -> &'static str {
        "undp"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn can_handle(&self, url: &str, _html: &str, _config: Option<&str>) -> bool {
        let url_lower = url.to_lowercase();
        url_lower.contains("undp.org") || url_lower.contains("cj_view_consultancies")
    }

    fn extract(&self, html: &str, base_url: &str, _config: Option<&str>) -> PluginResult {
        let document = Html::parse_document(html);
        let row_selector = Selector::parse("table tr").expect("valid selector");

        let mut used_links: HashSet<String> = HashSet::new();
        let mut jobs: Vec<RawJob> = Vec::new();
        let mut collisions = 0usize;

        for row in document.select(&row_selector) {
            let row_text = element_text(row);
            let title = match self.title_capture.captures(&row_text) {
                Some(captures) => captures[1].trim().to_string(),
                None => continue,
            };
            if !self.title_is_plausible(&title) {
                warn!(title = %title, "Rejected implausible job title");
                continue;
            }

            let (apply_url, normalized) =
                match self.best_link_for_row(row, &title, base_url, &used_links) {
                    Some(pair) => pair,
                    None => {
                        collisions += 1;
                        continue;
                    }
                };
            used_links.insert(normalized);

            let location_raw = self
                .location_capture
                .captures(&row_text)
                .map(|c| c[1].trim().to_string())
                .filter(|s| !s.is_empty());
            let deadline_raw = self
                .deadline_capture
                .captures(&row_text)
                .map(|c| c[1].trim().to_string())
                .filter(|s| !s.is_empty());

            jobs.push(RawJob {
                title,
                apply_url,
                location_raw,
                deadline_raw,
                description_snippet: Some(row_text.chars().take(500).collect()),
                posted_on_raw: None,
                org_name: None,
            });

            if jobs.len() >= 100 {
                break;
            }
        }

        let all_unique = jobs.len() == used_links.len();
        let confidence = if !jobs.is_empty() && all_unique { 0.95 } else { 0.5 };
        let count = jobs.len();

        PluginResult {
            jobs,
            confidence,
            message: Some(if count > 0 {
                format!("Extracted {count} UNDP jobs")
            } else {
                "No jobs extracted".to_string()
            }),
            metadata: [
                (
                    "unique_urls".to_string(),
                    serde_json::Value::from(used_links.len()),
                ),
                ("collisions".to_string(), serde_json::Value::from(collisions)),
            ]
            .into_iter()
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><body><table>
        <tr>
            <td>Job Title Programme Analyst Apply by 15 Sep 2026 Location Nairobi, Kenya
                <a href="/en/jobs/12345">View details</a></td>
        </tr>
        <tr>
            <td>Job Title Data Specialist Apply by 20 Sep 2026 Location Amman, Jordan
                <a href="/en/jobs/67890">View details</a></td>
        </tr>
    </table></body></html>"#;

    #[test]
    fn extracts_one_job_per_row() {
        let plugin = UndpPlugin::new();
        let result = plugin.extract(LISTING, "https://www.undp.org/careers", None);
        assert_eq!(result.jobs.len(), 2);
        assert_eq!(result.jobs[0].title, "Programme Analyst");
        assert_eq!(result.jobs[0].location_raw.as_deref(), Some("Nairobi, Kenya"));
        assert_eq!(result.jobs[0].deadline_raw.as_deref(), Some("15 Sep 2026"));
        assert!(result.jobs[0].apply_url.ends_with("/en/jobs/12345"));
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn duplicate_urls_collapse_to_first_row() {
        let html = r#"<html><body><table>
            <tr><td>Job Title First Role <a href="/p/123">View</a></td></tr>
            <tr><td>Job Title Second Role <a href="/p/123/">View</a></td></tr>
            <tr><td>Job Title Third Role <a href="/p/123?src=rss">View</a></td></tr>
        </table></body></html>"#;
        let plugin = UndpPlugin::new();
        let result = plugin.extract(html, "https://www.undp.org/careers", None);
        assert_eq!(result.jobs.len(), 1, "all three URLs normalize identically");
        assert_eq!(result.jobs[0].title, "First Role");
        assert_eq!(
            result.metadata.get("collisions").and_then(|v| v.as_u64()),
            Some(2)
        );
    }

    #[test]
    fn listing_links_are_penalized_below_zero() {
        let plugin = UndpPlugin::new();
        // A bare listing-path link from a non-title cell scores negative.
        let score = plugin.score_link(
            "https://www.undp.org/careers",
            "all jobs",
            "Some Role",
            "https://www.undp.org/careers",
            false,
        );
        assert!(score <= 0.0, "score was {score}");
    }

    #[test]
    fn numeric_detail_links_score_high() {
        let plugin = UndpPlugin::new();
        let score = plugin.score_link(
            "https://www.undp.org/en/career/detail/12345",
            "view details",
            "Programme Analyst",
            "https://www.undp.org/careers",
            true,
        );
        assert!(score >= 150.0, "score was {score}");
    }

    #[test]
    fn date_titles_rejected() {
        let plugin = UndpPlugin::new();
        assert!(!plugin.title_is_plausible("15/09/2026"));
        assert!(!plugin.title_is_plausible("sep"));
        assert!(plugin.title_is_plausible("Programme Analyst"));
    }

    #[test]
    fn handles_only_undp_urls() {
        let plugin = UndpPlugin::new();
        assert!(plugin.can_handle("https://www.undp.org/jobs", "", None));
        assert!(plugin.can_handle("https://x.org/cj_view_consultancies", "", None));
        assert!(!plugin.can_handle("https://www.unicef.org/jobs", "", None));
    }
}
