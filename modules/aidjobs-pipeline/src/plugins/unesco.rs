use scraper::{Html, Selector};

use crate::plugins::{
    dedupe_by_url, element_text, resolve_href, JobPlugin, PluginResult, RawJob,
};

/// UNESCO career pages are table-driven with a header row naming the title,
/// duty station, and closing date columns.
pub struct UnescoPlugin;

impl UnescoPlugin {
    pub fn new() -> Self {
        Self
    }

    fn is_header_row(cells: &[String], th_count: usize, td_count: usize) -> bool {
        const HEADER_KEYWORDS: [&str; 6] =
            ["title", "post", "duty station", "location", "closing", "deadline"];
        let joined = cells.join(" ").to_lowercase();
        let keyword_hits = HEADER_KEYWORDS.iter().filter(|k| joined.contains(*k)).count();
        keyword_hits >= 2 || th_count > td_count
    }
}

impl Default for UnescoPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl JobPlugin for UnescoPlugin {
    fn name(&self) -> &'static str {
        "unesco"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn can_handle(&self, url: &str, _html: &str, _config: Option<&str>) -> bool {
        url.to_lowercase().contains("unesco.org")
    }

    fn extract(&self, html: &str, base_url: &str, _config: Option<&str>) -> PluginResult {
        let document = Html::parse_document(html);
        let table_selector = Selector::parse("table").expect("valid selector");
        let row_selector = Selector::parse("tr").expect("valid selector");
        let cell_selector = Selector::parse("td, th").expect("valid selector");
        let th_selector = Selector::parse("th").expect("valid selector");
        let td_selector = Selector::parse("td").expect("valid selector");
        let link_selector = Selector::parse("a[href]").expect("valid selector");

        let mut jobs: Vec<RawJob> = Vec::new();

        for table in document.select(&table_selector) {
            // Locate the header row and derive the column map.
            let mut title_col = None;
            let mut location_col = None;
            let mut deadline_col = None;
            let mut header_seen = false;

            for row in table.select(&row_selector) {
                let cells: Vec<String> =
                    row.select(&cell_selector).map(element_text).collect();
                if cells.is_empty() {
                    continue;
                }

                if !header_seen {
                    let th_count = row.select(&th_selector).count();
                    let td_count = row.select(&td_selector).count();
                    if Self::is_header_row(&cells, th_count, td_count) {
                        for (idx, cell) in cells.iter().enumerate() {
                            let lower = cell.to_lowercase();
                            if title_col.is_none()
                                && (lower.contains("title") || lower.contains("post"))
                            {
                                title_col = Some(idx);
                            } else if location_col.is_none()
                                && (lower.contains("duty station") || lower.contains("location"))
                            {
                                location_col = Some(idx);
                            } else if deadline_col.is_none()
                                && (lower.contains("closing") || lower.contains("deadline"))
                            {
                                deadline_col = Some(idx);
                            }
                        }
                        header_seen = true;
                        continue;
                    }
                }

                let title_idx = match title_col {
                    Some(i) => i,
                    None => continue,
                };
                let title = match cells.get(title_idx) {
                    Some(t) if t.len() >= 5 => t.clone(),
                    _ => continue,
                };

                let apply_url = row
                    .select(&link_selector)
                    .filter_map(|a| a.value().attr("href"))
                    .find_map(|href| resolve_href(base_url, href))
                    .unwrap_or_else(|| base_url.to_string());

                jobs.push(RawJob {
                    title,
                    apply_url,
                    location_raw: location_col.and_then(|i| cells.get(i)).cloned(),
                    deadline_raw: deadline_col.and_then(|i| cells.get(i)).cloned(),
                    description_snippet: Some(cells.join(" | ").chars().take(500).collect()),
                    posted_on_raw: None,
                    org_name: Some("UNESCO".to_string()),
                });
            }

            if !jobs.is_empty() {
                break;
            }
        }

        let jobs = dedupe_by_url(jobs);
        let count = jobs.len();
        PluginResult {
            confidence: if count > 0 { 0.85 } else { 0.0 },
            message: Some(format!("Extracted {count} UNESCO jobs")),
            metadata: Default::default(),
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_mapped_rows() {
        let html = r#"<html><body><table>
            <tr><th>Post Title</th><th>Duty Station</th><th>Closing Date</th></tr>
            <tr><td><a href="/jobs/1234">Education Specialist</a></td><td>Paris, France</td><td>2026-09-30</td></tr>
            <tr><td><a href="/jobs/1235">Culture Officer</a></td><td>Bangkok, Thailand</td><td>2026-10-15</td></tr>
        </table></body></html>"#;

        let result = UnescoPlugin::new().extract(html, "https://careers.unesco.org/go/all", None);
        assert_eq!(result.jobs.len(), 2);
        assert_eq!(result.jobs[0].title, "Education Specialist");
        assert_eq!(result.jobs[0].location_raw.as_deref(), Some("Paris, France"));
        assert_eq!(result.jobs[0].deadline_raw.as_deref(), Some("2026-09-30"));
        assert_eq!(result.jobs[0].org_name.as_deref(), Some("UNESCO"));
    }

    #[test]
    fn only_handles_unesco() {
        let plugin = UnescoPlugin::new();
        assert!(plugin.can_handle("https://careers.unesco.org/", "", None));
        assert!(!plugin.can_handle("https://careers.un.org/", "", None));
    }
}
