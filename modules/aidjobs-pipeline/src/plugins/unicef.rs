use crate::plugins::{extract_by_selectors, JobPlugin, PluginResult};

/// UNICEF listings (TalentLink-backed) render job cards client-side; the
/// fetch layer routes these pages through the browser fallback first, so
/// the plugin sees the hydrated DOM.
pub struct UnicefPlugin;

const SELECTORS: [&str; 6] = [
    "div[class*=\"job-card\"]",
    "li[class*=\"job\"]",
    "div[class*=\"vacancy\"]",
    "article[class*=\"job\"]",
    "tr[class*=\"job\"]",
    "div[class*=\"position\"]",
];

impl UnicefPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnicefPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl JobPlugin for UnicefPlugin {
    fn name(&self) -> &'static str {
        "unicef"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn can_handle(&self, url: &str, _html: &str, _config: Option<&str>) -> bool {
        url.to_lowercase().contains("unicef.org")
    }

    fn extract(&self, html: &str, base_url: &str, _config: Option<&str>) -> PluginResult {
        let mut jobs = extract_by_selectors(html, base_url, &SELECTORS, 100);
        for job in &mut jobs {
            job.org_name = Some("UNICEF".to_string());
        }
        let count = jobs.len();
        PluginResult {
            confidence: if count > 0 { 0.8 } else { 0.0 },
            message: Some(format!("Extracted {count} UNICEF jobs")),
            metadata: Default::default(),
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_job_cards() {
        let html = r#"<html><body>
            <div class="job-card"><h3>Child Protection Officer</h3>
                <span class="location">Dhaka, Bangladesh</span>
                <a href="/careers/55501">Apply</a></div>
            <div class="job-card"><h3>Health Specialist</h3>
                <span class="location">Kabul, Afghanistan</span>
                <a href="/careers/55502">Apply</a></div>
        </body></html>"#;

        let result = UnicefPlugin::new().extract(html, "https://www.unicef.org/careers", None);
        assert_eq!(result.jobs.len(), 2);
        assert_eq!(result.jobs[0].title, "Child Protection Officer");
        assert_eq!(result.jobs[0].location_raw.as_deref(), Some("Dhaka, Bangladesh"));
        assert_eq!(result.jobs[0].org_name.as_deref(), Some("UNICEF"));
    }

    #[test]
    fn unhydrated_page_yields_nothing() {
        let html = "<html><body><div id=\"app\">Loading...</div></body></html>";
        let result = UnicefPlugin::new().extract(html, "https://www.unicef.org/careers", None);
        assert!(!result.is_success());
    }
}
