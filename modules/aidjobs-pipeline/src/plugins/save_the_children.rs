use crate::plugins::{extract_by_selectors, JobPlugin, PluginResult};

/// Save the Children career listings use card/list containers with
/// job-classed wrappers across their country sites.
pub struct SaveTheChildrenPlugin;

const SELECTORS: [&str; 5] = [
    "div[class*=\"job-result\"]",
    "div[class*=\"job\"]",
    "li[class*=\"job\"]",
    "article[class*=\"vacancy\"]",
    "div[class*=\"search-result\"]",
];

impl SaveTheChildrenPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SaveTheChildrenPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl JobPlugin for SaveTheChildrenPlugin {
    fn name(&self) -> &'static str {
        "save_the_children"
    }

    fn priority(&self) -> i32 {
        85
    }

    fn can_handle(&self, url: &str, _html: &str, _config: Option<&str>) -> bool {
        let url_lower = url.to_lowercase();
        url_lower.contains("savethechildren.org") || url_lower.contains("savethechildren.net")
    }

    fn extract(&self, html: &str, base_url: &str, _config: Option<&str>) -> PluginResult {
        let mut jobs = extract_by_selectors(html, base_url, &SELECTORS, 100);
        for job in &mut jobs {
            job.org_name = Some("Save the Children".to_string());
        }
        let count = jobs.len();
        PluginResult {
            confidence: if count > 0 { 0.8 } else { 0.0 },
            message: Some(format!("Extracted {count} Save the Children jobs")),
            metadata: Default::default(),
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_job_results() {
        let html = r#"<html><body>
            <div class="job-result">
                <h3>Emergency Response Manager</h3>
                <span class="location">Gaziantep, Türkiye</span>
                <a href="/careers/req-1234">View role</a>
            </div>
        </body></html>"#;

        let result = SaveTheChildrenPlugin::new()
            .extract(html, "https://www.savethechildren.net/careers", None);
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].title, "Emergency Response Manager");
        assert_eq!(result.jobs[0].org_name.as_deref(), Some("Save the Children"));
    }

    #[test]
    fn handles_both_domains() {
        let plugin = SaveTheChildrenPlugin::new();
        assert!(plugin.can_handle("https://www.savethechildren.org/careers", "", None));
        assert!(plugin.can_handle("https://www.savethechildren.net/careers", "", None));
        assert!(!plugin.can_handle("https://example.org/", "", None));
    }
}
