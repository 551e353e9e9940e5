use crate::plugins::{extract_by_selectors, JobPlugin, PluginResult};

/// Amnesty International careers pages wrap each posting in a job/vacancy
/// classed container.
pub struct AmnestyPlugin;

const SELECTORS: [&str; 4] = [
    "div[class*=\"job\"]",
    "article[class*=\"job\"]",
    "li[class*=\"job\"]",
    "div[class*=\"vacancy\"]",
];

impl AmnestyPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmnestyPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl JobPlugin for AmnestyPlugin {
    fn name(&self) -> &'static str {
        "amnesty"
    }

    fn priority(&self) -> i32 {
        85
    }

    fn can_handle(&self, url: &str, _html: &str, _config: Option<&str>) -> bool {
        url.to_lowercase().contains("amnesty.org")
    }

    fn extract(&self, html: &str, base_url: &str, _config: Option<&str>) -> PluginResult {
        let mut jobs = extract_by_selectors(html, base_url, &SELECTORS, 100);
        for job in &mut jobs {
            job.org_name = Some("Amnesty International".to_string());
        }
        let count = jobs.len();
        PluginResult {
            confidence: if count > 0 { 0.8 } else { 0.0 },
            message: Some(format!("Extracted {count} Amnesty jobs")),
            metadata: Default::default(),
            jobs,
        }
    }
}
