mod amnesty;
mod generic;
mod save_the_children;
mod undp;
mod unesco;
mod unicef;

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

pub use amnesty::AmnestyPlugin;
pub use generic::GenericPlugin;
pub use save_the_children::SaveTheChildrenPlugin;
pub use undp::UndpPlugin;
pub use unesco::UnescoPlugin;
pub use unicef::UnicefPlugin;

/// A job row as a plugin sees it: raw strings, no normalization yet.
#[derive(Debug, Clone, Default)]
pub struct RawJob {
    pub title: String,
    pub apply_url: String,
    pub location_raw: Option<String>,
    pub deadline_raw: Option<String>,
    pub description_snippet: Option<String>,
    pub posted_on_raw: Option<String>,
    pub org_name: Option<String>,
}

/// Result of one plugin extraction.
#[derive(Debug, Clone, Default)]
pub struct PluginResult {
    pub jobs: Vec<RawJob>,
    pub confidence: f64,
    pub message: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PluginResult {
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            jobs: Vec::new(),
            confidence: 0.0,
            message: Some(message.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.jobs.is_empty()
    }
}

/// Source-specific extraction strategy. Plugin state is read-only after
/// registration.
pub trait JobPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    /// Higher priority is tried first.
    fn priority(&self) -> i32;
    fn can_handle(&self, url: &str, html: &str, config: Option<&str>) -> bool;
    fn extract(&self, html: &str, base_url: &str, config: Option<&str>) -> PluginResult;
}

/// Priority-ordered plugin registry. The first plugin whose `can_handle`
/// returns true is invoked.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn JobPlugin>>,
}

impl PluginRegistry {
    /// Registry with all built-in plugins registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self { plugins: Vec::new() };
        registry.register(Box::new(UnicefPlugin::new()));
        registry.register(Box::new(AmnestyPlugin::new()));
        registry.register(Box::new(SaveTheChildrenPlugin::new()));
        registry.register(Box::new(UndpPlugin::new()));
        registry.register(Box::new(UnescoPlugin::new()));
        registry.register(Box::new(GenericPlugin::new()));
        registry
    }

    pub fn register(&mut self, plugin: Box<dyn JobPlugin>) {
        info!(plugin = plugin.name(), priority = plugin.priority(), "Registered plugin");
        self.plugins.push(plugin);
        self.plugins.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn find_plugin(&self, url: &str, html: &str, config: Option<&str>) -> Option<&dyn JobPlugin> {
        self.plugins
            .iter()
            .find(|p| p.can_handle(url, html, config))
            .map(|p| p.as_ref())
    }

    /// Run the best matching plugin. A plugin that finds nothing does not
    /// stop the page-level cascade from running.
    pub fn extract(&self, html: &str, base_url: &str, config: Option<&str>) -> PluginResult {
        let plugin = match self.find_plugin(base_url, html, config) {
            Some(p) => p,
            None => {
                warn!(url = base_url, "No matching plugin");
                return PluginResult::empty("No matching plugin found");
            }
        };

        let result = plugin.extract(html, base_url, config);
        info!(
            plugin = plugin.name(),
            jobs = result.jobs.len(),
            confidence = result.confidence,
            "Plugin extraction complete"
        );
        result
    }

    pub fn list(&self) -> Vec<(&'static str, i32)> {
        self.plugins.iter().map(|p| (p.name(), p.priority())).collect()
    }
}

// --- Shared helpers used across plugins ---

/// Resolve an href against the page URL; rejects fragments and javascript:
/// pseudo-links.
pub(crate) fn resolve_href(base_url: &str, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    url::Url::parse(base_url)
        .ok()
        .and_then(|base| base.join(href).ok())
        .map(|u| u.to_string())
}

pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract a job from a listing container: title from the first heading or
/// link, apply URL from the first usable link, labeled bits from class names.
pub(crate) fn job_from_container(el: ElementRef<'_>, base_url: &str) -> Option<RawJob> {
    let title_selector = Selector::parse("h1, h2, h3, h4, a").expect("valid selector");
    let title = el
        .select(&title_selector)
        .map(element_text)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| {
            let text = element_text(el);
            text.chars().take(200).collect()
        });
    let title = title.trim().to_string();
    if title.is_empty() {
        return None;
    }

    let link_selector = Selector::parse("a[href]").expect("valid selector");
    let apply_url = el
        .select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| resolve_href(base_url, href))
        .unwrap_or_else(|| base_url.to_string());

    let location_raw = select_class_text(el, &["location", "place", "city"]);
    let deadline_raw = select_class_text(el, &["deadline", "closing", "expire"]);
    let description_snippet = select_class_text(el, &["description", "summary", "excerpt"])
        .or_else(|| {
            let text = element_text(el);
            if text.is_empty() {
                None
            } else {
                Some(text.chars().take(500).collect())
            }
        });

    Some(RawJob {
        title,
        apply_url,
        location_raw,
        deadline_raw,
        description_snippet,
        posted_on_raw: None,
        org_name: None,
    })
}

fn select_class_text(el: ElementRef<'_>, markers: &[&str]) -> Option<String> {
    for marker in markers {
        let raw = format!("[class*=\"{marker}\"]");
        let parsed = Selector::parse(&raw);
        if let Ok(selector) = parsed {
            if let Some(found) = el.select(&selector).next() {
                let text = element_text(found);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Selector-cascade extraction shared by the site plugins that wrap listing
/// cards: try selectors in order, take the first that yields containers.
pub(crate) fn extract_by_selectors(
    html: &str,
    base_url: &str,
    selectors: &[&str],
    max_jobs: usize,
) -> Vec<RawJob> {
    let document = Html::parse_document(html);
    for raw in selectors {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let jobs: Vec<RawJob> = document
            .select(&selector)
            .filter_map(|el| job_from_container(el, base_url))
            .filter(|job| job.title.len() >= 5)
            .take(max_jobs)
            .collect();
        if !jobs.is_empty() {
            debug!(selector = raw, count = jobs.len(), "Selector matched containers");
            return dedupe_by_url(jobs);
        }
    }
    Vec::new()
}

/// Keep the first job per normalized apply URL; log collisions.
pub(crate) fn dedupe_by_url(jobs: Vec<RawJob>) -> Vec<RawJob> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(jobs.len());
    for job in jobs {
        let normalized = aidjobs_common::normalize_apply_url(&job.apply_url);
        if seen.insert(normalized) {
            unique.push(job);
        } else {
            debug!(title = %job.title, url = %job.apply_url, "Dropped duplicate apply URL");
        }
    }
    unique
}
