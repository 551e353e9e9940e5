use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Directives cached for 24 hours per host.
const ROBOTS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Parsed directives for one host. An unfetchable or missing robots.txt
/// degrades to allow-all.
#[derive(Debug, Clone)]
pub struct RobotsInfo {
    /// (allow, path prefix) pairs in file order.
    rules: Vec<(bool, String)>,
    pub crawl_delay: Option<Duration>,
}

impl RobotsInfo {
    pub fn allow_all() -> Self {
        Self {
            rules: Vec::new(),
            crawl_delay: None,
        }
    }

    /// Longest-prefix match across allow and disallow rules; no match means
    /// allowed. An empty `Disallow:` line allows everything.
    pub fn allows(&self, path: &str) -> bool {
        let mut best: Option<(usize, bool)> = None;
        for (allow, prefix) in &self.rules {
            if prefix.is_empty() {
                continue;
            }
            if path.starts_with(prefix.as_str()) {
                let len = prefix.len();
                if best.map_or(true, |(best_len, _)| len > best_len) {
                    best = Some((len, *allow));
                }
            }
        }
        best.map_or(true, |(_, allow)| allow)
    }

    /// Parse robots.txt content for the given user agent, falling back to
    /// the `*` group.
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let ua_token = user_agent
            .split('/')
            .next()
            .unwrap_or(user_agent)
            .to_lowercase();

        let mut groups: Vec<(Vec<String>, Vec<(bool, String)>, Option<Duration>)> = Vec::new();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules: Vec<(bool, String)> = Vec::new();
        let mut current_delay: Option<Duration> = None;
        let mut in_rules = false;

        let mut flush =
            |agents: &mut Vec<String>, rules: &mut Vec<(bool, String)>, delay: &mut Option<Duration>| {
                if !agents.is_empty() {
                    groups.push((std::mem::take(agents), std::mem::take(rules), delay.take()));
                }
            };

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = match line.split_once(':') {
                Some((k, v)) => (k.trim().to_lowercase(), v.trim().to_string()),
                None => continue,
            };

            match key.as_str() {
                "user-agent" => {
                    if in_rules {
                        flush(&mut current_agents, &mut current_rules, &mut current_delay);
                        in_rules = false;
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    in_rules = true;
                    current_rules.push((false, value));
                }
                "allow" => {
                    in_rules = true;
                    current_rules.push((true, value));
                }
                "crawl-delay" => {
                    in_rules = true;
                    if let Ok(secs) = value.parse::<f64>() {
                        current_delay = Some(Duration::from_secs_f64(secs.clamp(0.0, 60.0)));
                    }
                }
                _ => {}
            }
        }
        flush(&mut current_agents, &mut current_rules, &mut current_delay);

        // Prefer a group naming our agent, else the wildcard group.
        let matching = groups
            .iter()
            .find(|(agents, _, _)| agents.iter().any(|a| ua_token.contains(a.as_str()) || a.contains(&ua_token)))
            .or_else(|| groups.iter().find(|(agents, _, _)| agents.iter().any(|a| a == "*")));

        match matching {
            Some((_, rules, delay)) => Self {
                rules: rules.clone(),
                crawl_delay: *delay,
            },
            None => Self::allow_all(),
        }
    }
}

struct CachedRobots {
    info: RobotsInfo,
    fetched_at: Instant,
}

/// Per-host robots.txt cache with a 24-hour TTL. Refreshes hold a per-cache
/// lock only briefly; the fetch itself happens outside the critical section.
pub struct RobotsCache {
    client: reqwest::Client,
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Directives for a host, fetching robots.txt on first use or after
    /// expiry.
    pub async fn robots_info(&self, host: &str) -> RobotsInfo {
        {
            let entries = self.entries.lock().await;
            if let Some(cached) = entries.get(host) {
                if cached.fetched_at.elapsed() < ROBOTS_TTL {
                    return cached.info.clone();
                }
            }
        }

        let info = self.fetch_robots(host).await;

        let mut entries = self.entries.lock().await;
        entries.insert(
            host.to_string(),
            CachedRobots {
                info: info.clone(),
                fetched_at: Instant::now(),
            },
        );
        info
    }

    async fn fetch_robots(&self, host: &str) -> RobotsInfo {
        let robots_url = format!("https://{host}/robots.txt");
        debug!(host, "Fetching robots.txt");

        match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsInfo::parse(&body, crate::USER_AGENT),
                Err(e) => {
                    warn!(host, error = %e, "Failed reading robots.txt body");
                    RobotsInfo::allow_all()
                }
            },
            Ok(resp) => {
                debug!(host, status = resp.status().as_u16(), "No usable robots.txt");
                RobotsInfo::allow_all()
            }
            Err(e) => {
                debug!(host, error = %e, "robots.txt fetch failed");
                RobotsInfo::allow_all()
            }
        }
    }
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}
