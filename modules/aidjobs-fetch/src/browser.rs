use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Max concurrent Chromium processes. Each instance is heavy (~100MB+ RSS).
const MAX_CONCURRENT_CHROME: usize = 2;
/// Max retry attempts for transient Chrome failures.
const CHROME_MAX_ATTEMPTS: u32 = 3;
/// Base backoff for Chrome retries. Actual delay is base * 3^attempt + jitter.
const CHROME_RETRY_BASE: Duration = Duration::from_secs(3);
/// Render timeout per attempt.
const CHROME_TIMEOUT: Duration = Duration::from_secs(30);

/// Body markers indicating the page needs JavaScript to render.
const JS_REQUIRED_MARKERS: [&str; 5] = [
    "unsupported browser",
    "javascript required",
    "enable javascript",
    "pageup",
    "ultipro",
];

/// ATS hosts known to serve JS-rendered listings.
const JS_RENDERED_HOSTS: [&str; 5] = [
    "myworkdayjobs.com",
    "successfactors.com",
    "taleo.net",
    "icims.com",
    "greenhouse.io",
];

/// Whether a fetched body (or its URL) calls for the browser fallback.
pub fn needs_browser_render(url: &str, body: &str) -> bool {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default();
    if JS_RENDERED_HOSTS.iter().any(|h| host.ends_with(h)) {
        return true;
    }

    let haystack: String = body.chars().take(4096).collect::<String>().to_lowercase();
    JS_REQUIRED_MARKERS.iter().any(|m| haystack.contains(m))
}

/// Headless-Chrome page renderer using `--dump-dom`.
pub struct BrowserFetcher {
    chrome_bin: String,
    semaphore: Semaphore,
}

impl BrowserFetcher {
    pub fn new(chrome_bin: &str) -> Self {
        info!(chrome_bin, "BrowserFetcher initialized (max_concurrent={MAX_CONCURRENT_CHROME})");
        Self {
            chrome_bin: chrome_bin.to_string(),
            semaphore: Semaphore::new(MAX_CONCURRENT_CHROME),
        }
    }

    /// Render a page and return its DOM HTML. Returns an empty string when
    /// Chrome produces nothing usable; the caller decides whether to fall
    /// back to the plain HTTP body.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("Chrome semaphore closed"))?;

        info!(url, fetcher = "chrome", "Rendering page");

        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs allowed, got: {}", parsed.scheme());
        }

        for attempt in 0..CHROME_MAX_ATTEMPTS {
            let tmp_dir = tempfile::tempdir().context("Failed to create temp profile dir")?;

            let result = tokio::time::timeout(
                CHROME_TIMEOUT,
                tokio::process::Command::new(&self.chrome_bin)
                    .args([
                        "--headless",
                        "--no-sandbox",
                        "--disable-gpu",
                        "--disable-dev-shm-usage",
                        &format!("--user-data-dir={}", tmp_dir.path().display()),
                        "--dump-dom",
                        url,
                    ])
                    .output(),
            )
            .await;

            match result {
                Ok(Ok(output)) => {
                    if output.status.success() {
                        if output.stdout.is_empty() && attempt + 1 < CHROME_MAX_ATTEMPTS {
                            warn!(url, attempt = attempt + 1, "Chrome returned empty DOM, retrying");
                            retry_backoff(attempt).await;
                            continue;
                        }
                        let html = String::from_utf8_lossy(&output.stdout).into_owned();
                        info!(url, fetcher = "chrome", bytes = html.len(), "Rendered");
                        return Ok(html);
                    }
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    if is_transient_error(&stderr) && attempt + 1 < CHROME_MAX_ATTEMPTS {
                        retry_backoff(attempt).await;
                        continue;
                    }
                    warn!(url, fetcher = "chrome", stderr = %stderr, "Chrome exited with error");
                    return Ok(String::new());
                }
                Ok(Err(e)) => {
                    let msg = e.to_string();
                    if is_transient_error(&msg) && attempt + 1 < CHROME_MAX_ATTEMPTS {
                        warn!(url, attempt = attempt + 1, error = %e, "Chrome launch failed, retrying");
                        retry_backoff(attempt).await;
                        continue;
                    }
                    anyhow::bail!("Failed to run Chrome for {url}: {e}");
                }
                Err(_) => {
                    if attempt + 1 < CHROME_MAX_ATTEMPTS {
                        warn!(url, attempt = attempt + 1, "Chrome timed out, retrying");
                        retry_backoff(attempt).await;
                        continue;
                    }
                    anyhow::bail!("Chrome timed out after 30s for {url}");
                }
            }
        }

        Ok(String::new())
    }
}

fn is_transient_error(msg: &str) -> bool {
    msg.contains("Cannot fork") || msg.contains("Resource temporarily unavailable")
}

async fn retry_backoff(attempt: u32) {
    let backoff = CHROME_RETRY_BASE * 3u32.pow(attempt);
    let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
    tokio::time::sleep(backoff + jitter).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_in_body_triggers_browser() {
        assert!(needs_browser_render(
            "https://example.org/jobs",
            "<html>This site requires JavaScript Required to view</html>"
        ));
        assert!(needs_browser_render(
            "https://example.org/jobs",
            "<p>Unsupported Browser detected</p>"
        ));
    }

    #[test]
    fn known_ats_host_triggers_browser() {
        assert!(needs_browser_render(
            "https://unicef.myworkdayjobs.com/jobs",
            "<html></html>"
        ));
    }

    #[test]
    fn plain_page_does_not_trigger() {
        assert!(!needs_browser_render(
            "https://example.org/jobs",
            "<html><h1>Jobs</h1><a href=\"/p/1\">Officer</a></html>"
        ));
    }

    #[test]
    fn marker_beyond_prefix_ignored() {
        let mut body = "a".repeat(5000);
        body.push_str("javascript required");
        assert!(!needs_browser_render("https://example.org", &body));
    }
}
