use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use tracing::{info, warn};

use crate::rate::HostLimiters;
use crate::robots::RobotsCache;

/// Default body cap: 1 MiB.
const DEFAULT_MAX_SIZE_KB: usize = 1024;
/// Max attempts for transient failures (timeouts, network errors, 5xx).
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Result of one fetch. `status` uses synthetic codes at the edges:
/// 0 for network failure, 403 for a robots disallow, 304 for a
/// conditional-GET hit.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub body: String,
    pub size: usize,
    /// True when the body exceeded the cap and was cut.
    pub truncated: bool,
}

impl FetchedPage {
    fn synthetic(status: u16) -> Self {
        Self {
            status,
            etag: None,
            last_modified: None,
            body: String::new(),
            size: 0,
            truncated: false,
        }
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Body cap in KiB; defaults to 1024.
    pub max_size_kb: Option<usize>,
}

/// Plain HTTP fetcher: redirects capped at 3 hops, 30 s timeout, conditional
/// GET headers when known, transient failures retried with backoff.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }

    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchedPage {
        let max_bytes = options.max_size_kb.unwrap_or(DEFAULT_MAX_SIZE_KB) * 1024;

        let mut headers = HeaderMap::new();
        if let Some(ref etag) = options.etag {
            if let Ok(v) = etag.parse() {
                headers.insert(IF_NONE_MATCH, v);
            }
        }
        if let Some(ref lm) = options.last_modified {
            if let Ok(v) = lm.parse() {
                headers.insert(IF_MODIFIED_SINCE, v);
            }
        }

        let mut delay = INITIAL_RETRY_DELAY;
        for attempt in 0..MAX_ATTEMPTS {
            let response = self.client.get(url).headers(headers.clone()).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 304 {
                        return FetchedPage::synthetic(304);
                    }

                    // Retry server errors; everything else is final.
                    if status >= 500 && attempt + 1 < MAX_ATTEMPTS {
                        warn!(url, status, attempt = attempt + 1, "Server error, retrying");
                        sleep_with_jitter(delay).await;
                        delay = (delay * 2).min(MAX_RETRY_DELAY);
                        continue;
                    }

                    let etag = header_string(resp.headers(), ETAG);
                    let last_modified = header_string(resp.headers(), LAST_MODIFIED);

                    let bytes = match resp.bytes().await {
                        Ok(b) => b,
                        Err(e) => {
                            warn!(url, error = %e, "Failed reading response body");
                            return FetchedPage::synthetic(0);
                        }
                    };

                    let size = bytes.len();
                    let truncated = size > max_bytes;
                    let slice = if truncated { &bytes[..max_bytes] } else { &bytes[..] };
                    let body = String::from_utf8_lossy(slice).into_owned();

                    if truncated {
                        warn!(url, size, cap = max_bytes, "Response body truncated");
                    }

                    return FetchedPage {
                        status,
                        etag,
                        last_modified,
                        body,
                        size,
                        truncated,
                    };
                }
                Err(e) if (e.is_timeout() || e.is_connect() || e.is_request())
                    && attempt + 1 < MAX_ATTEMPTS =>
                {
                    warn!(url, attempt = attempt + 1, error = %e, "Fetch failed, retrying");
                    sleep_with_jitter(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
                Err(e) => {
                    warn!(url, error = %e, "Fetch failed");
                    return FetchedPage::synthetic(0);
                }
            }
        }

        FetchedPage::synthetic(0)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn sleep_with_jitter(delay: Duration) {
    let jitter = Duration::from_millis(rand::rng().random_range(0..250));
    tokio::time::sleep(delay + jitter).await;
}

/// Fetcher that layers robots consultation and per-host rate limiting over
/// the plain HTTP fetcher. This is the entrypoint used by the crawl drivers.
pub struct PoliteFetcher {
    http: HttpFetcher,
    robots: Arc<RobotsCache>,
    limiters: Arc<HostLimiters>,
}

impl PoliteFetcher {
    pub fn new(robots: Arc<RobotsCache>, limiters: Arc<HostLimiters>) -> Self {
        Self {
            http: HttpFetcher::new(),
            robots,
            limiters,
        }
    }

    /// Fetch a page, consulting robots.txt first and waiting on the host's
    /// token bucket. A robots disallow yields a synthetic 403.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchedPage {
        let host = match url::Url::parse(url).ok().and_then(|u| u.host_str().map(String::from)) {
            Some(h) => h,
            None => {
                warn!(url, "Unparseable URL");
                return FetchedPage::synthetic(0);
            }
        };

        let robots = self.robots.robots_info(&host).await;
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string());

        if !robots.allows(&path) {
            warn!(url, "Blocked by robots.txt");
            return FetchedPage::synthetic(403);
        }

        self.limiters.wait_for_slot(&host, robots.crawl_delay).await;

        let page = self.http.fetch(url, options).await;
        info!(url, status = page.status, size = page.size, "Fetched");
        page
    }
}
