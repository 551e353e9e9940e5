pub mod api;
pub mod browser;
pub mod http;
pub mod rate;
pub mod robots;
pub mod rss;

pub use api::{ApiConfig, ApiError, ApiFetcher};
pub use browser::{needs_browser_render, BrowserFetcher};
pub use http::{FetchOptions, FetchedPage, HttpFetcher, PoliteFetcher};
pub use rate::HostLimiters;
pub use robots::RobotsCache;
pub use rss::{RawFeedRecord, RssFetcher};

/// User agent presented to crawled hosts and robots.txt.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; AidJobs/1.0; +https://aidjobs.app)";
