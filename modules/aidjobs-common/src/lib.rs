pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::{Config, Environment};
pub use error::{AidJobsError, ErrorKind};
pub use hash::{
    content_hash, extract_domain, normalize_apply_url, short_hash, truncate_message,
};
pub use types::{
    CrawlCounts, CrawlLog, CrawlOutcome, CrawlStatus, EnrichmentBlock, Job, JobDraft,
    OrgCategory, QualityBlock, Source, SourceKind, SourceStatus,
};
