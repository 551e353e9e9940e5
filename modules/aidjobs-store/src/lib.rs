pub mod crawl_log;
pub mod failed;
pub mod jobs;
pub mod locks;
pub mod query;
pub mod search;
pub mod sources;

pub use crawl_log::CrawlLogStore;
pub use failed::FailedInsertLog;
pub use jobs::{DeleteFilter, DeleteMode, DeleteOutcome, ImpactCounts, JobStore};
pub use locks::LockStore;
pub use query::QueryBuilder;
pub use search::SearchIndexClient;
pub use sources::{SourceStore, SourceUpdate};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Search index error: {0}")]
    Search(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
