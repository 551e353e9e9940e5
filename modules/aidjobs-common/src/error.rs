use thiserror::Error;

/// Error categories used to pick the handling policy (retry, skip, surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeout, 5xx, network failure. Retried by the transport.
    Transient,
    /// 4xx (excluding 429), invalid schema. Never retried.
    Permanent,
    /// Robots disallow, missing secret, schema version mismatch.
    Policy,
    /// Record-level validation failure; skipped and logged.
    Data,
    /// DB connection, missing lock table. Logged; loop continues.
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum AidJobsError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Blocked by robots.txt: {0}")]
    RobotsDisallow(String),

    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    #[error("Unsupported config schema version: {0}")]
    SchemaVersion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Crawl lock conflict: another crawl of this source is in progress")]
    LockConflict,

    #[error("AI error: {0}")]
    Ai(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AidJobsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AidJobsError::Transport(_) => ErrorKind::Transient,
            AidJobsError::Http { status, .. } => match status {
                429 | 500..=599 => ErrorKind::Transient,
                _ => ErrorKind::Permanent,
            },
            AidJobsError::RobotsDisallow(_)
            | AidJobsError::MissingSecret(_)
            | AidJobsError::SchemaVersion(_) => ErrorKind::Policy,
            AidJobsError::Validation(_) | AidJobsError::Extraction(_) => ErrorKind::Data,
            AidJobsError::Database(_) | AidJobsError::LockConflict => ErrorKind::Infrastructure,
            AidJobsError::Config(_) => ErrorKind::Policy,
            AidJobsError::Ai(_) => ErrorKind::Transient,
            AidJobsError::Anyhow(_) => ErrorKind::Permanent,
        }
    }

    /// Whether the transport layer may retry the operation.
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
