use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Production,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    // Postgres
    pub db_url: String,

    // OpenRouter
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,

    // Meilisearch
    pub meilisearch_url: Option<String>,
    pub meilisearch_key: Option<String>,
    pub meili_jobs_index: String,

    // Extraction
    pub ai_extraction_max_calls: u32,
    pub snapshot_path: String,
    pub extraction_use_storage: bool,
    pub extraction_shadow_mode: bool,

    // Scheduler
    pub disable_scheduler: bool,

    // Browser fallback
    pub chrome_bin: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails when no Postgres DSN is configured or when the configured value
    /// is an HTTPS URL (the Supabase REST endpoint is not a database DSN).
    pub fn from_env() -> Result<Self, crate::AidJobsError> {
        let db_url = env::var("SUPABASE_DB_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .map_err(|_| {
                crate::AidJobsError::Config(
                    "SUPABASE_DB_URL or DATABASE_URL is required".to_string(),
                )
            })?;

        if db_url.starts_with("http://") || db_url.starts_with("https://") {
            return Err(crate::AidJobsError::Config(
                "database URL must be a PostgreSQL DSN, not an HTTP(S) URL".to_string(),
            ));
        }

        let environment = match env::var("AIDJOBS_ENV").unwrap_or_default().to_lowercase().as_str()
        {
            "dev" => Environment::Dev,
            _ => Environment::Production,
        };

        Ok(Self {
            environment,
            db_url,
            openrouter_api_key: env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty()),
            openrouter_model: env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-3-haiku".to_string()),
            meilisearch_url: env::var("MEILISEARCH_URL").ok().filter(|v| !v.is_empty()),
            meilisearch_key: env::var("MEILISEARCH_KEY").ok().filter(|v| !v.is_empty()),
            meili_jobs_index: env::var("MEILI_JOBS_INDEX")
                .unwrap_or_else(|_| "jobs_index".to_string()),
            ai_extraction_max_calls: env::var("AI_EXTRACTION_MAX_CALLS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
            snapshot_path: env::var("SNAPSHOT_PATH").unwrap_or_else(|_| "snapshots".to_string()),
            extraction_use_storage: env_flag("EXTRACTION_USE_STORAGE", false),
            extraction_shadow_mode: env_flag("EXTRACTION_SHADOW_MODE", true),
            disable_scheduler: env_flag("AIDJOBS_DISABLE_SCHEDULER", false),
            chrome_bin: env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".to_string()),
        })
    }

    pub fn is_dev(&self) -> bool {
        self.environment == Environment::Dev
    }

    /// Log the presence of sensitive configuration without the values.
    pub fn log_redacted(&self) {
        let vars = [
            ("SUPABASE_DB_URL/DATABASE_URL", Some(self.db_url.as_str())),
            ("OPENROUTER_API_KEY", self.openrouter_api_key.as_deref()),
            ("MEILISEARCH_URL", self.meilisearch_url.as_deref()),
            ("MEILISEARCH_KEY", self.meilisearch_key.as_deref()),
        ];
        for (name, value) in vars {
            match value {
                Some(v) if !v.is_empty() => tracing::info!("{name} = ({} chars)", v.len()),
                _ => tracing::info!("{name} = (empty)"),
            }
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "t" | "y"),
        Err(_) => default,
    }
}
