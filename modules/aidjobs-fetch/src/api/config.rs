use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;

use crate::api::transform::TransformConfig;

/// v1 JSON configuration attached to an `api` source as its parser hint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub v: u32,
    pub base_url: Option<String>,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub auth: Option<AuthConfig>,
    pub pagination: Option<PaginationConfig>,
    pub since: Option<SinceConfig>,
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default)]
    pub map: HashMap<String, String>,
    #[serde(default)]
    pub transforms: HashMap<String, TransformConfig>,
    pub success_codes: Option<Vec<u16>>,
    pub retry: Option<RetryConfig>,
    pub throttle: Option<ThrottleConfig>,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_data_path() -> String {
    "data".to_string()
}

impl ApiConfig {
    pub fn success_codes(&self) -> Vec<u16> {
        self.success_codes.clone().unwrap_or_else(|| vec![200, 201])
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    None,
    Header {
        #[serde(default = "default_auth_header")]
        header_name: String,
        token: String,
    },
    Query {
        #[serde(default = "default_query_name")]
        query_name: String,
        token: String,
    },
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    Oauth2ClientCredentials {
        oauth2: Oauth2Config,
    },
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_query_name() -> String {
    "api_key".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Oauth2Config {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    Offset,
    Page,
    Cursor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(rename = "type")]
    pub kind: PaginationType,
    #[serde(default = "default_offset_param")]
    pub offset_param: String,
    #[serde(default = "default_page_param")]
    pub page_param: String,
    #[serde(default = "default_limit_param")]
    pub limit_param: String,
    #[serde(default = "default_cursor_param")]
    pub cursor_param: String,
    pub cursor_path: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_until_empty")]
    pub until_empty: bool,
}

fn default_offset_param() -> String {
    "offset".to_string()
}
fn default_page_param() -> String {
    "page".to_string()
}
fn default_limit_param() -> String {
    "limit".to_string()
}
fn default_cursor_param() -> String {
    "cursor".to_string()
}
fn default_page_size() -> usize {
    100
}
fn default_max_pages() -> usize {
    50
}
fn default_until_empty() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinceFormat {
    Iso8601,
    Unix,
    UnixMs,
}

/// Incremental-fetch filter injected into the request.
#[derive(Debug, Clone, Deserialize)]
pub struct SinceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_since_field")]
    pub field: String,
    #[serde(default = "default_since_format")]
    pub format: SinceFormat,
    #[serde(default = "default_fallback_days")]
    pub fallback_days: i64,
}

fn default_since_field() -> String {
    "since".to_string()
}
fn default_since_format() -> SinceFormat {
    SinceFormat::Iso8601
}
fn default_fallback_days() -> i64 {
    14
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: f64,
    #[serde(default = "default_burst")]
    pub burst: f64,
}

fn default_rpm() -> f64 {
    30.0
}
fn default_burst() -> f64 {
    5.0
}

/// Non-success response categories; first-page failures surface as the
/// crawl's fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    NotFound,
    RateLimit,
    ServerError,
    ClientError,
    Unknown,
}

impl ErrorCategory {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCategory::Authentication,
            403 => ErrorCategory::Authorization,
            404 => ErrorCategory::NotFound,
            429 => ErrorCategory::RateLimit,
            500..=599 => ErrorCategory::ServerError,
            400..=499 => ErrorCategory::ClientError,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Authentication => write!(f, "authentication"),
            ErrorCategory::Authorization => write!(f, "authorization"),
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::RateLimit => write!(f, "rate_limit"),
            ErrorCategory::ServerError => write!(f, "server_error"),
            ErrorCategory::ClientError => write!(f, "client_error"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

// --- Secret placeholders ---

/// Collect `{{SECRET:NAME}}` placeholders whose secrets are absent from the
/// process environment. Must be called before resolution so a missing secret
/// fails the run before any network call.
pub fn missing_secrets(raw_config: &str) -> Vec<String> {
    let pattern = Regex::new(r"\{\{SECRET:([A-Za-z0-9_]+)\}\}").expect("valid regex");
    let mut missing = Vec::new();
    for captures in pattern.captures_iter(raw_config) {
        let name = &captures[1];
        if std::env::var(name).is_err() && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}

/// Replace `{{SECRET:NAME}}` placeholders with values from the environment.
pub fn resolve_secrets(raw_config: &str) -> String {
    let pattern = Regex::new(r"\{\{SECRET:([A-Za-z0-9_]+)\}\}").expect("valid regex");
    pattern
        .replace_all(raw_config, |captures: &regex::Captures<'_>| {
            std::env::var(&captures[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_v1_config() {
        let raw = r#"{"v": 1, "base_url": "https://api.example.org", "map": {"title": "name"}}"#;
        let config: ApiConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.v, 1);
        assert_eq!(config.path, "/");
        assert_eq!(config.method, "GET");
        assert_eq!(config.data_path, "data");
        assert_eq!(config.success_codes(), vec![200, 201]);
    }

    #[test]
    fn parses_auth_variants() {
        let raw = r#"{"type": "bearer", "token": "abc"}"#;
        let auth: AuthConfig = serde_json::from_str(raw).unwrap();
        assert!(matches!(auth, AuthConfig::Bearer { .. }));

        let raw = r#"{"type": "basic", "username": "u", "password": "p"}"#;
        let auth: AuthConfig = serde_json::from_str(raw).unwrap();
        assert!(matches!(auth, AuthConfig::Basic { .. }));

        let raw = r#"{"type": "header", "header_name": "X-Api-Key", "token": "k"}"#;
        match serde_json::from_str::<AuthConfig>(raw).unwrap() {
            AuthConfig::Header { header_name, token } => {
                assert_eq!(header_name, "X-Api-Key");
                assert_eq!(token, "k");
            }
            other => panic!("unexpected auth: {other:?}"),
        }

        let raw = r#"{"type": "oauth2_client_credentials", "oauth2": {
            "token_url": "https://auth.example.org/token",
            "client_id": "id", "client_secret": "secret"}}"#;
        let auth: AuthConfig = serde_json::from_str(raw).unwrap();
        assert!(matches!(auth, AuthConfig::Oauth2ClientCredentials { .. }));
    }

    #[test]
    fn pagination_defaults() {
        let raw = r#"{"type": "offset"}"#;
        let p: PaginationConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(p.kind, PaginationType::Offset);
        assert_eq!(p.page_size, 100);
        assert_eq!(p.max_pages, 50);
        assert!(p.until_empty);
        assert_eq!(p.offset_param, "offset");
        assert_eq!(p.limit_param, "limit");
    }

    #[test]
    fn error_categories_by_status() {
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Authentication);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Authorization);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::RateLimit);
        assert_eq!(ErrorCategory::from_status(502), ErrorCategory::ServerError);
        assert_eq!(ErrorCategory::from_status(418), ErrorCategory::ClientError);
    }

    #[test]
    fn missing_secrets_detected_before_resolution() {
        let raw = r#"{"auth": {"type": "bearer", "token": "{{SECRET:AIDJOBS_TEST_ABSENT}}"}}"#;
        let missing = missing_secrets(raw);
        assert_eq!(missing, vec!["AIDJOBS_TEST_ABSENT".to_string()]);
    }

    #[test]
    fn secrets_resolve_from_env() {
        std::env::set_var("AIDJOBS_TEST_SECRET", "s3cr3t");
        let raw = r#"{"token": "{{SECRET:AIDJOBS_TEST_SECRET}}"}"#;
        assert!(missing_secrets(raw).is_empty());
        assert_eq!(resolve_secrets(raw), r#"{"token": "s3cr3t"}"#);
    }
}
