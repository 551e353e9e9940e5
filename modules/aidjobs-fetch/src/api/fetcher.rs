use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::config::{
    missing_secrets, resolve_secrets, ApiConfig, AuthConfig, ErrorCategory, PaginationType,
    SinceConfig, SinceFormat,
};
use crate::api::path::{resolve_items, resolve_value};
use crate::api::transform::apply_transforms;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid JSON config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("Unsupported schema version: {0:?}. Expected v=1")]
    SchemaVersion(Option<u32>),

    #[error("Missing required secrets: {}", .0.join(", "))]
    MissingSecrets(Vec<String>),

    #[error("base_url is required in v1 schema")]
    MissingBaseUrl,

    #[error("{category}: HTTP {status} for {url}")]
    Categorized {
        category: ErrorCategory,
        status: u16,
        url: String,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OAuth2 token fetch failed: {0}")]
    Oauth2(String),
}

/// JSON API fetcher driven by the v1 source configuration.
pub struct ApiFetcher {
    http: reqwest::Client,
}

impl ApiFetcher {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");
        Self { http }
    }

    /// Fetch all pages and return mapped raw job objects.
    ///
    /// `fallback_base_url` is the source's careers URL, used when the config
    /// omits `base_url`. `last_success_at` drives the incremental filter.
    pub async fn fetch(
        &self,
        raw_config: &str,
        fallback_base_url: Option<&str>,
        last_success_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, ApiError> {
        // Validate secrets before resolving so the failure carries the names.
        let missing = missing_secrets(raw_config);
        if !missing.is_empty() {
            return Err(ApiError::MissingSecrets(missing));
        }
        let resolved = resolve_secrets(raw_config);

        let config: ApiConfig = serde_json::from_str(&resolved)?;
        if config.v != 1 {
            return Err(ApiError::SchemaVersion(Some(config.v)));
        }

        let base_url = config
            .base_url
            .as_deref()
            .or(fallback_base_url)
            .ok_or(ApiError::MissingBaseUrl)?;
        let full_url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            config.path.trim_start_matches('/')
        );

        let (auth_header, extra_headers, auth_query) = self.auth_parts(&config).await?;

        let since_value = config
            .since
            .as_ref()
            .filter(|s| s.enabled)
            .map(|s| format_since(s, last_success_at));

        let success_codes = config.success_codes();
        let method = config.method.to_uppercase();
        let page_delay = config
            .throttle
            .as_ref()
            .filter(|t| t.enabled)
            .map(|t| Duration::from_secs_f64(60.0 / t.requests_per_minute.max(1.0)));

        let mut all_jobs: Vec<Value> = Vec::new();
        let mut page_count = 0usize;
        let mut cursor: Option<String> = None;
        let mut page = 1usize;
        let mut offset = 0usize;

        loop {
            let mut query: HashMap<String, String> = config.query.clone();
            for (k, v) in &auth_query {
                query.insert(k.clone(), v.clone());
            }
            let mut body = config.body.clone();

            if let (Some(since), Some(since_config)) = (&since_value, config.since.as_ref()) {
                inject_param(&method, &mut query, &mut body, &since_config.field, since);
            }

            if let Some(pagination) = &config.pagination {
                match pagination.kind {
                    PaginationType::Offset => {
                        query.insert(pagination.offset_param.clone(), offset.to_string());
                        query.insert(pagination.limit_param.clone(), pagination.page_size.to_string());
                    }
                    PaginationType::Page => {
                        query.insert(pagination.page_param.clone(), page.to_string());
                        query.insert(pagination.limit_param.clone(), pagination.page_size.to_string());
                    }
                    PaginationType::Cursor => {
                        if let Some(ref c) = cursor {
                            inject_param(&method, &mut query, &mut body, &pagination.cursor_param, c);
                        }
                    }
                }
            }

            let response = self
                .request(&method, &full_url, &config.headers, &extra_headers, &query, &body, auth_header.as_deref())
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    // Retry the first page per the config's retry budget.
                    let max_retries = config.retry.as_ref().map(|r| r.max_retries).unwrap_or(0);
                    if page_count == 0 && max_retries > 0 {
                        let backoff = config.retry.as_ref().map(|r| r.backoff_ms).unwrap_or(1000);
                        let mut last_err = e;
                        let mut recovered = None;
                        for attempt in 0..max_retries {
                            warn!(url = %full_url, attempt = attempt + 1, "API request failed, retrying");
                            tokio::time::sleep(Duration::from_millis(backoff)).await;
                            match self
                                .request(&method, &full_url, &config.headers, &extra_headers, &query, &body, auth_header.as_deref())
                                .await
                            {
                                Ok(r) => {
                                    recovered = Some(r);
                                    break;
                                }
                                Err(e) => last_err = e,
                            }
                        }
                        match recovered {
                            Some(r) => r,
                            None => return Err(ApiError::Transport(last_err)),
                        }
                    } else if page_count == 0 {
                        return Err(ApiError::Transport(e));
                    } else {
                        break;
                    }
                }
            };

            let status = response.status().as_u16();
            if !success_codes.contains(&status) {
                let category = ErrorCategory::from_status(status);
                warn!(url = %full_url, status, category = %category, "Non-success API status");
                if page_count == 0 {
                    return Err(ApiError::Categorized {
                        category,
                        status,
                        url: full_url,
                    });
                }
                break;
            }

            let data: Value = match response.json().await {
                Ok(d) => d,
                Err(e) => {
                    warn!(url = %full_url, error = %e, "Invalid JSON response");
                    break;
                }
            };

            let items = resolve_items(&data, &config.data_path);
            if items.is_empty() {
                info!(url = %full_url, data_path = %config.data_path, "No items at data_path");
                break;
            }
            let item_count = items.len();

            for item in &items {
                let job = map_fields(item, &config);
                if job.get("title").map(|t| !t.is_null()).unwrap_or(false) {
                    all_jobs.push(Value::Object(job));
                }
            }
            page_count += 1;

            // Advance pagination.
            let pagination = match &config.pagination {
                Some(p) => p,
                None => break, // single page
            };
            match pagination.kind {
                PaginationType::Cursor => {
                    cursor = extract_cursor(&data, pagination.cursor_path.as_deref());
                    if cursor.is_none() {
                        break;
                    }
                }
                PaginationType::Offset => {
                    offset += item_count;
                    if item_count < pagination.page_size {
                        break;
                    }
                }
                PaginationType::Page => {
                    page += 1;
                    if item_count < pagination.page_size {
                        break;
                    }
                }
            }

            if page_count >= pagination.max_pages {
                warn!(url = %full_url, max_pages = pagination.max_pages, "Reached max_pages limit");
                break;
            }
            if pagination.until_empty && item_count == 0 {
                break;
            }

            if let Some(delay) = page_delay {
                tokio::time::sleep(delay).await;
            }
        }

        info!(url = %full_url, jobs = all_jobs.len(), pages = page_count, "API fetch complete");
        Ok(all_jobs)
    }

    #[allow(clippy::too_many_arguments)]
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        extra_headers: &HashMap<String, String>,
        query: &HashMap<String, String>,
        body: &Option<Value>,
        auth_header: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut header_map = HeaderMap::new();
        for (k, v) in headers.iter().chain(extra_headers.iter()) {
            if let (Ok(name), Ok(value)) = (
                k.parse::<HeaderName>(),
                HeaderValue::from_str(v),
            ) {
                header_map.insert(name, value);
            }
        }
        if let Some(auth) = auth_header {
            if let Ok(value) = HeaderValue::from_str(auth) {
                header_map.insert(reqwest::header::AUTHORIZATION, value);
            }
        }

        let builder = match method {
            "POST" => self.http.post(url),
            "PUT" => self.http.put(url),
            _ => self.http.get(url),
        };
        let mut builder = builder.headers(header_map).query(&query);
        if let Some(ref b) = body {
            builder = builder.json(b);
        }
        builder.send().await
    }

    /// Returns (Authorization header, extra headers, query params) for the
    /// configured auth scheme. OAuth2 exchanges client credentials first.
    async fn auth_parts(
        &self,
        config: &ApiConfig,
    ) -> Result<(Option<String>, HashMap<String, String>, HashMap<String, String>), ApiError> {
        let mut extra_headers = HashMap::new();
        let mut query = HashMap::new();

        let auth = match &config.auth {
            Some(a) => a,
            None => return Ok((None, extra_headers, query)),
        };

        match auth {
            AuthConfig::None => Ok((None, extra_headers, query)),
            AuthConfig::Header { header_name, token } => {
                extra_headers.insert(header_name.clone(), token.clone());
                Ok((None, extra_headers, query))
            }
            AuthConfig::Query { query_name, token } => {
                query.insert(query_name.clone(), token.clone());
                Ok((None, extra_headers, query))
            }
            AuthConfig::Bearer { token } => Ok((Some(format!("Bearer {token}")), extra_headers, query)),
            AuthConfig::Basic { username, password } => {
                let encoded = base64_encode(&format!("{username}:{password}"));
                Ok((Some(format!("Basic {encoded}")), extra_headers, query))
            }
            AuthConfig::Oauth2ClientCredentials { oauth2 } => {
                let mut form = vec![
                    ("grant_type", "client_credentials".to_string()),
                    ("client_id", oauth2.client_id.clone()),
                    ("client_secret", oauth2.client_secret.clone()),
                ];
                if let Some(ref scope) = oauth2.scope {
                    form.push(("scope", scope.clone()));
                }
                let response = self
                    .http
                    .post(&oauth2.token_url)
                    .form(&form)
                    .send()
                    .await
                    .map_err(|e| ApiError::Oauth2(e.to_string()))?;
                let data: Value = response
                    .json()
                    .await
                    .map_err(|e| ApiError::Oauth2(e.to_string()))?;
                let token = data
                    .get("access_token")
                    .and_then(|t| t.as_str())
                    .ok_or_else(|| ApiError::Oauth2("no access_token in response".to_string()))?;
                Ok((Some(format!("Bearer {token}")), extra_headers, query))
            }
        }
    }
}

impl Default for ApiFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an item through the config's field map and transforms.
pub(crate) fn map_fields(item: &Value, config: &ApiConfig) -> serde_json::Map<String, Value> {
    let mut job = serde_json::Map::new();
    for (target_field, source_path) in &config.map {
        let value = match resolve_value(item, source_path) {
            Some(v) if !v.is_null() => v.clone(),
            _ => continue,
        };
        let value = match config.transforms.get(target_field) {
            Some(t) => apply_transforms(value, t),
            None => value,
        };
        if !value.is_null() {
            job.insert(target_field.clone(), value);
        }
    }
    job
}

fn inject_param(
    method: &str,
    query: &mut HashMap<String, String>,
    body: &mut Option<Value>,
    field: &str,
    value: &str,
) {
    if method == "GET" {
        query.insert(field.to_string(), value.to_string());
    } else if let Some(Value::Object(ref mut map)) = body {
        map.insert(field.to_string(), Value::String(value.to_string()));
    } else {
        query.insert(field.to_string(), value.to_string());
    }
}

pub(crate) fn format_since(config: &SinceConfig, last_success_at: Option<DateTime<Utc>>) -> String {
    let since = last_success_at
        .unwrap_or_else(|| Utc::now() - chrono::Duration::days(config.fallback_days));
    match config.format {
        SinceFormat::Iso8601 => since.to_rfc3339(),
        SinceFormat::Unix => since.timestamp().to_string(),
        SinceFormat::UnixMs => since.timestamp_millis().to_string(),
    }
}

fn extract_cursor(data: &Value, cursor_path: Option<&str>) -> Option<String> {
    if let Some(path) = cursor_path {
        return resolve_value(data, path)
            .filter(|v| !v.is_null())
            .map(value_to_string);
    }
    for key in ["next_cursor", "cursor", "page_token", "next_page", "next_url"] {
        if let Some(v) = data.get(key) {
            if !v.is_null() {
                return Some(value_to_string(v));
            }
        }
    }
    None
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn base64_encode(input: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(input.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn config(raw: &str) -> ApiConfig {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn map_fields_with_transforms() {
        let c = config(
            r#"{
            "v": 1,
            "base_url": "https://api.example.org",
            "map": {
                "title": "position.name",
                "location_raw": "locations",
                "country_iso": "country"
            },
            "transforms": {
                "location_raw": {"join": ", "},
                "country_iso": {"upper": true, "strip": true}
            }
        }"#,
        );

        let item = json!({
            "position": {"name": "WASH Officer"},
            "locations": ["Nairobi", "Kenya"],
            "country": " ke "
        });

        let job = map_fields(&item, &c);
        assert_eq!(job.get("title"), Some(&json!("WASH Officer")));
        assert_eq!(job.get("location_raw"), Some(&json!("Nairobi, Kenya")));
        assert_eq!(job.get("country_iso"), Some(&json!("KE")));
    }

    #[test]
    fn since_uses_fallback_window_without_history() {
        let c: SinceConfig = serde_json::from_str(
            r#"{"enabled": true, "field": "updated_after", "format": "unix", "fallback_days": 7}"#,
        )
        .unwrap();
        let since: i64 = format_since(&c, None).parse().unwrap();
        let expected = (Utc::now() - chrono::Duration::days(7)).timestamp();
        assert!((since - expected).abs() < 5);
    }

    #[test]
    fn since_formats() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let iso: SinceConfig = serde_json::from_str(r#"{"enabled": true}"#).unwrap();
        assert!(format_since(&iso, Some(at)).starts_with("2026-01-02T03:04:05"));

        let unix: SinceConfig =
            serde_json::from_str(r#"{"enabled": true, "format": "unix"}"#).unwrap();
        assert_eq!(format_since(&unix, Some(at)), at.timestamp().to_string());

        let unix_ms: SinceConfig =
            serde_json::from_str(r#"{"enabled": true, "format": "unix_ms"}"#).unwrap();
        assert_eq!(
            format_since(&unix_ms, Some(at)),
            at.timestamp_millis().to_string()
        );
    }

    #[test]
    fn cursor_extraction_common_keys() {
        assert_eq!(
            extract_cursor(&json!({"next_cursor": "abc"}), None),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_cursor(&json!({"meta": {"next": "xyz"}}), Some("meta.next")),
            Some("xyz".to_string())
        );
        assert_eq!(extract_cursor(&json!({"done": true}), None), None);
    }

    #[test]
    fn rejects_wrong_schema_version() {
        let fetcher = ApiFetcher::new();
        let raw = r#"{"v": 2, "base_url": "https://api.example.org"}"#;
        let err = tokio_test_block_on(fetcher.fetch(raw, None, None)).unwrap_err();
        assert!(matches!(err, ApiError::SchemaVersion(Some(2))));
    }

    #[test]
    fn rejects_missing_secret_before_network() {
        let fetcher = ApiFetcher::new();
        let raw = r#"{"v": 1, "base_url": "https://api.example.org",
            "auth": {"type": "bearer", "token": "{{SECRET:AIDJOBS_TEST_NEVER_SET}}"}}"#;
        let err = tokio_test_block_on(fetcher.fetch(raw, None, None)).unwrap_err();
        match err {
            ApiError::MissingSecrets(names) => {
                assert_eq!(names, vec!["AIDJOBS_TEST_NEVER_SET".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn base64_matches_known_vector() {
        assert_eq!(base64_encode("user:pass"), "dXNlcjpwYXNz");
        assert_eq!(base64_encode("a"), "YQ==");
        assert_eq!(base64_encode("ab"), "YWI=");
    }

    fn tokio_test_block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }
}
