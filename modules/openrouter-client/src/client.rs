use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::types::{strip_code_fences, ChatRequest, ChatResponse};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

/// Max attempts per call for transient failures (network, 5xx, 429).
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum OpenRouterError {
    #[error("OpenRouter request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OpenRouter API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("OpenRouter returned no content")]
    Empty,

    #[error("OpenRouter returned invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("LLM circuit breaker is open")]
    CircuitOpen,
}

impl OpenRouterError {
    fn is_retriable(&self) -> bool {
        match self {
            OpenRouterError::Transport(_) => true,
            OpenRouterError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// OpenRouter chat client. Retries transient failures beneath a sliding
/// window circuit breaker shared across the process.
pub struct OpenRouterClient {
    api_key: String,
    http: reqwest::Client,
    breaker: CircuitBreaker,
}

impl OpenRouterClient {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            http,
            breaker: CircuitBreaker::with_defaults(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn headers(&self) -> Result<HeaderMap, OpenRouterError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
                OpenRouterError::Api {
                    status: 0,
                    message: "invalid API key header".to_string(),
                }
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Send a chat request and return the first choice's content.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, OpenRouterError> {
        if !self.breaker.can_call() {
            return Err(OpenRouterError::CircuitOpen);
        }

        let mut delay = INITIAL_RETRY_DELAY;
        let mut last_error = OpenRouterError::Empty;

        for attempt in 0..MAX_ATTEMPTS {
            match self.chat_once(request).await {
                Ok(content) => {
                    self.breaker.record(false);
                    return Ok(content);
                }
                Err(e) if e.is_retriable() && attempt + 1 < MAX_ATTEMPTS => {
                    let jitter = Duration::from_millis(rand::rng().random_range(0..250));
                    warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "OpenRouter call failed, retrying"
                    );
                    tokio::time::sleep(delay.min(MAX_RETRY_DELAY) + jitter).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                    last_error = e;
                }
                Err(e) => {
                    self.breaker.record(true);
                    return Err(e);
                }
            }
        }

        self.breaker.record(true);
        Err(last_error)
    }

    async fn chat_once(&self, request: &ChatRequest) -> Result<String, OpenRouterError> {
        let url = format!("{OPENROUTER_API_URL}/chat/completions");

        debug!(model = %request.model, "OpenRouter chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OpenRouterError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat_response: ChatResponse = response.json().await?;
        chat_response.content().ok_or(OpenRouterError::Empty)
    }

    /// Send a chat request expecting strict JSON back, tolerating code
    /// fences around the payload.
    pub async fn chat_json(
        &self,
        request: &ChatRequest,
    ) -> Result<serde_json::Value, OpenRouterError> {
        let content = self.chat(request).await?;
        let json = serde_json::from_str(strip_code_fences(&content))?;
        Ok(json)
    }
}
