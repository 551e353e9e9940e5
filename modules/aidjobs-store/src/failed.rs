use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;

/// Values in the logged payload are truncated to this many chars.
const PAYLOAD_VALUE_LIMIT: usize = 200;

/// Records insertion failures to the `extraction_logs` collaborator table
/// so reviewers can resolve them later.
#[derive(Clone)]
pub struct FailedInsertLog {
    pool: PgPool,
}

impl FailedInsertLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write one failed-insert row with a redacted payload snapshot.
    pub async fn record(&self, source_url: &str, operation: &str, error: &str, payload: &Value) {
        let redacted = redact_payload(payload);

        let result = sqlx::query(
            r#"
            INSERT INTO extraction_logs (source_url, operation, error, payload, resolved, created_at)
            VALUES ($1, $2, $3, $4, FALSE, NOW())
            "#,
        )
        .bind(source_url)
        .bind(operation)
        .bind(error)
        .bind(redacted)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(source_url, error = %e, "Failed to record extraction failure");
        }
    }
}

/// Flatten a payload to string values capped at 200 chars each.
pub(crate) fn redact_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (
                        key.clone(),
                        Value::String(rendered.chars().take(PAYLOAD_VALUE_LIMIT).collect()),
                    )
                })
                .collect(),
        ),
        other => {
            let rendered = other.to_string();
            Value::String(rendered.chars().take(PAYLOAD_VALUE_LIMIT).collect())
        }
    }
}
