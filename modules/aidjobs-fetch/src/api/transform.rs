use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Per-field transform list from the v1 config. Applied in a fixed order:
/// array transforms (first/join), string case/strip, map_table, default,
/// date_parse. Errors fall back to the original value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub lower: Option<bool>,
    #[serde(default)]
    pub upper: Option<bool>,
    #[serde(default)]
    pub strip: Option<bool>,
    #[serde(default)]
    pub join: Option<JoinConfig>,
    #[serde(default)]
    pub first: Option<bool>,
    #[serde(default)]
    pub map_table: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub date_parse: Option<DateParseFormat>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JoinConfig {
    Separator(String),
    Config { separator: Option<String> },
}

impl JoinConfig {
    fn separator(&self) -> &str {
        match self {
            JoinConfig::Separator(s) => s,
            JoinConfig::Config { separator } => separator.as_deref().unwrap_or(","),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateParseFormat {
    Iso8601,
    Unix,
    UnixMs,
}

pub fn apply_transforms(value: Value, config: &TransformConfig) -> Value {
    let original = value.clone();

    // Array transforms first.
    let mut value = value;
    if let Value::Array(ref items) = value {
        if config.first == Some(true) {
            value = items.first().cloned().unwrap_or(Value::Null);
        } else if let Some(ref join) = config.join {
            let joined = items
                .iter()
                .filter(|v| !v.is_null())
                .map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(join.separator());
            value = Value::String(joined);
        }
    }

    // Case/strip need a string; coerce scalars when requested.
    if config.lower == Some(true) || config.upper == Some(true) || config.strip == Some(true) {
        if !value.is_string() && !value.is_null() {
            value = Value::String(scalar_to_string(&value));
        }
        if let Value::String(s) = &value {
            let mut s = s.clone();
            if config.lower == Some(true) {
                s = s.to_lowercase();
            }
            if config.upper == Some(true) {
                s = s.to_uppercase();
            }
            if config.strip == Some(true) {
                s = s.trim().to_string();
            }
            value = Value::String(s);
        }
    }

    if let Some(ref table) = config.map_table {
        let key = scalar_to_string(&original);
        if let Some(mapped) = table.get(&key) {
            return mapped.clone();
        }
        if let Value::String(s) = &value {
            if let Some(mapped) = table.get(s) {
                return mapped.clone();
            }
        }
    }

    if let Some(ref default) = config.default {
        let is_empty = match &value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        };
        if is_empty {
            return default.clone();
        }
    }

    if let Some(format) = config.date_parse {
        match parse_date(&value, format) {
            Some(dt) => return Value::String(dt.to_rfc3339()),
            None => {
                warn!(value = %value, "Date parse failed, keeping original value");
                return value;
            }
        }
    }

    value
}

fn parse_date(value: &Value, format: DateParseFormat) -> Option<DateTime<Utc>> {
    match format {
        DateParseFormat::Iso8601 => {
            let s = value.as_str()?;
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|ndt| Utc.from_utc_datetime(&ndt))
                })
        }
        DateParseFormat::Unix => {
            let secs = value_as_i64(value)?;
            Utc.timestamp_opt(secs, 0).single()
        }
        DateParseFormat::UnixMs => {
            let ms = value_as_i64(value)?;
            Utc.timestamp_millis_opt(ms).single()
        }
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(raw: &str) -> TransformConfig {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn lower_strip() {
        let c = config(r#"{"lower": true, "strip": true}"#);
        assert_eq!(
            apply_transforms(json!("  Kenya "), &c),
            json!("kenya")
        );
    }

    #[test]
    fn join_with_separator_string() {
        let c = config(r#"{"join": ", "}"#);
        assert_eq!(
            apply_transforms(json!(["Nairobi", "Kenya"]), &c),
            json!("Nairobi, Kenya")
        );
    }

    #[test]
    fn join_with_separator_object() {
        let c = config(r#"{"join": {"separator": " | "}}"#);
        assert_eq!(
            apply_transforms(json!(["a", "b"]), &c),
            json!("a | b")
        );
    }

    #[test]
    fn first_takes_head() {
        let c = config(r#"{"first": true}"#);
        assert_eq!(apply_transforms(json!(["x", "y"]), &c), json!("x"));
        assert_eq!(apply_transforms(json!([]), &c), Value::Null);
    }

    #[test]
    fn map_table_maps_raw_value() {
        let c = config(r#"{"map_table": {"FT": "full_time", "PT": "part_time"}}"#);
        assert_eq!(apply_transforms(json!("FT"), &c), json!("full_time"));
        assert_eq!(apply_transforms(json!("XX"), &c), json!("XX"));
    }

    #[test]
    fn default_fills_empty() {
        let c = config(r#"{"default": "Remote"}"#);
        assert_eq!(apply_transforms(Value::Null, &c), json!("Remote"));
        assert_eq!(apply_transforms(json!(""), &c), json!("Remote"));
        assert_eq!(apply_transforms(json!("Geneva"), &c), json!("Geneva"));
    }

    #[test]
    fn date_parse_unix() {
        let c = config(r#"{"date_parse": "unix"}"#);
        let out = apply_transforms(json!(1700000000), &c);
        assert!(out.as_str().unwrap().starts_with("2023-11-14"));
    }

    #[test]
    fn date_parse_unix_ms() {
        let c = config(r#"{"date_parse": "unix_ms"}"#);
        let out = apply_transforms(json!("1700000000000"), &c);
        assert!(out.as_str().unwrap().starts_with("2023-11-14"));
    }

    #[test]
    fn date_parse_iso8601_and_bare_date() {
        let c = config(r#"{"date_parse": "iso8601"}"#);
        let out = apply_transforms(json!("2026-02-15T10:00:00Z"), &c);
        assert!(out.as_str().unwrap().starts_with("2026-02-15"));

        let out = apply_transforms(json!("2026-02-15"), &c);
        assert!(out.as_str().unwrap().starts_with("2026-02-15"));
    }

    #[test]
    fn failed_date_parse_keeps_original() {
        let c = config(r#"{"date_parse": "iso8601"}"#);
        assert_eq!(apply_transforms(json!("soon"), &c), json!("soon"));
    }
}
