use regex::Regex;
use serde_json::Value;

/// Static currency conversion rates for USD normalization.
const CURRENCY_TO_USD: [(&str, f64); 9] = [
    ("USD", 1.0),
    ("EUR", 1.1),
    ("GBP", 1.27),
    ("CHF", 1.13),
    ("INR", 0.012),
    ("KES", 0.0078),
    ("ZAR", 0.055),
    ("CAD", 0.73),
    ("AUD", 0.65),
];

fn usd_rate(currency: &str) -> f64 {
    CURRENCY_TO_USD
        .iter()
        .find(|(code, _)| *code == currency)
        .map(|(_, rate)| *rate)
        .unwrap_or(1.0)
}

/// Robust boolean parsing for strings, numbers, and bools.
pub fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "t" | "y" => Some(true),
            "false" | "no" | "0" | "f" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a contract duration to months. Ranges take the maximum.
pub fn parse_contract_duration(duration: &str) -> Option<u32> {
    let normalized = duration.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    // Ranges first, e.g. "3-6 months".
    let range = Regex::new(r"(\d+)\s*-\s*(\d+)\s*(?:month|mo)").expect("valid regex");
    if let Some(captures) = range.captures(&normalized) {
        return captures[2].parse().ok();
    }

    let months = Regex::new(r"(\d+)\s*(?:month|mo)").expect("valid regex");
    if let Some(captures) = months.captures(&normalized) {
        return captures[1].parse().ok();
    }

    let years = Regex::new(r"(\d+)\s*(?:year|yr)").expect("valid regex");
    if let Some(captures) = years.captures(&normalized) {
        return captures[1].parse::<u32>().ok().map(|y| y * 12);
    }

    None
}

/// Parsed compensation, USD-normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Compensation {
    pub visible: bool,
    pub comp_type: Option<String>,
    pub min_usd: Option<f64>,
    pub max_usd: Option<f64>,
    pub currency: Option<String>,
    pub confidence: f64,
}

impl Compensation {
    fn hidden() -> Self {
        Self {
            visible: false,
            comp_type: None,
            min_usd: None,
            max_usd: None,
            currency: None,
            confidence: 0.0,
        }
    }
}

/// Parse compensation from structured fields (confidence 0.9) or free text
/// (confidence 0.7). Amounts are converted to USD with the static table.
pub fn parse_compensation(text: Option<&str>, fields: Option<&Value>) -> Compensation {
    if let Some(Value::Object(map)) = fields {
        if map.contains_key("min") || map.contains_key("max") {
            let currency = map
                .get("currency")
                .and_then(Value::as_str)
                .unwrap_or("USD")
                .to_string();
            let rate = usd_rate(&currency);
            let min_usd = map.get("min").and_then(value_as_f64).map(|v| v * rate);
            let max_usd = map.get("max").and_then(value_as_f64).map(|v| v * rate);
            let comp_type = map
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("salary")
                .to_string();
            return Compensation {
                visible: true,
                comp_type: Some(comp_type),
                min_usd,
                max_usd,
                currency: Some(currency),
                confidence: 0.9,
            };
        }
    }

    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Compensation::hidden(),
    };

    // Currency from symbols or codes; USD default.
    let currency = detect_currency(text);

    let amount_pattern = Regex::new(r"([\d,]+(?:\.\d{2})?)").expect("valid regex");
    let amounts: Vec<f64> = amount_pattern
        .find_iter(text)
        .take(2)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .collect();

    if amounts.is_empty() {
        return Compensation::hidden();
    }

    let rate = usd_rate(&currency);
    let (min_usd, max_usd) = if amounts.len() >= 2 {
        let lo = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (Some(lo * rate), Some(hi * rate))
    } else {
        (Some(amounts[0] * rate), Some(amounts[0] * rate))
    };

    let lower = text.to_lowercase();
    let comp_type = if Regex::new(r"\b(hour|hourly|hr)\b").unwrap().is_match(&lower) {
        "hourly"
    } else if Regex::new(r"\b(day|daily)\b").unwrap().is_match(&lower) {
        "daily"
    } else if Regex::new(r"\b(month|monthly)\b").unwrap().is_match(&lower) {
        "monthly"
    } else {
        "salary"
    };

    Compensation {
        visible: true,
        comp_type: Some(comp_type.to_string()),
        min_usd,
        max_usd,
        currency: Some(currency),
        confidence: 0.7,
    }
}

fn detect_currency(text: &str) -> String {
    if text.contains('$') {
        return "USD".to_string();
    }
    if text.contains('€') {
        return "EUR".to_string();
    }
    if text.contains('£') {
        return "GBP".to_string();
    }
    if text.contains('₹') {
        return "INR".to_string();
    }
    let code = Regex::new(r"\b(USD|EUR|GBP|INR|CHF|KES|ZAR|CAD|AUD)\b").expect("valid regex");
    code.captures(&text.to_uppercase())
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "USD".to_string())
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").parse().ok(),
        _ => None,
    }
}
