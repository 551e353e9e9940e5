use sha2::{Digest, Sha256};

/// Full SHA-256 hex digest of arbitrary content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex_encode(&hasher.finalize())
}

/// 16-hex-char prefix of SHA-256, used for canonical identities.
pub fn short_hash(content: &str) -> String {
    content_hash(content)[..16].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Normalize an apply URL for per-page uniqueness comparison:
/// strip the trailing slash, fragment, and query string.
pub fn normalize_apply_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    without_query.trim_end_matches('/').to_string()
}

/// Domain of a URL with any leading `www.` removed. Falls back to the raw
/// input when it does not parse.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Truncate a crawl-log message to the storage limit, on a char boundary.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_16_hex() {
        let h = short_hash("undp.org/careers/p/123");
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }

    #[test]
    fn normalize_collapses_url_variants() {
        let variants = [
            "https://example.org/p/123",
            "https://example.org/p/123/",
            "https://example.org/p/123?src=rss",
            "https://example.org/p/123#top",
        ];
        let normalized: Vec<String> =
            variants.iter().map(|u| normalize_apply_url(u)).collect();
        assert!(normalized.iter().all(|n| n == "https://example.org/p/123"));
    }

    #[test]
    fn extract_domain_strips_www() {
        assert_eq!(extract_domain("https://www.undp.org/jobs"), "undp.org");
        assert_eq!(extract_domain("https://careers.un.org/x"), "careers.un.org");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let msg = "é".repeat(600);
        let truncated = truncate_message(&msg, 500);
        assert_eq!(truncated.chars().count(), 500);
    }
}
