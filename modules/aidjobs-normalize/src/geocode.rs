use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Markers that mean the posting is remote rather than placed.
const REMOTE_MARKERS: [&str; 5] = ["remote", "home-based", "home based", "telecommute", "anywhere"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoResult {
    pub country: Option<String>,
    pub country_iso: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_remote: bool,
    /// "nominatim", "google", or "cache".
    pub source: Option<String>,
}

/// Disk-cached geocoder: Nominatim first, optional Google fallback.
/// Best-effort; lookup failures return an empty result.
pub struct Geocoder {
    http: reqwest::Client,
    cache_path: PathBuf,
    cache: Mutex<HashMap<String, GeoResult>>,
    google_api_key: Option<String>,
}

impl Geocoder {
    pub async fn new(cache_path: impl Into<PathBuf>, google_api_key: Option<String>) -> Self {
        let cache_path = cache_path.into();
        let cache = load_cache(&cache_path).await;
        let http = reqwest::Client::builder()
            .user_agent("AidJobs/1.0 (geocoding; +https://aidjobs.app)")
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            cache_path,
            cache: Mutex::new(cache),
            google_api_key,
        }
    }

    /// Geocode a raw location string. Remote markers short-circuit.
    pub async fn geocode(&self, location_raw: &str) -> GeoResult {
        let trimmed = location_raw.trim();
        if trimmed.is_empty() {
            return GeoResult::default();
        }

        let lower = trimmed.to_lowercase();
        if REMOTE_MARKERS.iter().any(|m| lower.contains(m)) {
            return GeoResult {
                is_remote: true,
                ..Default::default()
            };
        }

        let cache_key = lower.clone();
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&cache_key) {
                debug!(location = trimmed, "Geocode cache hit");
                let mut result = cached.clone();
                result.source = Some("cache".to_string());
                return result;
            }
        }

        let mut result = self.nominatim(trimmed).await;
        if result.is_none() {
            if let Some(ref key) = self.google_api_key {
                result = self.google(trimmed, key).await;
            }
        }

        let result = result.unwrap_or_default();
        if result.latitude.is_some() {
            let mut cache = self.cache.lock().await;
            cache.insert(cache_key, result.clone());
            persist_cache(&self.cache_path, &cache).await;
        }
        result
    }

    async fn nominatim(&self, location: &str) -> Option<GeoResult> {
        let response = self
            .http
            .get("https://nominatim.openstreetmap.org/search")
            .query(&[
                ("q", location),
                ("format", "json"),
                ("limit", "1"),
                ("addressdetails", "1"),
            ])
            .send()
            .await
            .ok()?;

        let results: Vec<serde_json::Value> = response.json().await.ok()?;
        let hit = results.first()?;

        let address = hit.get("address");
        Some(GeoResult {
            country: address
                .and_then(|a| a.get("country"))
                .and_then(|v| v.as_str())
                .map(String::from),
            country_iso: address
                .and_then(|a| a.get("country_code"))
                .and_then(|v| v.as_str())
                .map(|c| c.to_uppercase()),
            city: address
                .and_then(|a| a.get("city").or_else(|| a.get("town")).or_else(|| a.get("village")))
                .and_then(|v| v.as_str())
                .map(String::from),
            latitude: hit.get("lat").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()),
            longitude: hit.get("lon").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()),
            is_remote: false,
            source: Some("nominatim".to_string()),
        })
    }

    async fn google(&self, location: &str, api_key: &str) -> Option<GeoResult> {
        let response = self
            .http
            .get("https://maps.googleapis.com/maps/api/geocode/json")
            .query(&[("address", location), ("key", api_key)])
            .send()
            .await
            .ok()?;

        let data: serde_json::Value = response.json().await.ok()?;
        let hit = data.get("results")?.as_array()?.first()?;
        let geometry = hit.get("geometry")?.get("location")?;

        let mut country = None;
        let mut country_iso = None;
        let mut city = None;
        if let Some(components) = hit.get("address_components").and_then(|v| v.as_array()) {
            for component in components {
                let types: Vec<&str> = component
                    .get("types")
                    .and_then(|t| t.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
                    .unwrap_or_default();
                if types.contains(&"country") {
                    country = component.get("long_name").and_then(|v| v.as_str()).map(String::from);
                    country_iso =
                        component.get("short_name").and_then(|v| v.as_str()).map(String::from);
                }
                if types.contains(&"locality") {
                    city = component.get("long_name").and_then(|v| v.as_str()).map(String::from);
                }
            }
        }

        Some(GeoResult {
            country,
            country_iso,
            city,
            latitude: geometry.get("lat").and_then(|v| v.as_f64()),
            longitude: geometry.get("lng").and_then(|v| v.as_f64()),
            is_remote: false,
            source: Some("google".to_string()),
        })
    }
}

async fn load_cache(path: &PathBuf) -> HashMap<String, GeoResult> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => HashMap::new(),
    }
}

async fn persist_cache(path: &PathBuf, cache: &HashMap<String, GeoResult>) {
    if let Some(parent) = path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    match serde_json::to_vec(cache) {
        Ok(bytes) => {
            if let Err(e) = tokio::fs::write(path, bytes).await {
                warn!(path = %path.display(), error = %e, "Failed to persist geocode cache");
            }
        }
        Err(e) => warn!(error = %e, "Failed to serialize geocode cache"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remote_markers_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let geocoder = Geocoder::new(dir.path().join("geo.json"), None).await;
        let result = geocoder.geocode("Remote (global)").await;
        assert!(result.is_remote);
        assert!(result.latitude.is_none());

        let result = geocoder.geocode("Home-based, with travel").await;
        assert!(result.is_remote);
    }

    #[tokio::test]
    async fn empty_location_is_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let geocoder = Geocoder::new(dir.path().join("geo.json"), None).await;
        let result = geocoder.geocode("   ").await;
        assert!(!result.is_remote);
        assert!(result.country.is_none());
    }

    #[tokio::test]
    async fn cache_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.json");

        let mut cache = HashMap::new();
        cache.insert(
            "nairobi, kenya".to_string(),
            GeoResult {
                country: Some("Kenya".to_string()),
                country_iso: Some("KE".to_string()),
                city: Some("Nairobi".to_string()),
                latitude: Some(-1.286),
                longitude: Some(36.817),
                is_remote: false,
                source: Some("nominatim".to_string()),
            },
        );
        persist_cache(&path, &cache).await;

        let geocoder = Geocoder::new(&path, None).await;
        let result = geocoder.geocode("Nairobi, Kenya").await;
        assert_eq!(result.country_iso.as_deref(), Some("KE"));
        assert_eq!(result.source.as_deref(), Some("cache"));
    }
}
