use std::collections::{HashMap, HashSet};

use sqlx::PgPool;
use tracing::{info, warn};

/// Read-mostly cache of the taxonomy lookup tables. Loaded once per process
/// and immutable afterwards; readers never lock. Missing or empty tables
/// degrade to hard-coded fallbacks so normalization stays live.
pub struct TaxonomyCache {
    countries: HashMap<String, String>,
    levels: HashSet<String>,
    missions: HashSet<String>,
    modalities: HashSet<String>,
    benefits: HashSet<String>,
    policy_flags: HashSet<String>,
    donors: HashSet<String>,
    /// type -> raw (lowercased) -> canonical key.
    synonyms: HashMap<String, HashMap<String, String>>,
}

impl TaxonomyCache {
    /// Load every lookup table, falling back per-table on failure.
    pub async fn load(pool: &PgPool) -> Self {
        let countries = load_pairs(pool, "SELECT name, code_iso2 FROM countries")
            .await
            .map(|rows| {
                rows.into_iter()
                    .map(|(name, iso)| (name.to_lowercase(), iso))
                    .collect()
            })
            .unwrap_or_else(|| {
                warn!("countries table unavailable, using fallback set");
                fallback_countries()
            });

        let levels = load_keys(pool, "SELECT key FROM levels")
            .await
            .unwrap_or_else(|| fallback_levels());
        let missions = load_keys(pool, "SELECT key FROM missions")
            .await
            .unwrap_or_else(|| fallback_missions());
        let modalities = load_keys(pool, "SELECT key FROM work_modalities")
            .await
            .unwrap_or_else(|| fallback_modalities());
        let benefits = load_keys(pool, "SELECT key FROM benefits")
            .await
            .unwrap_or_default();
        let policy_flags = load_keys(pool, "SELECT key FROM policy_flags")
            .await
            .unwrap_or_default();
        let donors = load_keys(pool, "SELECT key FROM donors")
            .await
            .unwrap_or_default();

        let mut synonyms = load_synonyms(pool).await.unwrap_or_default();
        merge_fallback_synonyms(&mut synonyms);

        info!(
            countries = countries.len(),
            levels = levels.len(),
            missions = missions.len(),
            "Taxonomy cache loaded"
        );

        Self {
            countries,
            levels,
            missions,
            modalities,
            benefits,
            policy_flags,
            donors,
            synonyms,
        }
    }

    /// Cache built purely from the hard-coded fallbacks (no database).
    pub fn fallback() -> Self {
        let mut synonyms = HashMap::new();
        merge_fallback_synonyms(&mut synonyms);
        Self {
            countries: fallback_countries(),
            levels: fallback_levels(),
            missions: fallback_missions(),
            modalities: fallback_modalities(),
            benefits: HashSet::new(),
            policy_flags: HashSet::new(),
            donors: HashSet::new(),
            synonyms,
        }
    }

    /// Country name -> ISO-2 code, by lowercased name.
    pub fn to_iso_country(&self, name: &str) -> Option<&str> {
        if name.trim().is_empty() {
            return None;
        }
        self.countries
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Scan free text for a known country name; longest name wins so
    /// "South Sudan" is not shadowed by "Sudan".
    pub fn find_country_in_text(&self, text: &str) -> Option<(&str, &str)> {
        let lower = text.to_lowercase();
        self.countries
            .iter()
            .filter(|(name, _)| lower.contains(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(name, iso)| (name.as_str(), iso.as_str()))
    }

    /// Normalize a level: synonym map first, then direct membership.
    pub fn norm_level(&self, raw: &str) -> Option<String> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        if let Some(canonical) = self.synonym("level", &normalized) {
            return Some(canonical.to_string());
        }
        self.levels.contains(&normalized).then_some(normalized)
    }

    /// Normalize mission tags: lowercase, `-` -> `_`, synonyms, then
    /// require membership; unknowns dropped.
    pub fn norm_tags(&self, tags: &[String]) -> Vec<String> {
        self.norm_set(tags, &self.missions, Some("mission"))
    }

    pub fn norm_modality(&self, raw: &str) -> Option<String> {
        let original = raw.trim().to_lowercase();
        if original.is_empty() {
            return None;
        }
        if let Some(canonical) = self.synonym("modality", &original) {
            return Some(canonical.to_string());
        }
        let normalized = original.replace(['-', ' '], "_");
        self.modalities.contains(&normalized).then_some(normalized)
    }

    pub fn norm_benefits(&self, raw: &[String]) -> Vec<String> {
        self.norm_set(raw, &self.benefits, None)
    }

    pub fn norm_policy(&self, raw: &[String]) -> Vec<String> {
        self.norm_set(raw, &self.policy_flags, None)
    }

    pub fn norm_donors(&self, raw: &[String]) -> Vec<String> {
        self.norm_set(raw, &self.donors, None)
    }

    fn norm_set(
        &self,
        raw: &[String],
        valid: &HashSet<String>,
        synonym_type: Option<&str>,
    ) -> Vec<String> {
        let mut out = Vec::new();
        for value in raw {
            let original = value.trim().to_lowercase();
            if original.is_empty() {
                continue;
            }
            let mut clean = original.replace(['-', ' '], "_");
            if let Some(syn_type) = synonym_type {
                if let Some(canonical) = self.synonym(syn_type, &original) {
                    clean = canonical.to_string();
                }
            }
            if valid.contains(&clean) && !out.contains(&clean) {
                out.push(clean);
            }
        }
        out
    }

    fn synonym(&self, synonym_type: &str, raw: &str) -> Option<&str> {
        self.synonyms
            .get(synonym_type)
            .and_then(|m| m.get(raw))
            .map(String::as_str)
    }
}

async fn load_keys(pool: &PgPool, query: &str) -> Option<HashSet<String>> {
    match sqlx::query_scalar::<_, String>(query).fetch_all(pool).await {
        Ok(rows) if !rows.is_empty() => Some(rows.into_iter().collect()),
        Ok(_) => None,
        Err(e) => {
            warn!(query, error = %e, "Taxonomy query failed");
            None
        }
    }
}

async fn load_pairs(pool: &PgPool, query: &str) -> Option<Vec<(String, String)>> {
    match sqlx::query_as::<_, (String, String)>(query).fetch_all(pool).await {
        Ok(rows) if !rows.is_empty() => Some(rows),
        Ok(_) => None,
        Err(e) => {
            warn!(query, error = %e, "Taxonomy query failed");
            None
        }
    }
}

async fn load_synonyms(pool: &PgPool) -> Option<HashMap<String, HashMap<String, String>>> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        "SELECT type, raw_value, canonical_key FROM synonyms",
    )
    .fetch_all(pool)
    .await
    .ok()?;

    let mut map: HashMap<String, HashMap<String, String>> = HashMap::new();
    for (synonym_type, raw, canonical) in rows {
        map.entry(synonym_type)
            .or_default()
            .insert(raw.to_lowercase(), canonical);
    }
    Some(map)
}

/// Hard-coded synonyms merged beneath any database-provided ones.
fn merge_fallback_synonyms(synonyms: &mut HashMap<String, HashMap<String, String>>) {
    let fallback: [(&str, &[(&str, &str)]); 3] = [
        (
            "level",
            &[
                ("entry", "junior"),
                ("entry-level", "junior"),
                ("entry level", "junior"),
                ("associate", "junior"),
                ("mid-level", "mid"),
                ("mid level", "mid"),
                ("intermediate", "mid"),
                ("staff", "mid"),
                ("sr", "senior"),
                ("sr.", "senior"),
                ("senior-level", "senior"),
                ("senior level", "senior"),
                ("manager", "senior"),
                ("principal", "lead"),
            ],
        ),
        (
            "mission",
            &[
                ("healthcare", "health"),
                ("medical", "health"),
                ("sanitation", "wash"),
                ("water", "wash"),
                ("human-rights", "human_rights"),
                ("humanrights", "human_rights"),
            ],
        ),
        (
            "modality",
            &[
                ("office", "onsite"),
                ("on-site", "onsite"),
                ("on site", "onsite"),
                ("wfh", "remote"),
                ("work from home", "remote"),
                ("home based", "home_based"),
                ("home-based", "home_based"),
            ],
        ),
    ];

    for (synonym_type, entries) in fallback {
        let map = synonyms.entry(synonym_type.to_string()).or_default();
        for (raw, canonical) in entries {
            map.entry((*raw).to_string())
                .or_insert_with(|| (*canonical).to_string());
        }
    }
}

fn fallback_countries() -> HashMap<String, String> {
    [
        ("afghanistan", "AF"),
        ("bangladesh", "BD"),
        ("congo", "CD"),
        ("ethiopia", "ET"),
        ("france", "FR"),
        ("india", "IN"),
        ("kenya", "KE"),
        ("nigeria", "NG"),
        ("pakistan", "PK"),
        ("somalia", "SO"),
        ("south sudan", "SS"),
        ("sudan", "SD"),
        ("switzerland", "CH"),
        ("syria", "SY"),
        ("uganda", "UG"),
        ("uk", "GB"),
        ("united kingdom", "GB"),
        ("united states", "US"),
        ("yemen", "YE"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn fallback_levels() -> HashSet<String> {
    ["intern", "junior", "mid", "senior", "lead", "executive"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn fallback_missions() -> HashSet<String> {
    [
        "health",
        "education",
        "wash",
        "climate",
        "gender",
        "protection",
        "nutrition",
        "livelihoods",
        "shelter",
        "human_rights",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn fallback_modalities() -> HashSet<String> {
    ["remote", "home_based", "hybrid", "onsite", "field", "flexible"]
        .into_iter()
        .map(String::from)
        .collect()
}
