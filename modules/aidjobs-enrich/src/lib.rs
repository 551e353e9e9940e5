pub mod canonical;
pub mod engine;
pub mod rules;

pub use canonical::{
    is_meal_role, is_operational_role, CANONICAL_EXPERIENCE_LEVELS, CANONICAL_FUNCTIONAL_ROLES,
    CANONICAL_IMPACT_DOMAINS,
};
pub use engine::{EnrichmentEngine, EnrichmentInput};
pub use rules::{apply_enrichment_rules, validate_enrichment};
