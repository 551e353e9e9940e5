pub mod ai_normalizer;
pub mod geocode;
pub mod keywords;
pub mod normalizer;
pub mod parse;
pub mod quality;
pub mod taxonomy;
pub mod unknowns;

pub use ai_normalizer::AiNormalizer;
pub use geocode::{GeoResult, Geocoder};
pub use normalizer::{canonical_hash, parse_deadline, Normalizer, RawRecord};
pub use parse::{parse_compensation, parse_contract_duration, to_bool, Compensation};
pub use quality::QualityScorer;
pub use taxonomy::TaxonomyCache;
pub use unknowns::{capture_unknowns, UnknownValue};
