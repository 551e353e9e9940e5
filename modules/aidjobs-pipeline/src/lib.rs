pub mod ai_fallback;
pub mod classifier;
pub mod dates;
pub mod extractor;
pub mod field;
pub mod heuristics;
pub mod jsonld;
pub mod meta;
pub mod plugins;
pub mod regex_fallback;
pub mod result;
pub mod snapshot;

pub use extractor::{Extractor, PageExtraction};
pub use field::{FieldResult, FieldSource, FieldValue};
pub use plugins::{JobPlugin, PluginRegistry, PluginResult, RawJob};
pub use result::ExtractionResult;
pub use snapshot::SnapshotStore;

/// Version stamped into snapshots and extraction results.
pub const PIPELINE_VERSION: &str = "1.0.0";
