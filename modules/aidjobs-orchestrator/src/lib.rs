pub mod admin;
pub mod cadence;
pub mod enrich_worker;
pub mod link_validator;
pub mod orchestrator;

pub use admin::AdminOps;
pub use cadence::compute_cadence_days;
pub use enrich_worker::EnrichWorker;
pub use link_validator::LinkValidator;
pub use orchestrator::{Orchestrator, OrchestratorDeps};
