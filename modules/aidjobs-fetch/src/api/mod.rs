mod config;
mod fetcher;
mod path;
mod transform;

pub use config::{ApiConfig, AuthConfig, ErrorCategory, PaginationConfig, PaginationType, SinceConfig, SinceFormat};
pub use fetcher::{ApiError, ApiFetcher};
pub use path::{resolve_items, resolve_value};
pub use transform::{apply_transforms, TransformConfig};
