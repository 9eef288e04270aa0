pub mod config;
pub mod content;
pub mod layout;
pub mod types;

pub use config::{ConfigError, FetchConfig, FileConfig, RunConfig};
pub use content::{artifact_key, content_hash, sanitize_name};
pub use layout::DataLayout;
pub use types::*;
