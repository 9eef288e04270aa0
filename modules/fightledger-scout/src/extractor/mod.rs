//! Raw stats page -> typed records. Read-only and deterministic: the same
//! document always yields the same records.

pub mod cells;
pub mod events;
pub mod profile;

pub use events::{extract_events, EventBatch};
pub use profile::extract_profile;
