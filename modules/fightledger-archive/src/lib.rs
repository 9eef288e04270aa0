pub mod error;
pub mod store;

pub use error::{ArchiveError, Result};
pub use store::{DocumentStore, StoreOutcome};
