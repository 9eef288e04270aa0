pub mod error;
pub mod extractor;
pub mod input;
pub mod ledger;
pub mod scout;

pub use error::{ExtractError, LedgerError, ScoutError};
pub use scout::{RunSummary, Scout, ScoutOptions};
