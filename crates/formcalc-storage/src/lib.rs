//! Submission storage for formcalc.
//!
//! Provides the [`SubmissionStore`] trait the calculation pipeline depends on,
//! an in-memory implementation ([`MemoryStore`]) and a directory of JSON
//! files ([`JsonFileStore`]).

pub mod error;
pub mod json;
pub mod memory;
pub mod traits;

// Re-exports for convenience.
pub use error::StoreError;
pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use traits::SubmissionStore;
