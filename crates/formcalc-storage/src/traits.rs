//! The storage trait the calculation pipeline is written against.

use formcalc_core::Submission;

use crate::error::Result;

/// Loads and saves submissions by identifier.
///
/// Consumers depend on this trait rather than a concrete backend so the
/// pipeline can run against files, memory, or a host application's store.
pub trait SubmissionStore {
    /// Load the submission with the given id.
    fn load(&self, id: &str) -> Result<Submission>;

    /// Create or replace the submission with the given id.
    fn save(&self, id: &str, submission: &Submission) -> Result<()>;

    /// Returns `true` if a submission with the given id exists.
    fn exists(&self, id: &str) -> Result<bool>;
}
