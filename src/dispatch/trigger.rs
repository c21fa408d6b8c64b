//! The build system seam.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;

use crate::types::JobId;

/// Starts builds on an external build system.
///
/// The dispatcher only needs two things from the build system: the set of
/// jobs it knows about (if it exposes one) and a way to start one. Tests
/// substitute a recording fake.
pub trait BuildTrigger {
    /// The error type returned by this trigger.
    type Error: fmt::Display + Send;

    /// Returns the jobs the build system knows about, or `None` if it has no
    /// registry to consult.
    fn known_jobs(&self)
    -> impl Future<Output = Result<Option<HashSet<JobId>>, Self::Error>> + Send;

    /// Starts one build of `job`.
    fn trigger(&self, job: &JobId) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
