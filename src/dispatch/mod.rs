//! Job trigger dispatch.
//!
//! Changed branch paths are resolved to build jobs through the [`JobMap`] and
//! handed to a [`BuildTrigger`]. [`JenkinsClient`] is the production trigger.

pub mod dispatcher;
pub mod jenkins;
pub mod job_map;
pub mod trigger;

pub use dispatcher::{DispatchOutcome, DispatchReport, Dispatcher};
pub use jenkins::{BasicAuth, JenkinsClient, TriggerError};
pub use job_map::{JobMap, JobMapError};
pub use trigger::BuildTrigger;
