//! donorscrape: donor-registry profile extraction with change tracking.
//!
//! A job logs into the registry once, walks its subject ids in order,
//! extracts a structured [`models::SubjectRecord`] from each profile page,
//! diffs it against the stored snapshot and records a per-subject result.
//! One broken profile never aborts the batch.

pub mod browser;
pub mod config;
pub mod diff;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod models;
pub mod repository;
pub mod schema;
pub mod sections;

pub use config::Settings;
pub use error::ScrapeError;
pub use jobs::{CancelFlag, JobOrchestrator, JobProgress, ProgressReporter};
