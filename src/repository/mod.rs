//! Collaborator interfaces and their storage implementations.
//!
//! The orchestrator only sees the traits below. `SqliteStore` is the
//! persistent implementation (Diesel over SQLite, blocking calls wrapped in
//! `spawn_blocking`); `MemoryStore` backs tests and offline commands.

pub mod diesel_models;
pub mod diesel_pool;
pub mod env_credentials;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Credentials, JobCounters, JobStatus, ScrapeJob, ScrapeOutcome, ScrapeResult,
    SubjectListEntry, SubjectRecord,
};

pub use env_credentials::EnvCredentialProvider;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors from a storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job not found: {0}")]
    JobNotFound(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<diesel_pool::R2D2Error> for StoreError {
    fn from(e: diesel_pool::R2D2Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Parse a stored RFC 3339 timestamp, falling back to now for corrupt rows.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Supplies the credential set used to log in.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_active_credentials(&self) -> Result<Option<Credentials>, StoreError>;

    /// Stamp the last-used marker after a successful login.
    async fn mark_used(&self, credentials: &Credentials) -> Result<(), StoreError>;
}

/// Latest extracted record per subject.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert or replace the stored record. Idempotent.
    async fn upsert_subject_record(
        &self,
        subject_id: &str,
        record: &SubjectRecord,
    ) -> Result<(), StoreError>;

    async fn get_subject_record(&self, subject_id: &str)
        -> Result<Option<SubjectRecord>, StoreError>;
}

/// Append-only per-subject outcomes.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append one outcome, returning the new row id.
    async fn append_result(
        &self,
        job_id: &str,
        subject_id: &str,
        outcome: &ScrapeOutcome,
    ) -> Result<i64, StoreError>;

    /// Results of a job in insertion order.
    async fn list_results(&self, job_id: &str) -> Result<Vec<ScrapeResult>, StoreError>;
}

/// Persisted job state; the only externally visible view of a running job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a pending job and return its id.
    async fn create_job(
        &self,
        subject_ids: &[String],
        incremental: bool,
    ) -> Result<String, StoreError>;

    async fn update_job_progress(
        &self,
        job_id: &str,
        counters: &JobCounters,
    ) -> Result<(), StoreError>;

    async fn set_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<ScrapeJob>, StoreError>;
}

/// Scraping health per subject id.
#[async_trait]
pub trait SubjectListStore: Send + Sync {
    async fn get_subject_health(
        &self,
        subject_id: &str,
    ) -> Result<Option<SubjectListEntry>, StoreError>;

    async fn update_subject_health(&self, entry: &SubjectListEntry) -> Result<(), StoreError>;

    /// Re-enable a deactivated subject. Returns false when the id is unknown.
    async fn reactivate_subject(&self, subject_id: &str) -> Result<bool, StoreError>;

    /// Ids currently marked active, in id order.
    async fn active_subject_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// Everything the orchestrator needs from storage.
pub trait ScrapeStore: RecordSink + ResultSink + JobStore + SubjectListStore {}

impl<T: RecordSink + ResultSink + JobStore + SubjectListStore> ScrapeStore for T {}
