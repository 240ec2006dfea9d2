//! Error taxonomy for the extraction pipeline.
//!
//! Setup-phase errors (`Launch`, `NoCredentials`, `LoginFailed`) abort a job.
//! Everything else is scoped to a single subject and becomes a failed result.

use std::time::Duration;

use thiserror::Error;

use crate::models::JobStatus;
use crate::repository::StoreError;

/// Errors raised by the session controller, extractors and orchestrator.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("No active credentials configured")]
    NoCredentials,

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("Browser error: {0}")]
    Driver(String),

    #[error("Session is not initialized")]
    NotInitialized,

    #[error("Job {job_id} is {status}, not pending")]
    JobNotPending { job_id: String, status: JobStatus },
}

impl ScrapeError {
    /// Whether this error must abort the whole job rather than a single subject.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScrapeError::Launch(_)
                | ScrapeError::NoCredentials
                | ScrapeError::LoginFailed(_)
                | ScrapeError::NotInitialized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_are_fatal() {
        assert!(ScrapeError::Launch("no chrome".into()).is_fatal());
        assert!(ScrapeError::NoCredentials.is_fatal());
        assert!(ScrapeError::LoginFailed("bad password".into()).is_fatal());
    }

    #[test]
    fn test_job_not_pending_message() {
        let e = ScrapeError::JobNotPending {
            job_id: "j1".into(),
            status: JobStatus::Completed,
        };
        assert_eq!(e.to_string(), "Job j1 is completed, not pending");
    }

    #[test]
    fn test_subject_errors_are_recoverable() {
        let timeout = ScrapeError::NavigationTimeout {
            url: "https://example.com/donors/1".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(!timeout.is_fatal());
        assert!(!ScrapeError::Extraction("page not found".into()).is_fatal());
        assert!(!ScrapeError::Driver("socket closed".into()).is_fatal());
        assert!(
            !ScrapeError::Persistence(StoreError::Database("locked".into())).is_fatal()
        );
    }
}
