//! Bulk scrape job and its counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate progress counters. Only ever increase during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl JobCounters {
    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    pub fn record_skip(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }
}

/// One bulk run over an ordered list of subject ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: String,
    pub subject_ids: Vec<String>,
    pub incremental: bool,
    pub status: JobStatus,
    pub counters: JobCounters,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScrapeJob {
    /// Create a pending job.
    pub fn new(subject_ids: Vec<String>, incremental: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_ids,
            incremental,
            status: JobStatus::Pending,
            counters: JobCounters::default(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Apply a status transition, stamping start/finish times.
    pub fn transition(&mut self, status: JobStatus, error: Option<String>) {
        let now = Utc::now();
        if status == JobStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if status.is_terminal() {
            self.finished_at = Some(now);
        }
        self.status = status;
        self.error = error;
    }

    /// Subject ids not yet accounted for by the counters.
    pub fn remaining(&self) -> usize {
        self.subject_ids
            .len()
            .saturating_sub(self.counters.processed as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = ScrapeJob::new(vec!["a".into(), "b".into()], false);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.counters, JobCounters::default());
        assert_eq!(job.remaining(), 2);
    }

    #[test]
    fn test_transition_stamps_times() {
        let mut job = ScrapeJob::new(vec!["a".into()], false);
        job.transition(JobStatus::Running, None);
        assert!(job.started_at.is_some());
        assert!(job.finished_at.is_none());

        job.transition(JobStatus::Completed, None);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_counters_processed_tracks_every_outcome() {
        let mut c = JobCounters::default();
        c.record_success();
        c.record_failure();
        c.record_skip();
        assert_eq!(c.processed, 3);
        assert_eq!(c.succeeded, 1);
        assert_eq!(c.failed, 1);
        assert_eq!(c.skipped, 1);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::from_str("cancelled"), None);
    }
}
