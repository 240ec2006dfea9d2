//! Per-subject progress messages.

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::{JobCounters, ResultStatus};

/// How one subject ended within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectOutcome {
    Succeeded,
    Failed,
    Skipped,
}

impl From<ResultStatus> for SubjectOutcome {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Success => SubjectOutcome::Succeeded,
            ResultStatus::Failed => SubjectOutcome::Failed,
        }
    }
}

/// Emitted after every subject, once its result and counters are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job_id: String,
    pub subject_id: String,
    pub outcome: SubjectOutcome,
    pub counters: JobCounters,
    pub total: usize,
}

/// Optional listener for progress messages.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<JobProgress>>,
}

impl ProgressReporter {
    /// A reporter that drops every message.
    pub fn silent() -> Self {
        Self::default()
    }

    /// A reporter plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, progress: JobProgress) {
        if let Some(tx) = &self.tx {
            if tx.send(progress).is_err() {
                debug!("progress receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (reporter, mut rx) = ProgressReporter::channel();
        for (i, id) in ["a", "b"].iter().enumerate() {
            reporter.emit(JobProgress {
                job_id: "job".into(),
                subject_id: id.to_string(),
                outcome: SubjectOutcome::Succeeded,
                counters: JobCounters {
                    processed: i as u32 + 1,
                    succeeded: i as u32 + 1,
                    ..Default::default()
                },
                total: 2,
            });
        }
        assert_eq!(rx.recv().await.unwrap().subject_id, "a");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.subject_id, "b");
        assert_eq!(second.counters.processed, 2);
    }

    #[test]
    fn test_silent_reporter_ignores_messages() {
        ProgressReporter::silent().emit(JobProgress {
            job_id: "job".into(),
            subject_id: "a".into(),
            outcome: SubjectOutcome::Skipped,
            counters: JobCounters::default(),
            total: 1,
        });
    }
}
