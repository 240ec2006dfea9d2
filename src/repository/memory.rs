//! In-process store implementing every collaborator trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    CredentialProvider, JobStore, RecordSink, ResultSink, StoreError, SubjectListStore,
};
use crate::models::{
    Credentials, JobCounters, JobStatus, ScrapeJob, ScrapeOutcome, ScrapeResult,
    SubjectListEntry, SubjectRecord,
};

#[derive(Debug, Default)]
struct MemoryState {
    credentials: Option<Credentials>,
    records: HashMap<String, SubjectRecord>,
    results: Vec<ScrapeResult>,
    jobs: HashMap<String, ScrapeJob>,
    subjects: HashMap<String, SubjectListEntry>,
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds an active credential set.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState {
                credentials: Some(credentials),
                ..Default::default()
            })),
        }
    }

    pub async fn set_credentials(&self, credentials: Option<Credentials>) {
        self.state.write().await.credentials = credentials;
    }

    /// Number of stored result rows across all jobs.
    pub async fn result_count(&self) -> usize {
        self.state.read().await.results.len()
    }
}

#[async_trait]
impl CredentialProvider for MemoryStore {
    async fn get_active_credentials(&self) -> Result<Option<Credentials>, StoreError> {
        Ok(self.state.read().await.credentials.clone())
    }

    async fn mark_used(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(active) = state
            .credentials
            .as_mut()
            .filter(|c| c.identity == credentials.identity)
        {
            active.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSink for MemoryStore {
    async fn upsert_subject_record(
        &self,
        subject_id: &str,
        record: &SubjectRecord,
    ) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .records
            .insert(subject_id.to_string(), record.clone());
        Ok(())
    }

    async fn get_subject_record(
        &self,
        subject_id: &str,
    ) -> Result<Option<SubjectRecord>, StoreError> {
        Ok(self.state.read().await.records.get(subject_id).cloned())
    }
}

#[async_trait]
impl ResultSink for MemoryStore {
    async fn append_result(
        &self,
        job_id: &str,
        subject_id: &str,
        outcome: &ScrapeOutcome,
    ) -> Result<i64, StoreError> {
        let mut state = self.state.write().await;
        let id = state.results.len() as i64 + 1;
        state.results.push(ScrapeResult {
            id,
            job_id: job_id.to_string(),
            subject_id: subject_id.to_string(),
            outcome: outcome.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_results(&self, job_id: &str) -> Result<Vec<ScrapeResult>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .results
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(
        &self,
        subject_ids: &[String],
        incremental: bool,
    ) -> Result<String, StoreError> {
        let job = ScrapeJob::new(subject_ids.to_vec(), incremental);
        let id = job.id.clone();
        self.state.write().await.jobs.insert(id.clone(), job);
        Ok(id)
    }

    async fn update_job_progress(
        &self,
        job_id: &str,
        counters: &JobCounters,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        job.counters = *counters;
        Ok(())
    }

    async fn set_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        job.transition(status, error.map(str::to_string));
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<ScrapeJob>, StoreError> {
        Ok(self.state.read().await.jobs.get(job_id).cloned())
    }
}

#[async_trait]
impl SubjectListStore for MemoryStore {
    async fn get_subject_health(
        &self,
        subject_id: &str,
    ) -> Result<Option<SubjectListEntry>, StoreError> {
        Ok(self.state.read().await.subjects.get(subject_id).cloned())
    }

    async fn update_subject_health(&self, entry: &SubjectListEntry) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .subjects
            .insert(entry.subject_id.clone(), entry.clone());
        Ok(())
    }

    async fn reactivate_subject(&self, subject_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.subjects.get_mut(subject_id) {
            Some(entry) => {
                entry.reactivate();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_subject_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .state
            .read()
            .await
            .subjects
            .values()
            .filter(|e| e.active)
            .map(|e| e.subject_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_lifecycle() {
        let store = MemoryStore::new();
        let id = store
            .create_job(&["a".to_string(), "b".to_string()], false)
            .await
            .unwrap();

        let job = store.get_job(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let mut counters = JobCounters::default();
        counters.record_success();
        store.update_job_progress(&id, &counters).await.unwrap();
        store.set_job_status(&id, JobStatus::Completed, None).await.unwrap();

        let job = store.get_job(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.counters.processed, 1);
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_job_is_an_error() {
        let store = MemoryStore::new();
        let err = store
            .set_job_status("missing", JobStatus::Running, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_results_are_scoped_to_job() {
        let store = MemoryStore::new();
        store
            .append_result("job-1", "a", &ScrapeOutcome::failure("boom"))
            .await
            .unwrap();
        store
            .append_result("job-2", "b", &ScrapeOutcome::failure("boom"))
            .await
            .unwrap();
        let results = store.list_results("job-1").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].subject_id, "a");
    }

    #[tokio::test]
    async fn test_reactivate_and_active_ids() {
        let store = MemoryStore::new();
        let mut entry = SubjectListEntry::new("b");
        entry.active = false;
        store.update_subject_health(&entry).await.unwrap();
        store
            .update_subject_health(&SubjectListEntry::new("a"))
            .await
            .unwrap();

        assert_eq!(store.active_subject_ids().await.unwrap(), vec!["a"]);
        assert!(store.reactivate_subject("b").await.unwrap());
        assert!(!store.reactivate_subject("zzz").await.unwrap());
        assert_eq!(store.active_subject_ids().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_mark_used_stamps_active_credentials() {
        let store = MemoryStore::with_credentials(Credentials::new("ops", "pw"));
        let creds = store.get_active_credentials().await.unwrap().unwrap();
        assert!(creds.last_used_at.is_none());
        store.mark_used(&creds).await.unwrap();
        let creds = store.get_active_credentials().await.unwrap().unwrap();
        assert!(creds.last_used_at.is_some());
    }
}
