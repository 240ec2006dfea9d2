//! Runs one job: session setup, the sequential subject loop, and teardown.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info, warn};
use url::Url;

use super::cancel::CancelFlag;
use super::progress::{JobProgress, ProgressReporter, SubjectOutcome};
use crate::browser::SessionController;
use crate::config::{Settings, SiteSettings};
use crate::diff::diff;
use crate::error::ScrapeError;
use crate::extract::{extract_subject, ProfileDocument};
use crate::models::{
    InventorySnapshot, JobCounters, JobStatus, ScrapeJob, ScrapeOutcome, SubjectListEntry,
};
use crate::repository::{ScrapeStore, StoreError};
use crate::sections::parse_inventory;

/// How the subject loop ended when no fatal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    Exhausted,
    Cancelled,
}

/// Drives a job against one browser session.
pub struct JobOrchestrator {
    store: Arc<dyn ScrapeStore>,
    session: SessionController,
    site: SiteSettings,
    refresh_ttl: chrono::Duration,
    progress: ProgressReporter,
    cancel: CancelFlag,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn ScrapeStore>, session: SessionController, settings: &Settings) -> Self {
        Self {
            store,
            session,
            site: settings.site.clone(),
            refresh_ttl: settings.refresh_ttl(),
            progress: ProgressReporter::silent(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run a pending job to a terminal state and return its final view.
    ///
    /// Setup failures and cancellation end the job `failed`; everything that
    /// goes wrong for a single subject is recorded as a failed result instead.
    /// The session is torn down exactly once either way, even if the loop
    /// panics. Jobs that are not `pending` are rejected untouched.
    pub async fn run(&mut self, job_id: &str) -> Result<ScrapeJob, ScrapeError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        if job.status != JobStatus::Pending {
            return Err(ScrapeError::JobNotPending {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        self.store
            .set_job_status(job_id, JobStatus::Running, None)
            .await?;
        info!(
            job_id,
            subjects = job.subject_ids.len(),
            incremental = job.incremental,
            "job started"
        );

        let result = AssertUnwindSafe(self.run_subjects(&job))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ScrapeError::Driver(format!(
                    "subject loop panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        self.session.teardown().await;

        let (status, error) = match result {
            Ok(LoopEnd::Exhausted) => (JobStatus::Completed, None),
            Ok(LoopEnd::Cancelled) => {
                warn!(job_id, "job cancelled");
                (JobStatus::Failed, Some("cancelled".to_string()))
            }
            Err(e) => {
                error!(job_id, error = %e, "job failed");
                (JobStatus::Failed, Some(e.to_string()))
            }
        };
        self.store
            .set_job_status(job_id, status, error.as_deref())
            .await?;

        let finished = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        info!(
            job_id,
            status = %finished.status,
            processed = finished.counters.processed,
            succeeded = finished.counters.succeeded,
            failed = finished.counters.failed,
            skipped = finished.counters.skipped,
            "job finished"
        );
        Ok(finished)
    }

    async fn run_subjects(&mut self, job: &ScrapeJob) -> Result<LoopEnd, ScrapeError> {
        if job.subject_ids.is_empty() {
            return Ok(LoopEnd::Exhausted);
        }

        self.session.ensure_logged_in().await?;

        let mut counters = job.counters;
        for subject_id in &job.subject_ids {
            if self.cancel.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }
            let outcome = self.process_subject(job, subject_id).await?;
            match outcome {
                SubjectOutcome::Succeeded => counters.record_success(),
                SubjectOutcome::Failed => counters.record_failure(),
                SubjectOutcome::Skipped => counters.record_skip(),
            }
            report(&*self.store, &self.progress, job, subject_id, outcome, counters).await;
        }
        Ok(LoopEnd::Exhausted)
    }

    /// Attempt one subject. Only fatal errors escape.
    async fn process_subject(
        &mut self,
        job: &ScrapeJob,
        subject_id: &str,
    ) -> Result<SubjectOutcome, ScrapeError> {
        let mut health = match self.store.get_subject_health(subject_id).await {
            Ok(entry) => entry.unwrap_or_else(|| SubjectListEntry::new(subject_id)),
            Err(e) => {
                warn!(subject_id, error = %e, "could not load subject health");
                SubjectListEntry::new(subject_id)
            }
        };

        if job.incremental && health.is_fresh(Utc::now(), self.refresh_ttl) {
            debug!(subject_id, "fresh; skipped");
            return Ok(SubjectOutcome::Skipped);
        }

        let started = Instant::now();
        let profile_url = self.site.profile_url(subject_id);
        let attempt = match &profile_url {
            Ok(url) => AssertUnwindSafe(self.scrape_subject(subject_id, url))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(ScrapeError::Extraction(format!(
                        "panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                }),
            Err(e) => Err(ScrapeError::Extraction(format!("invalid profile url: {e}"))),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let outcome = match attempt {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let url = profile_url.as_ref().ok().map(Url::to_string);
                warn!(
                    subject_id,
                    url = url.as_deref().unwrap_or_default(),
                    elapsed_ms,
                    error = %e,
                    "subject failed"
                );
                ScrapeOutcome::failure(e.to_string()).with_url(url)
            }
        }
        .with_duration_ms(elapsed_ms);

        if let Err(e) = self
            .store
            .append_result(&job.id, subject_id, &outcome)
            .await
        {
            error!(subject_id, error = %e, "could not record result");
        }

        let now = Utc::now();
        if outcome.is_success() {
            health.record_success(now);
        } else if health.record_failure(now) {
            warn!(
                subject_id,
                failures = health.consecutive_failure_count,
                "subject deactivated after repeated failures"
            );
        }
        if let Err(e) = self.store.update_subject_health(&health).await {
            warn!(subject_id, error = %e, "could not store subject health");
        }

        Ok(outcome.status.into())
    }

    async fn scrape_subject(
        &mut self,
        subject_id: &str,
        url: &Url,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let previous = self.store.get_subject_record(subject_id).await?;

        let mut page = self.session.capture(url.as_str()).await?;
        if self.session.is_login_redirect(&page.url) {
            warn!(subject_id, "session expired; logging in again");
            self.session.mark_unauthenticated();
            self.session.ensure_logged_in().await?;
            page = self.session.capture(url.as_str()).await?;
            if self.session.is_login_redirect(&page.url) {
                return Err(ScrapeError::LoginFailed(
                    "redirected to login again after re-authenticating".to_string(),
                ));
            }
        }

        let mut record = extract_subject(subject_id, &page.url, &page.html)?;
        record.inventory = self.capture_inventory(subject_id).await;

        let changes = diff(previous.as_ref(), &record);
        let persisted = self.store.upsert_subject_record(subject_id, &record).await;

        let mut outcome = ScrapeOutcome::success(record, changes).with_url(Some(page.url));
        if let Err(e) = persisted {
            let e = ScrapeError::from(e);
            warn!(subject_id, error = %e, "record not persisted; result kept");
            outcome.error = Some(e.to_string());
        }
        info!(subject_id, url = outcome.url.as_deref().unwrap_or_default(), "subject scraped");
        Ok(outcome)
    }

    /// Inventory is best effort; any failure leaves it empty.
    async fn capture_inventory(&mut self, subject_id: &str) -> Option<InventorySnapshot> {
        let url = match self.site.inventory_url(subject_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(subject_id, error = %e, "invalid inventory url");
                return None;
            }
        };
        match self.session.capture(url.as_str()).await {
            Ok(page) => {
                let inventory = inventory_from_html(&page.html);
                if inventory.is_none() {
                    debug!(subject_id, url = %url, "no inventory tables found");
                }
                inventory
            }
            Err(e) => {
                warn!(subject_id, url = %url, error = %e, "inventory page unavailable");
                None
            }
        }
    }
}

/// Store and broadcast progress after one subject.
///
/// Must not borrow the orchestrator: the page driver is not `Sync`, and a
/// shared borrow held across this await would make `run` `!Send`.
async fn report(
    store: &dyn ScrapeStore,
    progress: &ProgressReporter,
    job: &ScrapeJob,
    subject_id: &str,
    outcome: SubjectOutcome,
    counters: JobCounters,
) {
    if let Err(e) = store.update_job_progress(&job.id, &counters).await {
        warn!(job_id = %job.id, error = %e, "could not store job progress");
    }
    progress.emit(JobProgress {
        job_id: job.id.clone(),
        subject_id: subject_id.to_string(),
        outcome,
        counters,
        total: job.subject_ids.len(),
    });
}

fn inventory_from_html(html: &str) -> Option<InventorySnapshot> {
    parse_inventory(&ProfileDocument::parse(html))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
