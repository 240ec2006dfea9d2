//! Diesel-based SQLite store implementing every collaborator trait.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use tracing::debug;

use super::diesel_models::{
    CredentialRecord, JobRecord, NewCredential, NewJob, NewResult, ResultRecord,
    SubjectListRecord, SubjectRecordRow,
};
use super::diesel_pool::{create_diesel_pool, run_blocking, SqlitePool};
use super::{
    parse_datetime, parse_datetime_opt, CredentialProvider, JobStore, RecordSink, ResultSink,
    StoreError, SubjectListStore,
};
use crate::models::{
    ChangeSet, Credentials, JobCounters, JobStatus, ResultStatus, ScrapeJob, ScrapeOutcome,
    ScrapeResult, SubjectListEntry, SubjectRecord,
};
use crate::schema::{credentials, scrape_jobs, scrape_results, subject_list, subject_records};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS credentials (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity TEXT NOT NULL,
        secret TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        last_used_at TEXT,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS scrape_jobs (
        id TEXT PRIMARY KEY,
        subject_ids TEXT NOT NULL,
        incremental INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0,
        succeeded INTEGER NOT NULL DEFAULT 0,
        failed INTEGER NOT NULL DEFAULT 0,
        skipped INTEGER NOT NULL DEFAULT 0,
        error TEXT,
        created_at TEXT NOT NULL,
        started_at TEXT,
        finished_at TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS scrape_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL,
        subject_id TEXT NOT NULL,
        status TEXT NOT NULL,
        record TEXT,
        changes TEXT,
        error TEXT,
        url TEXT,
        duration_ms INTEGER,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_scrape_results_job ON scrape_results(job_id)",
    r#"CREATE TABLE IF NOT EXISTS subject_list (
        subject_id TEXT PRIMARY KEY,
        last_scraped_at TEXT,
        last_successful_scraped_at TEXT,
        consecutive_failure_count INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1
    )"#,
    r#"CREATE TABLE IF NOT EXISTS subject_records (
        subject_id TEXT PRIMARY KEY,
        record TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
];

#[derive(diesel::QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt, column_name = "last_insert_rowid()")]
    id: i64,
}

/// Create every table if missing.
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    for statement in SCHEMA {
        diesel::sql_query(*statement).execute(conn)?;
    }
    Ok(())
}

impl TryFrom<JobRecord> for ScrapeJob {
    type Error = StoreError;

    fn try_from(record: JobRecord) -> Result<Self, Self::Error> {
        let status = JobStatus::from_str(&record.status).ok_or_else(|| {
            StoreError::Database(format!("unknown job status: {}", record.status))
        })?;
        Ok(ScrapeJob {
            id: record.id,
            subject_ids: serde_json::from_str(&record.subject_ids)?,
            incremental: record.incremental != 0,
            status,
            counters: JobCounters {
                processed: record.processed.max(0) as u32,
                succeeded: record.succeeded.max(0) as u32,
                failed: record.failed.max(0) as u32,
                skipped: record.skipped.max(0) as u32,
            },
            error: record.error,
            created_at: parse_datetime(&record.created_at),
            started_at: parse_datetime_opt(record.started_at),
            finished_at: parse_datetime_opt(record.finished_at),
        })
    }
}

impl TryFrom<ResultRecord> for ScrapeResult {
    type Error = StoreError;

    fn try_from(row: ResultRecord) -> Result<Self, Self::Error> {
        let status = ResultStatus::from_str(&row.status).ok_or_else(|| {
            StoreError::Database(format!("unknown result status: {}", row.status))
        })?;
        let record: Option<SubjectRecord> =
            row.record.as_deref().map(serde_json::from_str).transpose()?;
        let changes: Option<ChangeSet> =
            row.changes.as_deref().map(serde_json::from_str).transpose()?;
        Ok(ScrapeResult {
            id: row.id,
            job_id: row.job_id,
            subject_id: row.subject_id,
            outcome: ScrapeOutcome {
                status,
                record,
                changes,
                error: row.error,
                url: row.url,
                duration_ms: row.duration_ms.map(|ms| ms.max(0) as u64),
            },
            created_at: parse_datetime(&row.created_at),
        })
    }
}

impl From<SubjectListRecord> for SubjectListEntry {
    fn from(record: SubjectListRecord) -> Self {
        SubjectListEntry {
            subject_id: record.subject_id,
            last_scraped_at: parse_datetime_opt(record.last_scraped_at),
            last_successful_scraped_at: parse_datetime_opt(record.last_successful_scraped_at),
            consecutive_failure_count: record.consecutive_failure_count.max(0) as u32,
            active: record.active != 0,
        }
    }
}

impl From<CredentialRecord> for Credentials {
    fn from(record: CredentialRecord) -> Self {
        Credentials {
            identity: record.identity,
            secret: record.secret,
            last_used_at: parse_datetime_opt(record.last_used_at),
        }
    }
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and ensure the schema.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let pool = create_diesel_pool(db_path)?;
        run_blocking(pool.clone(), |conn| Ok(init_schema(conn)?)).await?;
        debug!(path = %db_path.display(), "database ready");
        Ok(Self { pool })
    }

    /// Create a store with an existing pool. The schema must already exist.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the active credential set. Earlier sets are kept but deactivated.
    pub async fn set_credentials(&self, creds: &Credentials) -> Result<(), StoreError> {
        let identity = creds.identity.clone();
        let secret = creds.secret.clone();
        let now = Utc::now().to_rfc3339();

        run_blocking(self.pool.clone(), move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                diesel::update(credentials::table)
                    .set(credentials::active.eq(0))
                    .execute(conn)?;
                diesel::insert_into(credentials::table)
                    .values(&NewCredential {
                        identity: &identity,
                        secret: &secret,
                        active: 1,
                        last_used_at: None,
                        created_at: &now,
                    })
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }
}

#[async_trait]
impl CredentialProvider for SqliteStore {
    async fn get_active_credentials(&self) -> Result<Option<Credentials>, StoreError> {
        run_blocking(self.pool.clone(), |conn| {
            Ok(credentials::table
                .filter(credentials::active.eq(1))
                .order(credentials::id.desc())
                .first::<CredentialRecord>(conn)
                .optional()?)
        })
        .await
        .map(|opt| opt.map(Credentials::from))
    }

    async fn mark_used(&self, creds: &Credentials) -> Result<(), StoreError> {
        let identity = creds.identity.clone();
        let now = Utc::now().to_rfc3339();
        run_blocking(self.pool.clone(), move |conn| {
            diesel::update(
                credentials::table
                    .filter(credentials::identity.eq(&identity))
                    .filter(credentials::active.eq(1)),
            )
            .set(credentials::last_used_at.eq(Some(&now)))
            .execute(conn)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RecordSink for SqliteStore {
    async fn upsert_subject_record(
        &self,
        subject_id: &str,
        record: &SubjectRecord,
    ) -> Result<(), StoreError> {
        let subject_id = subject_id.to_string();
        let json = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        run_blocking(self.pool.clone(), move |conn| {
            diesel::replace_into(subject_records::table)
                .values((
                    subject_records::subject_id.eq(&subject_id),
                    subject_records::record.eq(&json),
                    subject_records::updated_at.eq(&now),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get_subject_record(
        &self,
        subject_id: &str,
    ) -> Result<Option<SubjectRecord>, StoreError> {
        let subject_id = subject_id.to_string();
        let row = run_blocking(self.pool.clone(), move |conn| {
            Ok(subject_records::table
                .find(&subject_id)
                .first::<SubjectRecordRow>(conn)
                .optional()?)
        })
        .await?;
        Ok(row.map(|r| serde_json::from_str(&r.record)).transpose()?)
    }
}

#[async_trait]
impl ResultSink for SqliteStore {
    async fn append_result(
        &self,
        job_id: &str,
        subject_id: &str,
        outcome: &ScrapeOutcome,
    ) -> Result<i64, StoreError> {
        let job_id = job_id.to_string();
        let subject_id = subject_id.to_string();
        let status = outcome.status.as_str();
        let record = outcome.record.as_ref().map(serde_json::to_string).transpose()?;
        let changes = outcome.changes.as_ref().map(serde_json::to_string).transpose()?;
        let error = outcome.error.clone();
        let url = outcome.url.clone();
        let duration_ms = outcome.duration_ms.map(|ms| ms.min(i64::MAX as u64) as i64);
        let now = Utc::now().to_rfc3339();

        run_blocking(self.pool.clone(), move |conn| {
            diesel::insert_into(scrape_results::table)
                .values(&NewResult {
                    job_id: &job_id,
                    subject_id: &subject_id,
                    status,
                    record: record.as_deref(),
                    changes: changes.as_deref(),
                    error: error.as_deref(),
                    url: url.as_deref(),
                    duration_ms,
                    created_at: &now,
                })
                .execute(conn)?;

            Ok(diesel::sql_query("SELECT last_insert_rowid()")
                .get_result::<LastInsertRowId>(conn)
                .map(|r| r.id)?)
        })
        .await
    }

    async fn list_results(&self, job_id: &str) -> Result<Vec<ScrapeResult>, StoreError> {
        let job_id = job_id.to_string();
        let rows = run_blocking(self.pool.clone(), move |conn| {
            Ok(scrape_results::table
                .filter(scrape_results::job_id.eq(&job_id))
                .order(scrape_results::id.asc())
                .load::<ResultRecord>(conn)?)
        })
        .await?;
        rows.into_iter().map(ScrapeResult::try_from).collect()
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn create_job(
        &self,
        subject_ids: &[String],
        incremental: bool,
    ) -> Result<String, StoreError> {
        let job = ScrapeJob::new(subject_ids.to_vec(), incremental);
        let ids_json = serde_json::to_string(&job.subject_ids)?;
        let created_at = job.created_at.to_rfc3339();
        let id = job.id.clone();
        let job_id = job.id;

        run_blocking(self.pool.clone(), move |conn| {
            diesel::insert_into(scrape_jobs::table)
                .values(&NewJob {
                    id: &id,
                    subject_ids: &ids_json,
                    incremental: i32::from(incremental),
                    status: JobStatus::Pending.as_str(),
                    processed: 0,
                    succeeded: 0,
                    failed: 0,
                    skipped: 0,
                    error: None,
                    created_at: &created_at,
                    started_at: None,
                    finished_at: None,
                })
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(job_id)
    }

    async fn update_job_progress(
        &self,
        job_id: &str,
        counters: &JobCounters,
    ) -> Result<(), StoreError> {
        let id = job_id.to_string();
        let c = *counters;
        run_blocking(self.pool.clone(), move |conn| {
            let rows = diesel::update(scrape_jobs::table.find(&id))
                .set((
                    scrape_jobs::processed.eq(c.processed as i32),
                    scrape_jobs::succeeded.eq(c.succeeded as i32),
                    scrape_jobs::failed.eq(c.failed as i32),
                    scrape_jobs::skipped.eq(c.skipped as i32),
                ))
                .execute(conn)?;
            if rows == 0 {
                return Err(StoreError::JobNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn set_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let id = job_id.to_string();
        let error = error.map(str::to_string);
        run_blocking(self.pool.clone(), move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let record = scrape_jobs::table
                    .find(&id)
                    .first::<JobRecord>(conn)
                    .optional()?
                    .ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
                let mut job = ScrapeJob::try_from(record)?;
                job.transition(status, error);

                diesel::update(scrape_jobs::table.find(&id))
                    .set((
                        scrape_jobs::status.eq(job.status.as_str()),
                        scrape_jobs::error.eq(job.error.as_deref()),
                        scrape_jobs::started_at.eq(job.started_at.map(|t| t.to_rfc3339())),
                        scrape_jobs::finished_at.eq(job.finished_at.map(|t| t.to_rfc3339())),
                    ))
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<ScrapeJob>, StoreError> {
        let id = job_id.to_string();
        let record = run_blocking(self.pool.clone(), move |conn| {
            Ok(scrape_jobs::table
                .find(&id)
                .first::<JobRecord>(conn)
                .optional()?)
        })
        .await?;
        record.map(ScrapeJob::try_from).transpose()
    }
}

#[async_trait]
impl SubjectListStore for SqliteStore {
    async fn get_subject_health(
        &self,
        subject_id: &str,
    ) -> Result<Option<SubjectListEntry>, StoreError> {
        let id = subject_id.to_string();
        run_blocking(self.pool.clone(), move |conn| {
            Ok(subject_list::table
                .find(&id)
                .first::<SubjectListRecord>(conn)
                .optional()?)
        })
        .await
        .map(|opt| opt.map(SubjectListEntry::from))
    }

    async fn update_subject_health(&self, entry: &SubjectListEntry) -> Result<(), StoreError> {
        let id = entry.subject_id.clone();
        let last_scraped = entry.last_scraped_at.map(|t| t.to_rfc3339());
        let last_success = entry.last_successful_scraped_at.map(|t| t.to_rfc3339());
        let failures = entry.consecutive_failure_count.min(i32::MAX as u32) as i32;
        let active = i32::from(entry.active);

        run_blocking(self.pool.clone(), move |conn| {
            diesel::replace_into(subject_list::table)
                .values((
                    subject_list::subject_id.eq(&id),
                    subject_list::last_scraped_at.eq(&last_scraped),
                    subject_list::last_successful_scraped_at.eq(&last_success),
                    subject_list::consecutive_failure_count.eq(failures),
                    subject_list::active.eq(active),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn reactivate_subject(&self, subject_id: &str) -> Result<bool, StoreError> {
        let id = subject_id.to_string();
        run_blocking(self.pool.clone(), move |conn| {
            let rows = diesel::update(subject_list::table.find(&id))
                .set((
                    subject_list::active.eq(1),
                    subject_list::consecutive_failure_count.eq(0),
                ))
                .execute(conn)?;
            Ok(rows > 0)
        })
        .await
    }

    async fn active_subject_ids(&self) -> Result<Vec<String>, StoreError> {
        run_blocking(self.pool.clone(), |conn| {
            Ok(subject_list::table
                .filter(subject_list::active.eq(1))
                .order(subject_list::subject_id.asc())
                .select(subject_list::subject_id)
                .load::<String>(conn)?)
        })
        .await
    }
}
