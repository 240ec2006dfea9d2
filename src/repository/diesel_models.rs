//! Diesel ORM models for database tables.
//!
//! Field order matches the column order in `schema.rs`. Timestamps are
//! RFC 3339 text; JSON payloads are stored as text.

use diesel::prelude::*;

use crate::schema;

/// Stored credential set.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::credentials)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CredentialRecord {
    pub id: i32,
    pub identity: String,
    pub secret: String,
    pub active: i32,
    pub last_used_at: Option<String>,
    pub created_at: String,
}

/// New credential set for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::credentials)]
pub struct NewCredential<'a> {
    pub identity: &'a str,
    pub secret: &'a str,
    pub active: i32,
    pub last_used_at: Option<&'a str>,
    pub created_at: &'a str,
}

/// Job row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scrape_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobRecord {
    pub id: String,
    pub subject_ids: String,
    pub incremental: i32,
    pub status: String,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// New job for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scrape_jobs)]
pub struct NewJob<'a> {
    pub id: &'a str,
    pub subject_ids: &'a str,
    pub incremental: i32,
    pub status: &'a str,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
    pub error: Option<&'a str>,
    pub created_at: &'a str,
    pub started_at: Option<&'a str>,
    pub finished_at: Option<&'a str>,
}

/// Per-subject result row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scrape_results)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ResultRecord {
    pub id: i64,
    pub job_id: String,
    pub subject_id: String,
    pub status: String,
    pub record: Option<String>,
    pub changes: Option<String>,
    pub error: Option<String>,
    pub url: Option<String>,
    pub duration_ms: Option<i64>,
    pub created_at: String,
}

/// New result for insertion. The id is assigned by SQLite.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scrape_results)]
pub struct NewResult<'a> {
    pub job_id: &'a str,
    pub subject_id: &'a str,
    pub status: &'a str,
    pub record: Option<&'a str>,
    pub changes: Option<&'a str>,
    pub error: Option<&'a str>,
    pub url: Option<&'a str>,
    pub duration_ms: Option<i64>,
    pub created_at: &'a str,
}

/// Subject health row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::subject_list)]
#[diesel(primary_key(subject_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SubjectListRecord {
    pub subject_id: String,
    pub last_scraped_at: Option<String>,
    pub last_successful_scraped_at: Option<String>,
    pub consecutive_failure_count: i32,
    pub active: i32,
}

/// Latest record snapshot per subject.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::subject_records)]
#[diesel(primary_key(subject_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SubjectRecordRow {
    pub subject_id: String,
    pub record: String,
    pub updated_at: String,
}
