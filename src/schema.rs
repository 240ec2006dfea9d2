// Kept in sync with the CREATE TABLE statements in repository/sqlite.rs.
// PRIMARY KEY columns are not nullable.

diesel::table! {
    credentials (id) {
        id -> Integer,
        identity -> Text,
        secret -> Text,
        active -> Integer,
        last_used_at -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    scrape_jobs (id) {
        id -> Text,
        subject_ids -> Text,
        incremental -> Integer,
        status -> Text,
        processed -> Integer,
        succeeded -> Integer,
        failed -> Integer,
        skipped -> Integer,
        error -> Nullable<Text>,
        created_at -> Text,
        started_at -> Nullable<Text>,
        finished_at -> Nullable<Text>,
    }
}

diesel::table! {
    scrape_results (id) {
        id -> BigInt,
        job_id -> Text,
        subject_id -> Text,
        status -> Text,
        record -> Nullable<Text>,
        changes -> Nullable<Text>,
        error -> Nullable<Text>,
        url -> Nullable<Text>,
        duration_ms -> Nullable<BigInt>,
        created_at -> Text,
    }
}

diesel::table! {
    subject_list (subject_id) {
        subject_id -> Text,
        last_scraped_at -> Nullable<Text>,
        last_successful_scraped_at -> Nullable<Text>,
        consecutive_failure_count -> Integer,
        active -> Integer,
    }
}

diesel::table! {
    subject_records (subject_id) {
        subject_id -> Text,
        record -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    credentials,
    scrape_jobs,
    scrape_results,
    subject_list,
    subject_records,
);
