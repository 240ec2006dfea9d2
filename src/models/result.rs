//! Per-subject outcome of a job and the change-set attached to it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::subject::SubjectRecord;

/// Old and new serialized value of one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Differences between a stored snapshot and a fresh extraction.
///
/// Serializes as `{"initial": true}` for first-time scrapes and as a
/// `{field: {old, new}}` map otherwise, so an empty map means "nothing changed".
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeSet {
    Initial,
    Fields(BTreeMap<String, FieldChange>),
}

impl ChangeSet {
    pub fn is_initial(&self) -> bool {
        matches!(self, ChangeSet::Initial)
    }

    /// True for a non-initial change-set with no differing fields.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ChangeSet::Fields(fields) if fields.is_empty())
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, FieldChange>> {
        match self {
            ChangeSet::Initial => None,
            ChangeSet::Fields(fields) => Some(fields),
        }
    }
}

impl Serialize for ChangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChangeSet::Initial => {
                let mut marker = BTreeMap::new();
                marker.insert("initial", true);
                marker.serialize(serializer)
            }
            ChangeSet::Fields(fields) => fields.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ChangeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.get("initial").and_then(Value::as_bool) == Some(true) {
            return Ok(ChangeSet::Initial);
        }
        serde_json::from_value(value)
            .map(ChangeSet::Fields)
            .map_err(D::Error::custom)
    }
}

/// Outcome status of one subject attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ResultStatus::Success),
            "failed" => Some(ResultStatus::Failed),
            _ => None,
        }
    }
}

/// What the orchestrator hands to the result sink for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub status: ResultStatus,
    pub record: Option<SubjectRecord>,
    pub changes: Option<ChangeSet>,
    pub error: Option<String>,
    pub url: Option<String>,
    pub duration_ms: Option<u64>,
}

impl ScrapeOutcome {
    pub fn success(record: SubjectRecord, changes: ChangeSet) -> Self {
        Self {
            status: ResultStatus::Success,
            record: Some(record),
            changes: Some(changes),
            error: None,
            url: None,
            duration_ms: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failed,
            record: None,
            changes: None,
            error: Some(error.into()),
            url: None,
            duration_ms: None,
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// A stored result row. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub id: i64,
    pub job_id: String,
    pub subject_id: String,
    pub outcome: ScrapeOutcome,
    pub created_at: DateTime<Utc>,
}
