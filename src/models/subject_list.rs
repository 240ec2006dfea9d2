//! Per-subject scraping health tracked across jobs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failures after which a subject is deactivated.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Scraping health of one subject id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectListEntry {
    pub subject_id: String,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub last_successful_scraped_at: Option<DateTime<Utc>>,
    pub consecutive_failure_count: u32,
    pub active: bool,
}

impl SubjectListEntry {
    /// A fresh, active entry with no history.
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            last_scraped_at: None,
            last_successful_scraped_at: None,
            consecutive_failure_count: 0,
            active: true,
        }
    }

    /// Record a successful attempt. Resets the failure streak.
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_scraped_at = Some(at);
        self.last_successful_scraped_at = Some(at);
        self.consecutive_failure_count = 0;
    }

    /// Record a failed attempt. Returns true when this attempt deactivated the subject.
    pub fn record_failure(&mut self, at: DateTime<Utc>) -> bool {
        self.last_scraped_at = Some(at);
        self.consecutive_failure_count = self.consecutive_failure_count.saturating_add(1);
        if self.active && self.consecutive_failure_count >= MAX_CONSECUTIVE_FAILURES {
            self.active = false;
            return true;
        }
        false
    }

    /// Explicit operator reactivation. The only path back to `active`.
    pub fn reactivate(&mut self) {
        self.active = true;
        self.consecutive_failure_count = 0;
    }

    /// Whether the last success is recent enough to skip an incremental run.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.last_successful_scraped_at
            .is_some_and(|last| now - last < ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_failures_deactivate() {
        let mut entry = SubjectListEntry::new("D-1");
        let now = Utc::now();
        for _ in 0..4 {
            assert!(!entry.record_failure(now));
            assert!(entry.active);
        }
        assert!(entry.record_failure(now));
        assert!(!entry.active);
        assert_eq!(entry.consecutive_failure_count, 5);
    }

    #[test]
    fn test_success_does_not_reactivate() {
        let mut entry = SubjectListEntry::new("D-1");
        let now = Utc::now();
        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            entry.record_failure(now);
        }
        entry.record_success(now);
        assert_eq!(entry.consecutive_failure_count, 0);
        assert!(!entry.active);

        // Further failures past the threshold do not report a fresh deactivation.
        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            assert!(!entry.record_failure(now));
        }

        entry.reactivate();
        assert!(entry.active);
        assert_eq!(entry.consecutive_failure_count, 0);
    }

    #[test]
    fn test_success_resets_any_streak() {
        let now = Utc::now();
        for streak in [0u32, 1, 3, 4, 17] {
            let mut entry = SubjectListEntry::new("D-1");
            entry.consecutive_failure_count = streak;
            entry.record_success(now);
            assert_eq!(entry.consecutive_failure_count, 0);
            assert_eq!(entry.last_successful_scraped_at, Some(now));
        }
    }

    #[test]
    fn test_is_fresh() {
        let now = Utc::now();
        let mut entry = SubjectListEntry::new("D-1");
        assert!(!entry.is_fresh(now, Duration::days(7)));

        entry.record_success(now - Duration::days(2));
        assert!(entry.is_fresh(now, Duration::days(7)));
        assert!(!entry.is_fresh(now, Duration::days(1)));
    }
}
