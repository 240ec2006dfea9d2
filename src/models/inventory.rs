//! Inventory and status report attached to a donor profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured view of the inventory report page for one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub finished: FinishedUnits,
    pub quarantine: Option<QuarantineUnits>,
    /// Units sold, keyed by region then period.
    pub sales: Option<BTreeMap<String, BTreeMap<String, u32>>>,
    /// Family units reported, keyed by region.
    pub family_units: Option<BTreeMap<String, u32>>,
    pub advisory: Option<Advisory>,
}

/// Processing state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Unwashed,
    Washed,
    Art,
    WashedCc,
    UnwashedCc,
}

impl ProcessingState {
    /// Parse a processing-state cell label.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match normalized.as_str() {
            "unwashed" | "ici" => Some(Self::Unwashed),
            "washed" | "iui" => Some(Self::Washed),
            "art" | "ivf" => Some(Self::Art),
            "washedcc" => Some(Self::WashedCc),
            "unwashedcc" => Some(Self::UnwashedCc),
            _ => None,
        }
    }
}

/// Released units, bucketed by processing state then unit type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedUnits {
    pub unwashed: BTreeMap<String, u32>,
    pub washed: BTreeMap<String, u32>,
    pub art: BTreeMap<String, u32>,
}

impl FinishedUnits {
    pub fn add(&mut self, state: ProcessingState, unit_type: &str, count: u32) {
        let bucket = match state {
            ProcessingState::Unwashed | ProcessingState::UnwashedCc => &mut self.unwashed,
            ProcessingState::Washed | ProcessingState::WashedCc => &mut self.washed,
            ProcessingState::Art => &mut self.art,
        };
        let entry = bucket.entry(unit_type.to_string()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    pub fn total(&self) -> u32 {
        [&self.unwashed, &self.washed, &self.art]
            .iter()
            .flat_map(|m| m.values())
            .fold(0u32, |acc, n| acc.saturating_add(*n))
    }

    pub fn is_empty(&self) -> bool {
        self.unwashed.is_empty() && self.washed.is_empty() && self.art.is_empty()
    }
}

/// Units held in quarantine, with a computed total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineUnits {
    pub unwashed: u32,
    pub washed: u32,
    pub art: u32,
    pub washed_cc: u32,
    pub unwashed_cc: u32,
    /// Sum of the buckets above; always recomputed, never scraped.
    pub total: u32,
    /// Total as printed on the page, when present.
    pub displayed_total: Option<u32>,
}

impl QuarantineUnits {
    pub fn add(&mut self, state: ProcessingState, count: u32) {
        let bucket = match state {
            ProcessingState::Unwashed => &mut self.unwashed,
            ProcessingState::Washed => &mut self.washed,
            ProcessingState::Art => &mut self.art,
            ProcessingState::WashedCc => &mut self.washed_cc,
            ProcessingState::UnwashedCc => &mut self.unwashed_cc,
        };
        *bucket = bucket.saturating_add(count);
        self.recompute_total();
    }

    pub fn recompute_total(&mut self) {
        // Counts come straight off the page; clamp rather than wrap.
        self.total = [
            self.unwashed,
            self.washed,
            self.art,
            self.washed_cc,
            self.unwashed_cc,
        ]
        .into_iter()
        .fold(0u32, |acc, n| acc.saturating_add(n));
    }

    /// True when a displayed total exists and disagrees with the computed one.
    pub fn total_mismatch(&self) -> bool {
        self.displayed_total.is_some_and(|shown| shown != self.total)
    }
}

/// Scalar compliance and advisory fields from the report page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub family_limit: Option<u32>,
    pub reported_families: Option<u32>,
    pub limit_reached: Option<bool>,
    pub notes: Option<String>,
}

impl Advisory {
    pub fn is_empty(&self) -> bool {
        *self == Advisory::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarantine_total_is_sum_of_buckets() {
        let mut q = QuarantineUnits::default();
        q.add(ProcessingState::Unwashed, 5);
        q.add(ProcessingState::Washed, 2);
        q.add(ProcessingState::Art, 1);
        q.add(ProcessingState::WashedCc, 0);
        q.add(ProcessingState::UnwashedCc, 0);
        assert_eq!(q.total, 8);
        assert!(!q.total_mismatch());

        q.displayed_total = Some(9);
        assert!(q.total_mismatch());
    }

    #[test]
    fn test_processing_state_labels() {
        assert_eq!(ProcessingState::from_label("Unwashed"), Some(ProcessingState::Unwashed));
        assert_eq!(ProcessingState::from_label("ART"), Some(ProcessingState::Art));
        assert_eq!(ProcessingState::from_label("Washed CC"), Some(ProcessingState::WashedCc));
        assert_eq!(ProcessingState::from_label("Unwashed-CC"), Some(ProcessingState::UnwashedCc));
        assert_eq!(ProcessingState::from_label("Total"), None);
    }

    #[test]
    fn test_finished_units_accumulate_by_type() {
        let mut f = FinishedUnits::default();
        f.add(ProcessingState::Washed, "IUI", 3);
        f.add(ProcessingState::Washed, "IUI", 2);
        f.add(ProcessingState::Art, "ART", 1);
        assert_eq!(f.washed.get("IUI"), Some(&5));
        assert_eq!(f.total(), 6);
    }

    #[test]
    fn test_oversized_counts_saturate() {
        let mut q = QuarantineUnits::default();
        q.add(ProcessingState::Unwashed, 4_000_000_000);
        q.add(ProcessingState::Unwashed, 4_000_000_000);
        q.add(ProcessingState::Washed, 4_000_000_000);
        assert_eq!(q.unwashed, u32::MAX);
        assert_eq!(q.total, u32::MAX);

        let mut f = FinishedUnits::default();
        f.add(ProcessingState::Washed, "IUI", 4_000_000_000);
        f.add(ProcessingState::Washed, "IUI", 4_000_000_000);
        f.add(ProcessingState::Art, "ART", 4_000_000_000);
        assert_eq!(f.washed.get("IUI"), Some(&u32::MAX));
        assert_eq!(f.total(), u32::MAX);
    }
}
