//! Parsed donor profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::inventory::InventorySnapshot;

/// One external profile as extracted from the registry site.
///
/// Only `id` is guaranteed: it is supplied by the caller and is the
/// correlation key across snapshots. Every other field is extracted
/// independently and may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: String,

    // Identification
    pub name: Option<String>,
    pub year_of_birth: Option<i32>,
    pub marital_status: Option<String>,

    // Summary
    pub banner: Option<String>,
    pub profile_as_of: Option<String>,
    pub document_id: Option<String>,
    pub vial_options: Option<Vec<String>>,
    pub compliance_flags: Option<BTreeMap<String, String>>,

    // Demographic
    pub ethnic_origin: Option<String>,
    pub race: Option<String>,
    pub religion: Option<String>,
    pub languages: Option<String>,

    // Physical
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub eye_color: Option<String>,
    pub hair_color: Option<String>,
    pub hair_texture: Option<String>,
    pub skin_tone: Option<String>,
    pub body_build: Option<String>,
    pub blood_type: Option<String>,

    // Education
    pub education: Option<String>,
    pub field_of_study: Option<String>,
    pub occupation: Option<String>,

    // Sections
    pub genetic_tests: Option<Vec<GeneticTestResult>>,
    pub family_history: Option<FamilyHistory>,
    pub health_conditions: Option<Vec<HealthCondition>>,
    pub inventory: Option<InventorySnapshot>,
}

impl SubjectRecord {
    /// Create an empty record for a subject id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Number of extracted fields, not counting the caller-supplied id.
    pub fn populated_field_count(&self) -> usize {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .iter()
                .filter(|(k, v)| k.as_str() != "id" && !v.is_null())
                .count(),
            _ => 0,
        }
    }
}

/// A negative genetic screening result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneticTestResult {
    pub condition: String,
    pub result: String,
}

/// Attributes recorded for one family member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub age: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub hair_color: Option<String>,
    pub eye_color: Option<String>,
    pub eyesight: Option<String>,
    pub build: Option<String>,
    pub education: Option<String>,
    pub occupation: Option<String>,
    pub health: Option<String>,
}

impl FamilyMember {
    pub fn is_empty(&self) -> bool {
        *self == FamilyMember::default()
    }
}

/// Family history split by branch, each keyed by member relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyHistory {
    pub immediate: Option<BTreeMap<String, FamilyMember>>,
    pub paternal: Option<BTreeMap<String, FamilyMember>>,
    pub maternal: Option<BTreeMap<String, FamilyMember>>,
}

impl FamilyHistory {
    pub fn is_empty(&self) -> bool {
        self.immediate.is_none() && self.paternal.is_none() && self.maternal.is_none()
    }
}

/// A condition reported in the health and disease history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCondition {
    pub condition: String,
    pub relative: Option<String>,
    pub side_of_family: Option<String>,
    pub age_of_onset: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populated_field_count_ignores_id() {
        let mut record = SubjectRecord::new("D-100");
        assert_eq!(record.populated_field_count(), 0);

        record.name = Some("Aiden".to_string());
        record.height_cm = Some(180.0);
        assert_eq!(record.populated_field_count(), 2);
    }

    #[test]
    fn test_record_json_keeps_absent_fields_null() {
        let record = SubjectRecord::new("D-100");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "D-100");
        assert!(json["name"].is_null());
        assert!(json["inventory"].is_null());
    }
}
