//! Assemble a `SubjectRecord` from one captured profile page.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use tracing::debug;

use super::document::{collapse_whitespace, element_text, ProfileDocument};
use super::field::{clean_value, FieldExtractor, KNOWN_LABELS};
use crate::error::ScrapeError;
use crate::models::SubjectRecord;
use crate::sections;

const PROFILE_CONTAINERS: &[&str] = &[
    "div.profile-container",
    "#donor-profile",
    ".donor-profile",
];

const BANNER_SELECTORS: &[&str] = &[
    ".profile-banner",
    ".donor-banner",
    ".status-banner",
    ".alert-banner",
];

const VIAL_SELECTORS: &[&str] = &[
    ".vial-options li",
    ".vial-option",
    "select[name*=vial] option",
];

const COMPLIANCE_SELECTORS: &[&str] = &[".compliance-flags", ".compliance", "#compliance"];

const NOT_FOUND_URL_MARKERS: &[&str] = &["/404", "not-found", "notfound", "page-not-found"];

const NOT_FOUND_PHRASES: &[&str] = &[
    "page not found",
    "donor not found",
    "profile not found",
    "no longer available",
];

static PROFILE_AS_OF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)profile\s+(?:as\s+of|updated)\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{2}-\d{2}|[A-Z][a-z]+\.? \d{1,2}, \d{4})")
        .expect("valid regex")
});

static ERROR_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b404\b").expect("valid regex"));

static HEADLINE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title, h1, h2").expect("valid selector"));

/// Decide whether a captured page is a 404-equivalent rather than a profile.
///
/// Returns the reason when the page is missing.
pub fn detect_missing_page(url: &str, doc: &ProfileDocument) -> Option<String> {
    let lower_url = url.to_lowercase();
    if let Some(marker) = NOT_FOUND_URL_MARKERS.iter().find(|m| lower_url.contains(*m)) {
        return Some(format!("redirected to not-found page ({marker})"));
    }

    for headline in doc.html().select(&HEADLINE_SEL) {
        let text = element_text(headline).to_lowercase();
        if let Some(phrase) = NOT_FOUND_PHRASES.iter().find(|p| text.contains(*p)) {
            return Some(format!("page reports \"{phrase}\""));
        }
        if ERROR_CODE_RE.is_match(&text) {
            return Some("page reports a 404".to_string());
        }
    }

    if doc.first_match(PROFILE_CONTAINERS).is_none() {
        let text = doc.text().to_lowercase();
        let has_label = KNOWN_LABELS
            .iter()
            .any(|label| text.contains(&label.to_lowercase()));
        if !has_label {
            return Some("no profile container or field labels on page".to_string());
        }
    }
    None
}

fn extract_banner(doc: &ProfileDocument) -> Option<String> {
    doc.first_match(BANNER_SELECTORS)
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn extract_vial_options(fx: &FieldExtractor<'_>) -> Option<Vec<String>> {
    for css in VIAL_SELECTORS {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        let options: Vec<String> = fx
            .document()
            .html()
            .select(&sel)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        if !options.is_empty() {
            return Some(options);
        }
    }
    fx.extract_field("Vial Options").map(|v| {
        v.split([',', '|', '/'])
            .map(|s| collapse_whitespace(s))
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn extract_compliance(doc: &ProfileDocument) -> Option<BTreeMap<String, String>> {
    let container = doc.first_match(COMPLIANCE_SELECTORS)?;
    let item_sel = Selector::parse("li, .flag, .badge").ok()?;
    let mut flags = BTreeMap::new();
    for item in container.select(&item_sel) {
        let text = element_text(item);
        if text.is_empty() {
            continue;
        }
        match text.split_once(':') {
            Some((label, value)) => {
                let label = collapse_whitespace(label);
                if let Some(value) = clean_value(value, &label) {
                    flags.insert(label, value);
                }
            }
            None => {
                flags.insert(text, "yes".to_string());
            }
        }
    }
    (!flags.is_empty()).then_some(flags)
}

fn extract_profile_as_of(fx: &FieldExtractor<'_>) -> Option<String> {
    fx.extract_any(&["Profile As Of", "Profile Updated"]).or_else(|| {
        PROFILE_AS_OF_RE
            .captures(&fx.document().text())
            .map(|c| c[1].to_string())
    })
}

/// Run every field extractor and section parser over one profile page.
///
/// Never fails: fields that cannot be found are left as `None`.
pub fn extract_record(subject_id: &str, doc: &ProfileDocument) -> SubjectRecord {
    let fx = FieldExtractor::new(doc);
    let physical = fx.extract_physical();

    SubjectRecord {
        id: subject_id.to_string(),
        name: fx.extract_identity_name(),
        year_of_birth: fx.extract_birth_year(),
        marital_status: fx.extract_field("Marital Status"),

        banner: extract_banner(doc),
        profile_as_of: extract_profile_as_of(&fx),
        document_id: fx.extract_any(&["Document ID", "Doc ID"]),
        vial_options: extract_vial_options(&fx),
        compliance_flags: extract_compliance(doc),

        ethnic_origin: fx.extract_any(&["Ethnic Origin", "Ethnicity"]),
        race: fx.extract_field("Race"),
        religion: fx.extract_field("Religion"),
        languages: fx.extract_any(&["Languages", "Languages Spoken"]),

        height_cm: physical.height_cm,
        weight_kg: physical.weight_kg,
        eye_color: physical.eye_color,
        hair_color: physical.hair_color,
        hair_texture: physical.hair_texture,
        skin_tone: physical.skin_tone,
        body_build: physical.body_build,
        blood_type: physical.blood_type,

        education: fx.extract_any(&["Education Level", "Education", "Highest Education"]),
        field_of_study: fx.extract_any(&["Field of Study", "Major"]),
        occupation: fx.extract_any(&["Occupation", "Current Occupation"]),

        genetic_tests: sections::genetic::parse_genetic_tests(doc),
        family_history: sections::family::parse_family_history(doc),
        health_conditions: sections::health::parse_health_conditions(doc),
        inventory: None,
    }
}

/// Extract a profile page, failing when the page is missing or yields nothing.
pub fn extract_subject(subject_id: &str, url: &str, html: &str) -> Result<SubjectRecord, ScrapeError> {
    let doc = ProfileDocument::parse(html);
    if let Some(reason) = detect_missing_page(url, &doc) {
        return Err(ScrapeError::Extraction(format!("profile page not found: {reason}")));
    }

    let record = extract_record(subject_id, &doc);
    let populated = record.populated_field_count();
    if populated == 0 {
        return Err(ScrapeError::Extraction(
            "no profile fields could be extracted".to_string(),
        ));
    }
    debug!(subject_id, populated, "profile extracted");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = include_str!("../../tests/fixtures/profile.html");

    #[test]
    fn test_extract_fixture_profile() {
        let record = extract_subject("4711", "https://registry.example.com/donors/4711", PROFILE)
            .expect("fixture should extract");

        assert_eq!(record.id, "4711");
        assert_eq!(record.name.as_deref(), Some("Elias"));
        assert_eq!(record.year_of_birth, Some(1990));
        assert_eq!(record.marital_status.as_deref(), Some("Single"));
        assert_eq!(record.banner.as_deref(), Some("New photos added"));
        assert_eq!(record.profile_as_of.as_deref(), Some("03/14/2025"));
        assert_eq!(record.document_id.as_deref(), Some("DOC-88213"));
        assert_eq!(
            record.vial_options,
            Some(vec!["ICI".to_string(), "IUI".to_string(), "ART".to_string()])
        );
        let flags = record.compliance_flags.as_ref().unwrap();
        assert_eq!(flags.get("FDA Eligible").map(String::as_str), Some("Yes"));
        assert_eq!(flags.get("ID Release").map(String::as_str), Some("yes"));

        assert_eq!(record.ethnic_origin.as_deref(), Some("Irish, German"));
        assert_eq!(record.race.as_deref(), Some("Caucasian"));
        assert_eq!(record.religion.as_deref(), Some("Agnostic"));
        assert_eq!(record.height_cm, Some(182.9));
        assert_eq!(record.weight_kg, Some(79.4));
        assert_eq!(record.eye_color.as_deref(), Some("Green"));
        assert_eq!(record.hair_color.as_deref(), Some("Brown"));
        assert_eq!(record.blood_type.as_deref(), Some("A+"));
        assert_eq!(record.education.as_deref(), Some("Master's Degree"));
        assert_eq!(record.field_of_study.as_deref(), Some("Marine Biology"));
        assert_eq!(record.occupation.as_deref(), Some("Research Scientist"));

        let genetic = record.genetic_tests.as_ref().unwrap();
        assert_eq!(genetic.len(), 2);
        assert_eq!(genetic[0].condition, "Cystic Fibrosis");

        let family = record.family_history.as_ref().unwrap();
        assert!(family.immediate.as_ref().unwrap().contains_key("Father"));

        let health = record.health_conditions.as_ref().unwrap();
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].condition, "Asthma");
    }

    #[test]
    fn test_not_found_by_url() {
        let err = extract_subject("1", "https://registry.example.com/404", PROFILE).unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_not_found_by_heading() {
        let html = "<html><head><title>Registry</title></head><body><h1>Donor Not Found</h1></body></html>";
        let err = extract_subject("1", "https://registry.example.com/donors/1", html).unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction(_)));
    }

    #[test]
    fn test_not_found_without_labels() {
        let html = "<html><body><p>Welcome to the registry.</p></body></html>";
        let doc = ProfileDocument::parse(html);
        assert!(detect_missing_page("https://registry.example.com/donors/1", &doc).is_some());
    }

    #[test]
    fn test_missing_fields_stay_none() {
        let html = r#"<div class="profile-container"><table><tr><th>Race</th><td>Asian</td></tr></table></div>"#;
        let record = extract_subject("9", "https://registry.example.com/donors/9", html).unwrap();
        assert_eq!(record.race.as_deref(), Some("Asian"));
        assert_eq!(record.name, None);
        assert_eq!(record.height_cm, None);
        assert_eq!(record.genetic_tests, None);
        assert_eq!(record.family_history, None);
    }

    #[test]
    fn test_empty_profile_container_is_failure() {
        let html = r#"<div class="profile-container"><p>Loading…</p></div>"#;
        let err = extract_subject("9", "https://registry.example.com/donors/9", html).unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction(msg) if msg.contains("no profile fields")));
    }
}
