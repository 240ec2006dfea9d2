//! Donor name extraction.
//!
//! Names are the field most prone to false capture (headings, nav text and
//! neighbouring labels all look plausible), so this uses a stricter validator
//! and a known structural path before falling back to label scans.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;

use super::document::{element_text, normalize_label, ProfileDocument};
use super::field::{FieldExtractor, KNOWN_LABELS};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}][\p{L} '\-]*$").expect("valid regex"));

/// Structural path to the name span in the current profile template.
const NAME_PATH: &[&str] = &[
    "div.profile-container",
    "div.right-column",
    "div.bio",
    "p",
    "span",
];

const NAME_LABELS: &[&str] = &["Donor Name", "Name", "First Name"];

/// Whether a candidate looks like a person's name.
pub fn is_plausible_name(candidate: &str) -> bool {
    let len = candidate.chars().count();
    if !(2..=50).contains(&len) || !NAME_RE.is_match(candidate) {
        return false;
    }
    let normalized = normalize_label(candidate);
    !KNOWN_LABELS
        .iter()
        .any(|label| normalize_label(label) == normalized)
}

/// Follow `NAME_PATH`, taking the first match at each step.
fn structural_name(doc: &ProfileDocument) -> Option<String> {
    let mut current = doc.html().root_element();
    for css in NAME_PATH {
        let sel = Selector::parse(css).ok()?;
        current = current.select(&sel).next()?;
    }
    Some(element_text(current))
}

impl FieldExtractor<'_> {
    /// Extract the donor's name, or `None` when no candidate passes validation.
    pub fn extract_identity_name(&self) -> Option<String> {
        if let Some(name) = structural_name(self.document()).filter(|n| is_plausible_name(n)) {
            return Some(name);
        }
        NAME_LABELS
            .iter()
            .filter_map(|label| self.extract_field(label))
            .find(|candidate| is_plausible_name(candidate))
    }
}
