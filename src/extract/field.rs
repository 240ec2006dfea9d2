//! Label-driven field extraction.
//!
//! The registry pages render the same label/value pairs as table rows,
//! definition lists, inline `<strong>Label:</strong> value` runs or loose
//! sibling elements depending on the template. Each layout is a strategy;
//! strategies run in order and the first candidate that survives cleaning
//! wins.

use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::trace;

use super::document::{
    element_text, next_element, normalize_label, row_cells, strip_markup, trailing_text,
    ProfileDocument,
};

/// Every label the profile template is known to print. Used to cut a value
/// off where the next field starts when cell boundaries are missing.
pub const KNOWN_LABELS: &[&str] = &[
    "Donor ID",
    "Donor Name",
    "Name",
    "Year of Birth",
    "Birth Year",
    "Marital Status",
    "Ethnic Origin",
    "Ethnicity",
    "Race",
    "Religion",
    "Languages",
    "Height",
    "Weight",
    "Eye Color",
    "Hair Color",
    "Hair Texture",
    "Skin Tone",
    "Body Build",
    "Blood Type",
    "Education",
    "Education Level",
    "Field of Study",
    "Major",
    "Occupation",
    "Profile As Of",
    "Document ID",
    "Vial Options",
    "Interests",
];

static LABEL_BOUNDARIES: LazyLock<Vec<(String, Regex)>> = LazyLock::new(|| {
    KNOWN_LABELS
        .iter()
        .filter_map(|label| {
            let re = Regex::new(&format!(r"(?i)\b{}\s*:", regex::escape(label))).ok()?;
            Some((normalize_label(label), re))
        })
        .collect()
});

static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(<\s*script|function\s*\(|=>|javascript:|\bvar\s+\w+\s*=|document\.|window\.|[{}])")
        .expect("valid regex")
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static DT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dt").expect("valid selector"));
static SAME_ELEMENT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li, p, span, div, td, label").expect("valid selector")
});
static LABEL_ELEMENT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("strong, b, label, span, th, td, div, dt").expect("valid selector")
});

/// Longest value accepted from any strategy.
const MAX_VALUE_LEN: usize = 300;

/// A single extraction attempt over a document.
pub type Strategy = fn(&ProfileDocument, &str) -> Option<String>;

/// Strategies in priority order.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("table_row", table_row),
    ("definition_list", definition_list),
    ("same_element", same_element),
    ("next_sibling", next_sibling),
];

/// Label-based extractor over one captured document.
pub struct FieldExtractor<'a> {
    doc: &'a ProfileDocument,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(doc: &'a ProfileDocument) -> Self {
        Self { doc }
    }

    pub fn document(&self) -> &'a ProfileDocument {
        self.doc
    }

    /// Extract the value printed next to `label`, or `None`.
    pub fn extract_field(&self, label: &str) -> Option<String> {
        for (name, strategy) in STRATEGIES {
            let Some(raw) = strategy(self.doc, label) else {
                continue;
            };
            match clean_value(&raw, label) {
                Some(value) => {
                    trace!(label, strategy = name, value = %value, "field extracted");
                    return Some(value);
                }
                None => trace!(label, strategy = name, raw = %raw, "candidate rejected"),
            }
        }
        None
    }

    /// Try several alias labels in order.
    pub fn extract_any(&self, labels: &[&str]) -> Option<String> {
        labels.iter().find_map(|label| self.extract_field(label))
    }

    /// Extract a number and discard it when outside `[min, max]`.
    pub fn extract_numeric_field(&self, label: &str, min: f64, max: f64) -> Option<f64> {
        let value = self.extract_field(label)?;
        let number = parse_number(&value)?;
        if (min..=max).contains(&number) {
            Some(number)
        } else {
            trace!(label, number, min, max, "numeric field out of range");
            None
        }
    }

    /// Birth year, validated against 1950..=current year.
    pub fn extract_birth_year(&self) -> Option<i32> {
        let max = chrono::Utc::now().year() as f64;
        ["Year of Birth", "Birth Year"]
            .iter()
            .find_map(|label| self.extract_numeric_field(label, 1950.0, max))
            .map(|y| y as i32)
    }
}

/// First number in a string.
pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned = value.replace(',', "");
    NUMBER_RE.find(&cleaned)?.as_str().parse().ok()
}

/// Clean a raw candidate: strip markup, collapse whitespace, cut at the next
/// known label, and reject values that still look like several fields or code.
pub fn clean_value(raw: &str, label: &str) -> Option<String> {
    if CODE_RE.is_match(raw) {
        return None;
    }
    let text = strip_markup(raw);
    let mut value = text
        .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
        .to_string();

    let own = normalize_label(label);
    let cut = LABEL_BOUNDARIES
        .iter()
        .filter(|(name, _)| *name != own && !own.contains(name.as_str()))
        .filter_map(|(_, re)| re.find(&value).map(|m| m.start()))
        .min();
    if let Some(cut) = cut {
        value.truncate(cut);
    }

    let value = value
        .trim()
        .trim_end_matches(|c: char| matches!(c, ',' | ';' | '|' | '-') || c.is_whitespace())
        .to_string();

    if value.is_empty() || value.chars().count() > MAX_VALUE_LEN {
        return None;
    }
    if value.matches(':').count() >= 2 {
        return None;
    }
    if normalize_label(&value) == own {
        return None;
    }
    Some(value)
}

fn label_in(text: &str, label: &str) -> bool {
    let text = normalize_label(text);
    !text.is_empty() && text.contains(label) && text.len() <= label.len() + 15
}

/// (a) `<tr><th>Label</th><td>value</td></tr>`, including multi-pair rows.
pub fn table_row(doc: &ProfileDocument, label: &str) -> Option<String> {
    let wanted = normalize_label(label);
    for row in doc.html().select(&TR_SEL) {
        let cells = row_cells(row);
        for pair in cells.windows(2) {
            if label_in(&element_text(pair[0]), &wanted) {
                return Some(element_text(pair[1]));
            }
        }
    }
    None
}

/// (b) `<dt>Label</dt><dd>value</dd>`.
pub fn definition_list(doc: &ProfileDocument, label: &str) -> Option<String> {
    let wanted = normalize_label(label);
    doc.html()
        .select(&DT_SEL)
        .filter(|dt| label_in(&element_text(*dt), &wanted))
        .find_map(|dt| next_element(dt).filter(|dd| dd.value().name() == "dd"))
        .map(element_text)
}

/// (c) `<li>Label: value</li>`: the smallest element containing the label,
/// keeping what follows it.
pub fn same_element(doc: &ProfileDocument, label: &str) -> Option<String> {
    let escaped = regex::escape(label);
    let with_colon = Regex::new(&format!(r"(?i)\b{}\s*:\s*", escaped)).ok()?;
    let leading = Regex::new(&format!(r"(?i)^\s*{}\s+", escaped)).ok()?;

    let mut best: Option<String> = None;
    for el in doc.html().select(&SAME_ELEMENT_SEL) {
        let text = element_text(el);
        let Some(m) = with_colon.find(&text).or_else(|| leading.find(&text)) else {
            continue;
        };
        let rest = text[m.end()..].trim();
        if rest.is_empty() {
            continue;
        }
        if best.as_ref().is_none_or(|b| rest.len() < b.len()) {
            best = Some(rest.to_string());
        }
    }
    best
}

/// (d) `<label>Label</label><div>value</div>` or `<b>Label:</b> value`.
pub fn next_sibling(doc: &ProfileDocument, label: &str) -> Option<String> {
    let wanted = normalize_label(label);
    doc.html()
        .select(&LABEL_ELEMENT_SEL)
        .filter(|el| normalize_label(&element_text(*el)) == wanted)
        .find_map(sibling_value)
}

fn sibling_value(el: ElementRef<'_>) -> Option<String> {
    trailing_text(el).or_else(|| {
        next_element(el)
            .map(element_text)
            .filter(|t| !t.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str, label: &str) -> Option<String> {
        let doc = ProfileDocument::parse(html);
        FieldExtractor::new(&doc).extract_field(label)
    }

    #[test]
    fn test_table_row_strategy() {
        let html = "<table><tr><th>Eye Color:</th><td> Blue </td></tr></table>";
        assert_eq!(extract(html, "Eye Color").as_deref(), Some("Blue"));
    }

    #[test]
    fn test_table_row_multi_pair() {
        let html = "<table><tr><td>Race</td><td>Caucasian</td><td>Religion</td><td>None</td></tr></table>";
        assert_eq!(extract(html, "Religion").as_deref(), Some("None"));
    }

    #[test]
    fn test_definition_list_strategy() {
        let html = "<dl><dt>Blood Type</dt><dd>O+</dd><dt>Race</dt><dd>Asian</dd></dl>";
        assert_eq!(extract(html, "Blood Type").as_deref(), Some("O+"));
        assert_eq!(extract(html, "Race").as_deref(), Some("Asian"));
    }

    #[test]
    fn test_same_element_strategy() {
        let html = "<ul><li><strong>Occupation:</strong> Software Engineer</li></ul>";
        assert_eq!(extract(html, "Occupation").as_deref(), Some("Software Engineer"));
    }

    #[test]
    fn test_next_sibling_strategy() {
        let html = "<div><label>Hair Texture</label><div>Wavy</div></div>";
        assert_eq!(extract(html, "Hair Texture").as_deref(), Some("Wavy"));
    }

    #[test]
    fn test_value_truncated_at_next_label() {
        let html = "<p>Eye Color: Green Hair Color: Brown</p>";
        assert_eq!(extract(html, "Eye Color").as_deref(), Some("Green"));
        assert_eq!(extract(html, "Hair Color").as_deref(), Some("Brown"));
    }

    #[test]
    fn test_missing_field_is_none() {
        assert_eq!(extract("<p>Nothing to see</p>", "Blood Type"), None);
    }

    #[test]
    fn test_clean_value_rejects_multiple_fields() {
        assert_eq!(clean_value("a: b: c", "Unknown Label"), None);
    }

    #[test]
    fn test_clean_value_rejects_code() {
        assert_eq!(clean_value("function() { return 1; }", "Race"), None);
        assert_eq!(clean_value("<script>alert(1)</script>", "Race"), None);
    }

    #[test]
    fn test_clean_value_strips_markup() {
        assert_eq!(
            clean_value(":  <em>Roman</em>   Catholic ", "Religion").as_deref(),
            Some("Roman Catholic")
        );
    }

    #[test]
    fn test_numeric_range_validation() {
        let doc = ProfileDocument::parse(
            "<table><tr><th>Year of Birth</th><td>1920</td></tr><tr><th>Weight</th><td>72 kg</td></tr></table>",
        );
        let fx = FieldExtractor::new(&doc);
        assert_eq!(fx.extract_birth_year(), None);
        assert_eq!(fx.extract_numeric_field("Weight", 35.0, 180.0), Some(72.0));
        assert_eq!(fx.extract_numeric_field("Weight", 80.0, 180.0), None);
    }

    #[test]
    fn test_birth_year_in_range_is_kept() {
        let doc = ProfileDocument::parse("<dl><dt>Year of Birth</dt><dd>1990</dd></dl>");
        assert_eq!(FieldExtractor::new(&doc).extract_birth_year(), Some(1990));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("approx. 1,250 units"), Some(1250.0));
        assert_eq!(parse_number("5.5 ft"), Some(5.5));
        assert_eq!(parse_number("none"), None);
    }
}
