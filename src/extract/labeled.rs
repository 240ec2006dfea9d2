//! Split free-running "Label: value Label: value" text into fields.
//!
//! Used for containers that print many attributes as one block of text,
//! where each value ends where the next expected label begins.

use std::collections::BTreeMap;

use regex::Regex;

/// A label located inside a block of text.
#[derive(Debug, Clone)]
struct LabelHit<'l> {
    label: &'l str,
    start: usize,
    end: usize,
}

/// Find every expected label (first occurrence, followed by `:`) and slice the
/// value up to the next located label.
///
/// Overlapping hits keep the one that starts first, so "Body Build:" wins over
/// the "Build:" inside it.
pub fn segment_labeled_text<'l>(text: &str, labels: &[&'l str]) -> BTreeMap<&'l str, String> {
    let mut hits: Vec<LabelHit<'l>> = labels
        .iter()
        .filter_map(|label| {
            let re = Regex::new(&format!(r"(?i)\b{}\s*:", regex::escape(label))).ok()?;
            let m = re.find(text)?;
            Some(LabelHit {
                label,
                start: m.start(),
                end: m.end(),
            })
        })
        .collect();
    hits.sort_by_key(|h| (h.start, std::cmp::Reverse(h.end)));

    let mut kept: Vec<LabelHit<'l>> = Vec::with_capacity(hits.len());
    for hit in hits {
        if kept.last().is_some_and(|prev| hit.start < prev.end) {
            continue;
        }
        kept.push(hit);
    }

    let mut out = BTreeMap::new();
    for (i, hit) in kept.iter().enumerate() {
        let stop = kept.get(i + 1).map(|next| next.start).unwrap_or(text.len());
        let value = text[hit.end..stop].trim().trim_end_matches([',', ';']).trim();
        if !value.is_empty() {
            out.insert(hit.label, value.to_string());
        }
    }
    out
}

/// Byte offset of the first expected label in `text`, if any.
pub fn first_label_offset(text: &str, labels: &[&str]) -> Option<usize> {
    labels
        .iter()
        .filter_map(|label| {
            let re = Regex::new(&format!(r"(?i)\b{}\s*:", regex::escape(label))).ok()?;
            re.find(text).map(|m| m.start())
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_are_bounded_by_next_label() {
        let text = "Height: 6'1\" Weight: 180 lbs Eye Color: Hazel";
        let fields = segment_labeled_text(text, &["Height", "Weight", "Eye Color"]);
        assert_eq!(fields["Height"], "6'1\"");
        assert_eq!(fields["Weight"], "180 lbs");
        assert_eq!(fields["Eye Color"], "Hazel");
    }

    #[test]
    fn test_overlapping_labels_prefer_longer() {
        let text = "Body Build: Athletic Blood Type: A+";
        let fields = segment_labeled_text(text, &["Build", "Body Build", "Blood Type"]);
        assert_eq!(fields.get("Body Build").map(String::as_str), Some("Athletic"));
        assert!(!fields.contains_key("Build"));
        assert_eq!(fields["Blood Type"], "A+");
    }

    #[test]
    fn test_empty_values_are_dropped() {
        let fields = segment_labeled_text("Age: Height: 170 cm", &["Age", "Height"]);
        assert!(!fields.contains_key("Age"));
        assert_eq!(fields["Height"], "170 cm");
    }

    #[test]
    fn test_first_label_offset() {
        assert_eq!(first_label_offset("Father Age: 60", &["Age", "Height"]), Some(7));
        assert_eq!(first_label_offset("Father", &["Age"]), None);
    }
}
