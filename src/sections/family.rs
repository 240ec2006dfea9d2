//! Family history: immediate, paternal and maternal branches.
//!
//! Each branch prints its members as one run of text, with every member
//! introduced by a `FAMILY MEMBER:` delimiter followed by the relation and a
//! fixed set of labelled attributes.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extract::document::{collapse_whitespace, element_text, ProfileDocument};
use crate::extract::labeled::{first_label_offset, segment_labeled_text};
use crate::models::{FamilyHistory, FamilyMember};

static DISCLAIMER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:this|the following) information (?:is|was) (?:provided|self-reported|reported) by the donor[^.]*\.?")
        .expect("valid regex")
});

static MEMBER_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)family\s+member\s*:").expect("valid regex"));

pub const FAMILY_LABELS: &[&str] = &[
    "Relationship",
    "Relation",
    "Age",
    "Height",
    "Weight",
    "Hair Color",
    "Eye Color",
    "Eyesight",
    "Build",
    "Education",
    "Occupation",
    "Health",
];

/// Where one branch lives on the page.
struct Branch {
    selectors: &'static [&'static str],
    heading: &'static str,
}

const IMMEDIATE: Branch = Branch {
    selectors: &[".family-immediate", "#immediate-family", ".immediate-family"],
    heading: "immediate family",
};

const PATERNAL: Branch = Branch {
    selectors: &[".family-paternal", "#paternal-family", ".paternal-family"],
    heading: "paternal",
};

const MATERNAL: Branch = Branch {
    selectors: &[".family-maternal", "#maternal-family", ".maternal-family"],
    heading: "maternal",
};

fn branch_text(doc: &ProfileDocument, branch: &Branch) -> Option<String> {
    doc.first_match(branch.selectors)
        .map(element_text)
        .or_else(|| doc.text_after_heading(branch.heading))
}

fn parse_member(block: &str) -> Option<(Option<String>, FamilyMember)> {
    let fields = segment_labeled_text(block, FAMILY_LABELS);
    let get = |label: &str| fields.get(label).cloned();

    let leading = first_label_offset(block, FAMILY_LABELS)
        .map(|offset| &block[..offset])
        .unwrap_or(block);
    let relation = get("Relationship")
        .or_else(|| get("Relation"))
        .or_else(|| Some(collapse_whitespace(leading)).filter(|r| !r.is_empty()));

    let member = FamilyMember {
        age: get("Age"),
        height: get("Height"),
        weight: get("Weight"),
        hair_color: get("Hair Color"),
        eye_color: get("Eye Color"),
        eyesight: get("Eyesight"),
        build: get("Build"),
        education: get("Education"),
        occupation: get("Occupation"),
        health: get("Health"),
    };
    if member.is_empty() && relation.is_none() {
        return None;
    }
    Some((relation, member))
}

/// Parse one branch's text into members keyed by relation.
///
/// Members without a relation are keyed `Member N`; repeated relations get a
/// numeric suffix so no member is dropped.
pub fn parse_branch_text(text: &str) -> Option<BTreeMap<String, FamilyMember>> {
    let text = DISCLAIMER_RE.replace_all(text, " ");
    let mut members = BTreeMap::new();

    for (index, block) in MEMBER_SPLIT_RE.split(&text).skip(1).enumerate() {
        let Some((relation, member)) = parse_member(block.trim()) else {
            continue;
        };
        let base = relation.unwrap_or_else(|| format!("Member {}", index + 1));
        let mut key = base.clone();
        let mut n = 2;
        while members.contains_key(&key) {
            key = format!("{base} ({n})");
            n += 1;
        }
        members.insert(key, member);
    }

    (!members.is_empty()).then_some(members)
}

/// All three family-history branches; `None` when none could be parsed.
pub fn parse_family_history(doc: &ProfileDocument) -> Option<FamilyHistory> {
    let parse = |branch: &Branch| branch_text(doc, branch).and_then(|t| parse_branch_text(&t));
    let history = FamilyHistory {
        immediate: parse(&IMMEDIATE),
        paternal: parse(&PATERNAL),
        maternal: parse(&MATERNAL),
    };
    (!history.is_empty()).then_some(history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_keyed_by_relation() {
        let text = "This information was provided by the donor and has not been verified. \
                    FAMILY MEMBER: Father Age: 62 Height: 5'11\" Hair Color: Brown Eyesight: Glasses \
                    Build: Medium Occupation: Engineer \
                    FAMILY MEMBER: Sister Age: 25 Eye Color: Green";
        let members = parse_branch_text(text).unwrap();
        assert_eq!(members.len(), 2);

        let father = &members["Father"];
        assert_eq!(father.age.as_deref(), Some("62"));
        assert_eq!(father.height.as_deref(), Some("5'11\""));
        assert_eq!(father.hair_color.as_deref(), Some("Brown"));
        assert_eq!(father.eyesight.as_deref(), Some("Glasses"));
        assert_eq!(father.build.as_deref(), Some("Medium"));
        assert_eq!(father.occupation.as_deref(), Some("Engineer"));
        assert_eq!(father.eye_color, None);

        assert_eq!(members["Sister"].eye_color.as_deref(), Some("Green"));
    }

    #[test]
    fn test_duplicate_relations_are_suffixed() {
        let text = "Family Member: Brother Age: 30 Family Member: Brother Age: 27";
        let members = parse_branch_text(text).unwrap();
        assert_eq!(members["Brother"].age.as_deref(), Some("30"));
        assert_eq!(members["Brother (2)"].age.as_deref(), Some("27"));
    }

    #[test]
    fn test_explicit_relation_label() {
        let text = "FAMILY MEMBER: Relation: Grandmother Age: 88 Health: Good";
        let members = parse_branch_text(text).unwrap();
        assert_eq!(members["Grandmother"].health.as_deref(), Some("Good"));
    }

    #[test]
    fn test_no_delimiter_is_none() {
        assert_eq!(parse_branch_text("No family history provided."), None);
    }

    #[test]
    fn test_branches_from_containers_and_headings() {
        let doc = ProfileDocument::parse(
            r#"<div class="family-immediate">FAMILY MEMBER: Mother Age: 58 Eye Color: Blue</div>
               <h3>Paternal Family</h3>
               <p>FAMILY MEMBER: Grandfather Age: 85</p>"#,
        );
        let history = parse_family_history(&doc).unwrap();
        assert!(history.immediate.as_ref().unwrap().contains_key("Mother"));
        assert!(history.paternal.as_ref().unwrap().contains_key("Grandfather"));
        assert_eq!(history.maternal, None);
    }

    #[test]
    fn test_missing_family_history() {
        let doc = ProfileDocument::parse("<p>Bio only</p>");
        assert_eq!(parse_family_history(&doc), None);
    }
}
