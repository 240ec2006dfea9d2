//! Genetic screening results.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::extract::document::{element_text, prev_element, ProfileDocument};
use crate::models::GeneticTestResult;

const CONTAINER_SELECTORS: &[&str] = &[
    ".genetic-testing",
    "#genetic-testing",
    ".genetic-results",
    "#genetic-tests",
];

static NEGATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(negative|not a carrier|non-carrier|no mutations? detected|normal)\b")
        .expect("valid regex")
});

static RESULT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, span, div, li, p, dd").expect("valid selector"));

/// Longest text treated as a bare result phrase rather than a sentence.
const MAX_RESULT_LEN: usize = 40;

fn is_plausible_condition(text: &str) -> bool {
    let len = text.chars().count();
    (3..=100).contains(&len) && !NEGATIVE_RE.is_match(text)
}

fn locate_container(doc: &ProfileDocument) -> Option<ElementRef<'_>> {
    doc.first_match(CONTAINER_SELECTORS).or_else(|| {
        let sel = Selector::parse("h2, h3, h4").ok()?;
        doc.html()
            .select(&sel)
            .find(|h| element_text(*h).to_lowercase().contains("genetic"))
            .and_then(|h| h.parent().and_then(ElementRef::wrap))
    })
}

/// The condition label printed just before a result element.
fn preceding_condition(result: ElementRef<'_>) -> Option<String> {
    prev_element(result)
        .or_else(|| result.parent().and_then(ElementRef::wrap).and_then(prev_element))
        .map(element_text)
        .map(|t| t.trim_end_matches(':').trim().to_string())
        .filter(|t| is_plausible_condition(t))
}

/// Conditions reported with a negative result, in page order.
pub fn parse_genetic_tests(doc: &ProfileDocument) -> Option<Vec<GeneticTestResult>> {
    let container = locate_container(doc)?;
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for el in container.select(&RESULT_SEL) {
        let text = element_text(el);
        if text.chars().count() > MAX_RESULT_LEN || !NEGATIVE_RE.is_match(&text) {
            continue;
        }
        let Some(condition) = preceding_condition(el) else {
            continue;
        };
        if seen.insert(condition.to_lowercase()) {
            results.push(GeneticTestResult {
                condition,
                result: text,
            });
        }
    }

    (!results.is_empty()).then_some(results)
}
