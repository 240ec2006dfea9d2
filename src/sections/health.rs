//! Health and disease history table.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use crate::extract::document::{element_text, row_cells, ProfileDocument};
use crate::models::HealthCondition;

const TABLE_SELECTORS: &[&str] = &[
    "table.health-history",
    "#health-history table",
    ".health-history table",
    "table.disease-history",
];

const AFFIRMATIVE_MARKERS: &[&str] = &["x", "yes", "y", "✓", "✔", "true"];

static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CHECKED_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("input[checked], .checked, .fa-check, .icon-check").expect("valid selector")
});

/// Rows shorter than this are headers or notes.
const MIN_CELLS: usize = 6;

fn is_affirmative(cell: ElementRef<'_>) -> bool {
    if cell.select(&CHECKED_SEL).next().is_some() {
        return true;
    }
    let text = element_text(cell).to_lowercase();
    AFFIRMATIVE_MARKERS.contains(&text.as_str())
}

fn non_empty(cell: ElementRef<'_>) -> Option<String> {
    Some(element_text(cell)).filter(|t| !t.is_empty() && t != "-")
}

/// Conditions marked present, with relative, side of family and age of onset.
pub fn parse_health_conditions(doc: &ProfileDocument) -> Option<Vec<HealthCondition>> {
    let table = doc
        .first_match(TABLE_SELECTORS)
        .or_else(|| doc.table_after_heading("health"))?;

    let conditions: Vec<HealthCondition> = table
        .select(&TR_SEL)
        .map(row_cells)
        .filter(|cells| cells.len() >= MIN_CELLS && is_affirmative(cells[1]))
        .filter_map(|cells| {
            Some(HealthCondition {
                condition: non_empty(cells[0])?,
                relative: non_empty(cells[3]),
                side_of_family: non_empty(cells[4]),
                age_of_onset: non_empty(cells[5]),
            })
        })
        .collect();

    (!conditions.is_empty()).then_some(conditions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"<table class="health-history">
        <tr><th>Condition</th><th>Present</th><th>Details</th><th>Relative</th><th>Side</th><th>Onset</th></tr>
        <tr><td>Asthma</td><td>X</td><td>Mild</td><td>Mother</td><td>Maternal</td><td>12</td></tr>
        <tr><td>Diabetes</td><td></td><td></td><td></td><td></td><td></td></tr>
        <tr><td>Migraine</td><td><input type="checkbox" checked></td><td></td><td>Self</td><td>-</td><td>20</td></tr>
        <tr><td colspan="6">Notes: none</td></tr>
    </table>"#;

    #[test]
    fn test_only_marked_rows_are_recorded() {
        let doc = ProfileDocument::parse(TABLE);
        let conditions = parse_health_conditions(&doc).unwrap();
        assert_eq!(conditions.len(), 2);

        assert_eq!(conditions[0].condition, "Asthma");
        assert_eq!(conditions[0].relative.as_deref(), Some("Mother"));
        assert_eq!(conditions[0].side_of_family.as_deref(), Some("Maternal"));
        assert_eq!(conditions[0].age_of_onset.as_deref(), Some("12"));

        assert_eq!(conditions[1].condition, "Migraine");
        assert_eq!(conditions[1].side_of_family, None);
    }

    #[test]
    fn test_heading_fallback() {
        let doc = ProfileDocument::parse(
            r#"<h2>Health &amp; Disease History</h2>
               <table><tr><td>Glaucoma</td><td>yes</td><td></td><td>Grandfather</td><td>Paternal</td><td>60</td></tr></table>"#,
        );
        let conditions = parse_health_conditions(&doc).unwrap();
        assert_eq!(conditions[0].condition, "Glaucoma");
    }

    #[test]
    fn test_no_marked_rows_is_none() {
        let doc = ProfileDocument::parse(
            r#"<table class="health-history"><tr><td>Asthma</td><td></td><td></td><td></td><td></td><td></td></tr></table>"#,
        );
        assert_eq!(parse_health_conditions(&doc), None);
    }
}
