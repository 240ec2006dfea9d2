//! Inventory and status report page.
//!
//! The unit table encodes its hierarchy structurally: the category and
//! processing-state cells span several rows via `rowspan`, so rows are first
//! expanded into a full grid and the category is carried as running state.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

use crate::extract::document::{element_text, normalize_label, row_cells, ProfileDocument};
use crate::extract::field::parse_number;
use crate::models::{
    Advisory, FinishedUnits, InventorySnapshot, ProcessingState, QuarantineUnits,
};

const UNIT_TABLE_SELECTORS: &[&str] = &[
    "table.inventory",
    "table#inventory",
    "#inventory table",
    ".inventory-report table",
];

const MAX_ROWSPAN: usize = 100;
const MAX_COLSPAN: usize = 20;

static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Finished,
    Quarantine,
}

impl Category {
    fn from_cell(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if text.contains("quarantine") {
            Some(Self::Quarantine)
        } else if text.contains("finished") || text.contains("released") {
            Some(Self::Finished)
        } else {
            None
        }
    }
}

fn span_attr(cell: ElementRef<'_>, name: &str, max: usize) -> usize {
    cell.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, max)
}

/// Rows that belong to `table` itself, not to a table nested inside it.
fn own_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    table
        .select(&TR_SEL)
        .filter(|tr| {
            tr.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| a.value().name() == "table")
                .is_some_and(|owner| owner.id() == table.id())
        })
        .collect()
}

/// Expand `rowspan`/`colspan` so every row carries a value for every column.
pub fn table_grid(table: ElementRef<'_>) -> Vec<Vec<String>> {
    let mut carried: Vec<Option<(String, usize)>> = Vec::new();
    let mut grid = Vec::new();

    for row in own_rows(table) {
        let mut cells = row_cells(row).into_iter();
        let mut out = Vec::new();
        let mut col = 0;
        loop {
            if let Some(slot) = carried.get_mut(col) {
                if let Some((text, left)) = slot.as_mut() {
                    out.push(text.clone());
                    *left -= 1;
                    if *left == 0 {
                        *slot = None;
                    }
                    col += 1;
                    continue;
                }
            }
            let Some(cell) = cells.next() else {
                // Spans from earlier rows may still cover columns further right.
                if carried.iter().skip(col).any(Option::is_some) {
                    out.push(String::new());
                    col += 1;
                    continue;
                }
                break;
            };
            let text = element_text(cell);
            let rowspan = span_attr(cell, "rowspan", MAX_ROWSPAN);
            let colspan = span_attr(cell, "colspan", MAX_COLSPAN);
            for _ in 0..colspan {
                if carried.len() <= col {
                    carried.resize(col + 1, None);
                }
                if rowspan > 1 {
                    carried[col] = Some((text.clone(), rowspan - 1));
                }
                out.push(text.clone());
                col += 1;
            }
        }
        if !out.is_empty() {
            grid.push(out);
        }
    }
    grid
}

fn parse_count(text: &str) -> Option<u32> {
    let n = parse_number(text)?;
    (n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64).then_some(n as u32)
}

/// Parse the unit table into finished and quarantine buckets.
fn parse_units(table: ElementRef<'_>) -> (FinishedUnits, Option<QuarantineUnits>) {
    let mut finished = FinishedUnits::default();
    let mut quarantine: Option<QuarantineUnits> = None;
    let mut category: Option<Category> = None;

    for row in table_grid(table) {
        if row.len() < 3 {
            continue;
        }
        if let Some(c) = Category::from_cell(&row[0]) {
            category = Some(c);
        }
        let Some(current) = category else {
            continue;
        };
        let Some(count) = row.last().and_then(|c| parse_count(c)) else {
            continue;
        };
        let processing = &row[1];
        let unit_type = if row.len() >= 4 { row[2].as_str() } else { "" };

        if normalize_label(processing) == "total" || normalize_label(unit_type) == "total" {
            if current == Category::Quarantine {
                quarantine.get_or_insert_with(QuarantineUnits::default).displayed_total =
                    Some(count);
            }
            continue;
        }

        let Some(state) = ProcessingState::from_label(processing) else {
            debug!(processing = %processing, "unrecognised processing state");
            continue;
        };
        match current {
            Category::Finished => {
                let unit_type = if unit_type.is_empty() { "unspecified" } else { unit_type };
                finished.add(state, unit_type, count);
            }
            Category::Quarantine => {
                quarantine
                    .get_or_insert_with(QuarantineUnits::default)
                    .add(state, count);
            }
        }
    }

    if let Some(q) = quarantine.as_mut() {
        q.recompute_total();
        if q.total_mismatch() {
            warn!(
                computed = q.total,
                displayed = q.displayed_total,
                "quarantine total does not match displayed total"
            );
        }
    }
    (finished, quarantine)
}

/// Region rows against period columns; the header row names the periods.
fn parse_sales(table: ElementRef<'_>) -> Option<BTreeMap<String, BTreeMap<String, u32>>> {
    let grid = table_grid(table);
    let (header, rows) = grid.split_first()?;
    let mut sales = BTreeMap::new();
    for row in rows {
        let Some(region) = row.first().filter(|r| !r.is_empty()) else {
            continue;
        };
        let periods: BTreeMap<String, u32> = row
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, cell)| {
                let period = header.get(i).filter(|p| !p.is_empty())?;
                Some((period.clone(), parse_count(cell)?))
            })
            .collect();
        if !periods.is_empty() {
            sales.insert(region.clone(), periods);
        }
    }
    (!sales.is_empty()).then_some(sales)
}

fn parse_family_units(table: ElementRef<'_>) -> Option<BTreeMap<String, u32>> {
    let units: BTreeMap<String, u32> = table_grid(table)
        .into_iter()
        .filter(|row| row.len() >= 2 && !row[0].is_empty())
        .filter_map(|row| {
            let count = row.last().and_then(|c| parse_count(c))?;
            Some((row[0].clone(), count))
        })
        .collect();
    (!units.is_empty()).then_some(units)
}

fn parse_flag(text: &str) -> Option<bool> {
    match normalize_label(text).as_str() {
        "yes" | "y" | "true" | "reached" => Some(true),
        "no" | "n" | "false" | "not reached" => Some(false),
        _ => None,
    }
}

fn parse_advisory(table: ElementRef<'_>) -> Option<Advisory> {
    let mut advisory = Advisory::default();
    for row in table_grid(table) {
        let [label, value, ..] = row.as_slice() else {
            continue;
        };
        let label = normalize_label(label);
        if label.contains("limit reached") {
            advisory.limit_reached = parse_flag(value);
        } else if label.contains("family limit") {
            advisory.family_limit = parse_count(value);
        } else if label.contains("reported families") || label.contains("families reported") {
            advisory.reported_families = parse_count(value);
        } else if label.contains("note") && !value.is_empty() {
            advisory.notes = Some(value.clone());
        }
    }
    (!advisory.is_empty()).then_some(advisory)
}

/// Parse the inventory report; `None` when the page carries nothing usable.
pub fn parse_inventory(doc: &ProfileDocument) -> Option<InventorySnapshot> {
    let (finished, quarantine) = doc
        .first_match(UNIT_TABLE_SELECTORS)
        .or_else(|| doc.table_after_heading("inventory"))
        .map(parse_units)
        .unwrap_or_default();

    let snapshot = InventorySnapshot {
        finished,
        quarantine,
        sales: doc.table_after_heading("sales").and_then(parse_sales),
        family_units: doc.table_after_heading("family units").and_then(parse_family_units),
        advisory: doc.table_after_heading("advisory").and_then(parse_advisory),
    };

    let empty = snapshot.finished.is_empty()
        && snapshot.quarantine.is_none()
        && snapshot.sales.is_none()
        && snapshot.family_units.is_none()
        && snapshot.advisory.is_none();
    (!empty).then_some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = include_str!("../../tests/fixtures/inventory.html");

    #[test]
    fn test_rowspan_grid_expansion() {
        let doc = ProfileDocument::parse(
            r#"<table id="t">
               <tr><td rowspan="2">A</td><td rowspan="3">B</td><td>1</td></tr>
               <tr><td>2</td></tr>
               <tr><td>C</td><td>3</td></tr>
               <tr><td colspan="2">D</td><td>4</td></tr>
               </table>"#,
        );
        let table = doc.first_match(&["table#t"]).unwrap();
        assert_eq!(
            table_grid(table),
            vec![
                vec!["A", "B", "1"],
                vec!["A", "B", "2"],
                vec!["C", "B", "3"],
                vec!["D", "D", "4"],
            ]
        );
    }

    #[test]
    fn test_short_row_still_consumes_carried_spans() {
        let doc = ProfileDocument::parse(
            r#"<table id="t">
               <tr><td>Unwashed</td><td>IUI</td><td rowspan="2">Quarantine</td></tr>
               <tr><td>Washed</td></tr>
               <tr><td>ART</td><td>ICI</td><td>Released</td></tr>
               </table>"#,
        );
        let table = doc.first_match(&["table#t"]).unwrap();
        assert_eq!(
            table_grid(table),
            vec![
                vec!["Unwashed", "IUI", "Quarantine"],
                vec!["Washed", "", "Quarantine"],
                vec!["ART", "ICI", "Released"],
            ]
        );
    }

    #[test]
    fn test_nested_table_rows_are_skipped() {
        let doc = ProfileDocument::parse(
            r#"<table id="outer"><tr><td>x</td><td><table><tr><td>inner</td></tr></table></td></tr></table>"#,
        );
        let table = doc.first_match(&["table#outer"]).unwrap();
        let grid = table_grid(table);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0][0], "x");
    }

    #[test]
    fn test_report_fixture() {
        let doc = ProfileDocument::parse(REPORT);
        let snapshot = parse_inventory(&doc).unwrap();

        assert_eq!(snapshot.finished.unwashed.get("0.5 ml"), Some(&4));
        assert_eq!(snapshot.finished.unwashed.get("1.0 ml"), Some(&2));
        assert_eq!(snapshot.finished.washed.get("0.5 ml"), Some(&3));
        assert_eq!(snapshot.finished.art.get("0.5 ml"), Some(&1));
        assert_eq!(snapshot.finished.total(), 10);

        let q = snapshot.quarantine.as_ref().unwrap();
        assert_eq!(q.unwashed, 5);
        assert_eq!(q.washed, 2);
        assert_eq!(q.art, 1);
        assert_eq!(q.washed_cc, 0);
        assert_eq!(q.unwashed_cc, 0);
        assert_eq!(q.total, 8);
        assert_eq!(q.displayed_total, Some(8));
        assert!(!q.total_mismatch());

        let sales = snapshot.sales.as_ref().unwrap();
        assert_eq!(sales["US"]["2024"], 12);
        assert_eq!(sales["International"]["2025"], 3);

        let families = snapshot.family_units.as_ref().unwrap();
        assert_eq!(families.get("US"), Some(&7));

        let advisory = snapshot.advisory.as_ref().unwrap();
        assert_eq!(advisory.family_limit, Some(25));
        assert_eq!(advisory.reported_families, Some(9));
        assert_eq!(advisory.limit_reached, Some(false));
    }

    #[test]
    fn test_displayed_total_mismatch_is_not_fatal() {
        let doc = ProfileDocument::parse(
            r#"<table class="inventory">
               <tr><td rowspan="3">Quarantine</td><td>Unwashed</td><td></td><td>5</td></tr>
               <tr><td>Washed</td><td></td><td>2</td></tr>
               <tr><td>Total</td><td></td><td>9</td></tr>
               </table>"#,
        );
        let q = parse_inventory(&doc).unwrap().quarantine.unwrap();
        assert_eq!(q.total, 7);
        assert_eq!(q.displayed_total, Some(9));
        assert!(q.total_mismatch());
    }

    #[test]
    fn test_secondary_tables_are_optional() {
        let doc = ProfileDocument::parse(
            r#"<table class="inventory">
               <tr><td>Finished</td><td>Washed</td><td>0.5 ml</td><td>6</td></tr>
               </table>"#,
        );
        let snapshot = parse_inventory(&doc).unwrap();
        assert_eq!(snapshot.finished.washed.get("0.5 ml"), Some(&6));
        assert_eq!(snapshot.quarantine, None);
        assert_eq!(snapshot.sales, None);
        assert_eq!(snapshot.family_units, None);
        assert_eq!(snapshot.advisory, None);
    }

    #[test]
    fn test_empty_report_is_none() {
        let doc = ProfileDocument::parse("<p>No inventory available.</p>");
        assert_eq!(parse_inventory(&doc), None);
    }
}
