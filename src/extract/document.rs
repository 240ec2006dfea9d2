//! Helpers over a captured HTML snapshot.
//!
//! Everything here is a pure function of the parsed document; no browser
//! state is involved once the page HTML has been captured.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));
static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));

/// A parsed page snapshot.
pub struct ProfileDocument {
    html: Html,
}

impl ProfileDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Visible text of the whole document.
    pub fn text(&self) -> String {
        element_text(self.html.root_element())
    }

    /// Page title, if any.
    pub fn title(&self) -> Option<String> {
        let sel = Selector::parse("title").ok()?;
        self.html
            .select(&sel)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    }

    /// First element matching any of the CSS selectors, in list order.
    pub fn first_match(&self, selectors: &[&str]) -> Option<ElementRef<'_>> {
        selectors.iter().find_map(|css| {
            let sel = Selector::parse(css).ok()?;
            self.html.select(&sel).next()
        })
    }

    /// Locate the first table that follows a heading containing `heading`.
    pub fn table_after_heading(&self, heading: &str) -> Option<ElementRef<'_>> {
        let needle = heading.to_lowercase();
        for h in self.html.select(&HEADING_SEL) {
            if !element_text(h).to_lowercase().contains(&needle) {
                continue;
            }
            if let Some(table) = following_table(h) {
                return Some(table);
            }
        }
        None
    }

    /// Text of the elements following a heading containing `heading`, up to
    /// the next heading.
    pub fn text_after_heading(&self, heading: &str) -> Option<String> {
        let needle = heading.to_lowercase();
        let h = self
            .html
            .select(&HEADING_SEL)
            .find(|h| element_text(*h).to_lowercase().contains(&needle))?;
        let parts: Vec<String> = h
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take_while(|sibling| !HEADING_SEL.matches(sibling))
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// Walk siblings after a heading until a table (or an element containing one)
/// is found; stop at the next heading.
fn following_table(heading: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = Some(heading);
    // Headings are often wrapped in a header div; climb one level if needed.
    for _ in 0..2 {
        let start = current?;
        for sibling in start.next_siblings().filter_map(ElementRef::wrap) {
            if HEADING_SEL.matches(&sibling) {
                return None;
            }
            if TABLE_SEL.matches(&sibling) {
                return Some(sibling);
            }
            if let Some(inner) = sibling.select(&TABLE_SEL).next() {
                return Some(inner);
            }
        }
        current = start.parent().and_then(ElementRef::wrap);
    }
    None
}

/// Visible text of an element: text nodes outside `script`/`style`,
/// separated by spaces and whitespace-collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in el.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
            });
            if !hidden {
                parts.push(text);
            }
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// Text of the text nodes directly following an element, up to the next element.
pub fn trailing_text(el: ElementRef<'_>) -> Option<String> {
    let mut out = String::new();
    for sibling in el.next_siblings() {
        match sibling.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => break,
            _ => {}
        }
    }
    let out = collapse_whitespace(&out);
    (!out.is_empty()).then_some(out)
}

/// Next sibling that is an element.
pub fn next_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

/// Previous sibling that is an element.
pub fn prev_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.prev_siblings().find_map(ElementRef::wrap)
}

/// Direct child cells (`th`/`td`) of a table row.
pub fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .collect()
}

/// Collapse runs of whitespace (including non-breaking spaces) and trim.
pub fn collapse_whitespace(s: &str) -> String {
    WS_RE
        .replace_all(&s.replace('\u{a0}', " "), " ")
        .trim()
        .to_string()
}

/// Remove markup and decode the handful of entities that survive text capture.
pub fn strip_markup(s: &str) -> String {
    let stripped = TAG_RE.replace_all(s, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    collapse_whitespace(&decoded)
}

/// Normalize a label for comparison: lowercase, no trailing colon.
pub fn normalize_label(s: &str) -> String {
    collapse_whitespace(s)
        .trim_end_matches(':')
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_text_skips_scripts() {
        let doc = ProfileDocument::parse(
            "<html><body><p>Hello <b>there</b></p><script>var x = 1;</script></body></html>",
        );
        assert_eq!(doc.text(), "Hello there");
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<b>Blue</b>&nbsp;&amp; <i>Green</i>"), "Blue & Green");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Eye   Color: "), "eye color");
    }

    #[test]
    fn test_table_after_heading() {
        let doc = ProfileDocument::parse(
            r#"<div><h3>Sales</h3><p>note</p><table id="sales"><tr><td>x</td></tr></table>
               <h3>Other</h3><table id="other"></table></div>"#,
        );
        let table = doc.table_after_heading("sales").unwrap();
        assert_eq!(table.value().attr("id"), Some("sales"));
        assert!(doc.table_after_heading("missing").is_none());
    }

    #[test]
    fn test_table_after_wrapped_heading() {
        let doc = ProfileDocument::parse(
            r#"<section><div class="hdr"><h4>Family Units</h4></div>
               <div class="body"><table id="fu"></table></div></section>"#,
        );
        let table = doc.table_after_heading("family units").unwrap();
        assert_eq!(table.value().attr("id"), Some("fu"));
    }

    #[test]
    fn test_text_after_heading_stops_at_next_heading() {
        let doc = ProfileDocument::parse(
            "<h3>Paternal</h3><p>Grandfather</p><p>Age: 80</p><h3>Maternal</h3><p>Aunt</p>",
        );
        assert_eq!(doc.text_after_heading("paternal").as_deref(), Some("Grandfather Age: 80"));
        assert_eq!(doc.text_after_heading("cousins"), None);
    }

    #[test]
    fn test_trailing_text() {
        let doc = ProfileDocument::parse("<p><strong>Height:</strong> 180 cm<br>next</p>");
        let sel = Selector::parse("strong").unwrap();
        let strong = doc.html().select(&sel).next().unwrap();
        assert_eq!(trailing_text(strong).as_deref(), Some("180 cm"));
    }
}
