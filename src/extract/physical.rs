//! Physical attributes.
//!
//! When the template's physical-attributes container is present, its raw text
//! is segmented by the expected labels, which is more reliable than scanning
//! the whole page per label. Otherwise each attribute falls back to the
//! generic field extractor.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::document::element_text;
use super::field::FieldExtractor;
use super::labeled::segment_labeled_text;

const CONTAINER_SELECTORS: &[&str] = &[
    "div.physical-attributes",
    ".physical-characteristics",
    "#physical-attributes",
];

pub const PHYSICAL_LABELS: &[&str] = &[
    "Height",
    "Weight",
    "Eye Color",
    "Hair Color",
    "Hair Texture",
    "Skin Tone",
    "Body Build",
    "Blood Type",
];

pub const HEIGHT_RANGE_CM: (f64, f64) = (100.0, 250.0);
pub const WEIGHT_RANGE_KG: (f64, f64) = (35.0, 180.0);

static CM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*cm\b").expect("valid regex"));
static METRES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d(?:\.\d+)?)\s*m\b").expect("valid regex"));
static FEET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\d)\s*(?:'|’|ft\.?|feet)\s*(?:(\d{1,2}(?:\.\d+)?)\s*(?:"|”|''|in\.?|inches)?)?"#)
        .expect("valid regex")
});
static KG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*kgs?\b").expect("valid regex"));
static LBS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:lbs?\.?|pounds)").expect("valid regex")
});
static PLAIN_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").expect("valid regex"));

/// Physical attributes extracted from a profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalAttributes {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub eye_color: Option<String>,
    pub hair_color: Option<String>,
    pub hair_texture: Option<String>,
    pub skin_tone: Option<String>,
    pub body_build: Option<String>,
    pub blood_type: Option<String>,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn within(v: f64, (min, max): (f64, f64)) -> Option<f64> {
    (min..=max).contains(&v).then_some(v)
}

/// Parse a height in centimetres, converting feet/inches and metres.
pub fn parse_height_cm(value: &str) -> Option<f64> {
    let cm = if let Some(c) = CM_RE.captures(value) {
        c[1].parse::<f64>().ok()?
    } else if let Some(c) = FEET_RE.captures(value) {
        let feet: f64 = c[1].parse().ok()?;
        let inches: f64 = c.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0.0);
        (feet * 12.0 + inches) * 2.54
    } else if let Some(c) = METRES_RE.captures(value) {
        c[1].parse::<f64>().ok()? * 100.0
    } else {
        PLAIN_NUMBER_RE.captures(value)?[1].parse::<f64>().ok()?
    };
    within(round1(cm), HEIGHT_RANGE_CM)
}

/// Parse a weight in kilograms, converting pounds.
pub fn parse_weight_kg(value: &str) -> Option<f64> {
    let kg = if let Some(c) = KG_RE.captures(value) {
        c[1].parse::<f64>().ok()?
    } else if let Some(c) = LBS_RE.captures(value) {
        c[1].parse::<f64>().ok()? * 0.453_592
    } else {
        PLAIN_NUMBER_RE.captures(value)?[1].parse::<f64>().ok()?
    };
    within(round1(kg), WEIGHT_RANGE_KG)
}

fn from_fields(fields: &BTreeMap<&str, String>) -> PhysicalAttributes {
    let text = |label: &str| fields.get(label).cloned();
    PhysicalAttributes {
        height_cm: fields.get("Height").and_then(|v| parse_height_cm(v)),
        weight_kg: fields.get("Weight").and_then(|v| parse_weight_kg(v)),
        eye_color: text("Eye Color"),
        hair_color: text("Hair Color"),
        hair_texture: text("Hair Texture"),
        skin_tone: text("Skin Tone"),
        body_build: text("Body Build"),
        blood_type: text("Blood Type"),
    }
}

impl FieldExtractor<'_> {
    /// Physical attributes, preferring the dedicated container when present.
    pub fn extract_physical(&self) -> PhysicalAttributes {
        let container = self.document().first_match(CONTAINER_SELECTORS);
        let from_container = container
            .map(|el| from_fields(&segment_labeled_text(&element_text(el), PHYSICAL_LABELS)))
            .unwrap_or_default();

        PhysicalAttributes {
            height_cm: from_container
                .height_cm
                .or_else(|| self.extract_field("Height").and_then(|v| parse_height_cm(&v))),
            weight_kg: from_container
                .weight_kg
                .or_else(|| self.extract_field("Weight").and_then(|v| parse_weight_kg(&v))),
            eye_color: from_container.eye_color.or_else(|| self.extract_field("Eye Color")),
            hair_color: from_container.hair_color.or_else(|| self.extract_field("Hair Color")),
            hair_texture: from_container
                .hair_texture
                .or_else(|| self.extract_field("Hair Texture")),
            skin_tone: from_container.skin_tone.or_else(|| self.extract_field("Skin Tone")),
            body_build: from_container
                .body_build
                .or_else(|| self.extract_any(&["Body Build", "Build"])),
            blood_type: from_container.blood_type.or_else(|| self.extract_field("Blood Type")),
        }
    }
}
