//! Pure extraction over captured profile HTML.

pub mod document;
pub mod field;
pub mod identity;
pub mod labeled;
pub mod physical;
pub mod profile;

pub use document::ProfileDocument;
pub use field::FieldExtractor;
pub use physical::PhysicalAttributes;
pub use profile::{detect_missing_page, extract_record, extract_subject};
