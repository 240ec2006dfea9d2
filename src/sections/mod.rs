//! Section parsers: pure transformations of a captured page.

pub mod family;
pub mod genetic;
pub mod health;
pub mod inventory;

pub use family::parse_family_history;
pub use genetic::parse_genetic_tests;
pub use health::parse_health_conditions;
pub use inventory::parse_inventory;
