mod catalog;
mod custom;
pub mod expr;
pub mod fields;
mod search;

pub use catalog::RuleEngine;
pub use custom::{run_custom_check, run_custom_checks};
pub use search::{run_search_check, run_search_checks};
