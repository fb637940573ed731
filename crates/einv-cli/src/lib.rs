//! CLI library components for the e-invoicing compliance engine.

pub mod logging;
pub mod report;
