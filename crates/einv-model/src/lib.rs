pub mod check;
pub mod error;
pub mod finding;
pub mod record;
pub mod traceability;

pub use check::{
    CheckDefinition, CheckScope, CustomCheck, CustomCheckKind, RuleType, Severity,
};
pub use error::{EinvError, Result};
pub use finding::{Exception, ExceptionStatus, InvestigationFlag, RunFindings};
pub use record::{DataContext, INVOICE_ID_FIELD, Record};
pub use traceability::{
    Control, CoverageStatus, GapsSummary, Requirement, TraceabilityRow,
};
