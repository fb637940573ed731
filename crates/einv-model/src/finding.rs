//! Findings produced by the compliance engines: hard exceptions and
//! soft investigation flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::check::{CheckScope, CustomCheckKind, RuleType, Severity};

/// Case-workflow status of an exception. The only mutable part of a
/// finding; everything else is frozen at evaluation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    #[default]
    Open,
    InReview,
    Resolved,
    Waived,
}

impl ExceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionStatus::Open => "Open",
            ExceptionStatus::InReview => "In Review",
            ExceptionStatus::Resolved => "Resolved",
            ExceptionStatus::Waived => "Waived",
        }
    }
}

/// A hard validation failure tied to a specific record and check.
///
/// A re-run produces a fresh set; exceptions are never recomputed in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exception {
    pub id: String,
    pub check_id: String,
    pub severity: Severity,
    pub scope: CheckScope,
    pub rule_type: RuleType,
    /// Record linkage. Whatever the originating record carried.
    pub invoice_id: Option<String>,
    pub invoice_number: Option<String>,
    pub seller_trn: Option<String>,
    pub buyer_id: Option<String>,
    pub line_id: Option<String>,
    /// Field the check evaluated, when the check is field-specific.
    pub field: Option<String>,
    /// Observed vs. expected, rendered as display strings.
    pub observed: Option<String>,
    pub expected: Option<String>,
    pub message: String,
    pub suggested_fix: Option<String>,
    /// Resolution SLA derived from severity at creation time and frozen.
    pub sla_hours: u32,
    #[serde(default)]
    pub status: ExceptionStatus,
    #[serde(default)]
    pub reason_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Exception {
    /// Critical/High findings gate strict outputs and exit codes.
    pub fn is_blocking(&self) -> bool {
        matches!(self.severity, Severity::Critical | Severity::High)
    }
}

/// A soft, confidence-scored lead from pairwise similarity search.
///
/// Flags carry no SLA or workflow fields: they are leads, not defects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationFlag {
    pub id: String,
    pub check_id: String,
    pub kind: CustomCheckKind,
    /// 0-100.
    pub confidence: u8,
    pub invoice_id: Option<String>,
    pub invoice_number: Option<String>,
    /// The counterpart record this one matched against.
    pub matched_invoice_id: Option<String>,
    pub matched_invoice_number: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// All findings from one compliance run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFindings {
    pub exceptions: Vec<Exception>,
    pub flags: Vec<InvestigationFlag>,
}

impl RunFindings {
    pub fn count_at(&self, severity: Severity) -> usize {
        self.exceptions
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }

    pub fn blocking_count(&self) -> usize {
        self.exceptions.iter().filter(|e| e.is_blocking()).count()
    }

    pub fn has_blocking(&self) -> bool {
        self.blocking_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exception(severity: Severity) -> Exception {
        Exception {
            id: "EX-0001".to_string(),
            check_id: "EINV-001".to_string(),
            severity,
            scope: CheckScope::Header,
            rule_type: RuleType::Presence,
            invoice_id: Some("INV-1".to_string()),
            invoice_number: None,
            seller_trn: None,
            buyer_id: None,
            line_id: None,
            field: Some("seller_trn".to_string()),
            observed: None,
            expected: Some("non-empty".to_string()),
            message: "Seller TRN is missing".to_string(),
            suggested_fix: None,
            sla_hours: severity.sla_hours(),
            status: ExceptionStatus::default(),
            reason_code: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn findings_counts() {
        let findings = RunFindings {
            exceptions: vec![
                exception(Severity::Critical),
                exception(Severity::High),
                exception(Severity::Low),
            ],
            flags: Vec::new(),
        };
        assert_eq!(findings.count_at(Severity::Critical), 1);
        assert_eq!(findings.blocking_count(), 2);
        assert!(findings.has_blocking());
    }

    #[test]
    fn exception_round_trips() {
        let ex = exception(Severity::Medium);
        let json = serde_json::to_string(&ex).expect("serialize exception");
        let round: Exception = serde_json::from_str(&json).expect("deserialize exception");
        assert_eq!(round.sla_hours, 72);
        assert_eq!(round.status, ExceptionStatus::Open);
    }
}
