//! Requirement registry, control catalog, and traceability matrix types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One atomic data element defined by the business-term registry
/// (e.g. "Seller TRN").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub business_term: String,
    pub mandatory: bool,
    /// Newly introduced in the current revision of the e-invoicing
    /// regulation.
    #[serde(default)]
    pub new_in_spec: bool,
    /// Dataset/template placement (headers, lines, buyers).
    pub dataset: String,
    /// Template column(s) this requirement maps to. Empty when the active
    /// template does not carry the element.
    #[serde(default)]
    pub mapped_columns: Vec<String>,
    /// Whether the current parser/type support can ingest the mapped
    /// columns.
    #[serde(default = "default_true")]
    pub ingestible: bool,
}

fn default_true() -> bool {
    true
}

/// An organizational/process safeguard linked to one or more rules.
/// Tracked for traceability only; controls never execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub linked_rules: Vec<String>,
}

/// Requirement-level classification of how completely a requirement is
/// mapped, validated, and controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageStatus {
    /// No mapped column in the active template. Terminal unless the
    /// template changes.
    NotInTemplate,
    /// Mapped, but zero linked rules.
    NoRule,
    /// Mapped with at least one rule, but zero linked controls.
    NoControl,
    /// Mapped, validated, and controlled.
    Covered,
}

impl CoverageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageStatus::NotInTemplate => "NOT_IN_TEMPLATE",
            CoverageStatus::NoRule => "NO_RULE",
            CoverageStatus::NoControl => "NO_CONTROL",
            CoverageStatus::Covered => "COVERED",
        }
    }
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the requirement-to-control traceability matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceabilityRow {
    pub requirement_id: String,
    pub business_term: String,
    pub mandatory: bool,
    pub new_in_spec: bool,
    pub dataset: String,
    pub mapped_columns: Vec<String>,
    pub in_template: bool,
    pub ingestible: bool,
    /// Non-empty percentage over the mapped column; `None` when no dataset
    /// is loaded. Rounded only at presentation time.
    pub population_pct: Option<f64>,
    pub rule_count: usize,
    pub control_count: usize,
    pub coverage_status: CoverageStatus,
}

/// Aggregate gap counts over a full matrix. A pure projection of the row
/// set, recomputed on every build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapsSummary {
    pub total: usize,
    pub mandatory_total: usize,
    pub not_in_template: usize,
    pub no_rule: usize,
    pub no_control: usize,
    pub covered: usize,
    pub mandatory_not_in_template: usize,
    pub mandatory_no_rule: usize,
    pub mandatory_no_control: usize,
}

impl GapsSummary {
    pub fn from_rows(rows: &[TraceabilityRow]) -> Self {
        let mut summary = GapsSummary {
            total: rows.len(),
            ..GapsSummary::default()
        };
        for row in rows {
            if row.mandatory {
                summary.mandatory_total += 1;
            }
            match row.coverage_status {
                CoverageStatus::NotInTemplate => {
                    summary.not_in_template += 1;
                    if row.mandatory {
                        summary.mandatory_not_in_template += 1;
                    }
                }
                CoverageStatus::NoRule => {
                    summary.no_rule += 1;
                    if row.mandatory {
                        summary.mandatory_no_rule += 1;
                    }
                }
                CoverageStatus::NoControl => {
                    summary.no_control += 1;
                    if row.mandatory {
                        summary.mandatory_no_control += 1;
                    }
                }
                CoverageStatus::Covered => summary.covered += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(mandatory: bool, status: CoverageStatus) -> TraceabilityRow {
        TraceabilityRow {
            requirement_id: "DR-001".to_string(),
            business_term: "Seller TRN".to_string(),
            mandatory,
            new_in_spec: false,
            dataset: "headers".to_string(),
            mapped_columns: vec!["seller_trn".to_string()],
            in_template: status != CoverageStatus::NotInTemplate,
            ingestible: true,
            population_pct: None,
            rule_count: 0,
            control_count: 0,
            coverage_status: status,
        }
    }

    #[test]
    fn gaps_summary_counts_per_status() {
        let rows = vec![
            row(true, CoverageStatus::NotInTemplate),
            row(true, CoverageStatus::NoRule),
            row(false, CoverageStatus::NoControl),
            row(false, CoverageStatus::Covered),
        ];
        let summary = GapsSummary::from_rows(&rows);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.mandatory_total, 2);
        assert_eq!(summary.not_in_template, 1);
        assert_eq!(summary.mandatory_not_in_template, 1);
        assert_eq!(summary.no_rule, 1);
        assert_eq!(summary.mandatory_no_rule, 1);
        assert_eq!(summary.no_control, 1);
        assert_eq!(summary.mandatory_no_control, 0);
        assert_eq!(summary.covered, 1);
    }
}
