//! Coverage and traceability matrix computation.
//!
//! Reconciles the requirement registry against the active template's
//! columns, the check catalog's requirement links, the control catalog's
//! rule links, and (when data is loaded) per-column population. The matrix
//! is recomputed wholesale on every build; there is no incremental state.

use std::collections::HashSet;

use einv_model::{
    CheckDefinition, Control, CoverageStatus, DataContext, GapsSummary, Record, Requirement,
    TraceabilityRow,
};

/// Inputs to one matrix build.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixInput<'a> {
    pub requirements: &'a [Requirement],
    pub checks: &'a [CheckDefinition],
    pub controls: &'a [Control],
    /// Column names of the active ingestion template.
    pub template_columns: &'a [String],
    /// Loaded dataset for population statistics; `None` before ingestion.
    pub data: Option<&'a DataContext>,
}

/// Build one traceability row per requirement plus the aggregate summary.
pub fn build_matrix(input: MatrixInput<'_>) -> (Vec<TraceabilityRow>, GapsSummary) {
    let template: HashSet<String> = input
        .template_columns
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();

    let mut rows = Vec::with_capacity(input.requirements.len());
    for requirement in input.requirements {
        rows.push(build_row(requirement, &template, input));
    }
    let summary = GapsSummary::from_rows(&rows);
    (rows, summary)
}

fn build_row(
    requirement: &Requirement,
    template: &HashSet<String>,
    input: MatrixInput<'_>,
) -> TraceabilityRow {
    let in_template = requirement
        .mapped_columns
        .iter()
        .any(|c| template.contains(&c.trim().to_lowercase()));

    // Rules give coverage through their requirement links; controls give
    // coverage through the rules they safeguard.
    let linked_rule_ids: Vec<&str> = input
        .checks
        .iter()
        .filter(|check| check.linked_requirements.iter().any(|id| id == &requirement.id))
        .map(|check| check.check_id.as_str())
        .collect();
    let control_count = input
        .controls
        .iter()
        .filter(|control| {
            control
                .linked_rules
                .iter()
                .any(|rule_id| linked_rule_ids.contains(&rule_id.as_str()))
        })
        .count();

    let coverage_status = if !in_template {
        CoverageStatus::NotInTemplate
    } else if linked_rule_ids.is_empty() {
        CoverageStatus::NoRule
    } else if control_count == 0 {
        CoverageStatus::NoControl
    } else {
        CoverageStatus::Covered
    };

    TraceabilityRow {
        requirement_id: requirement.id.clone(),
        business_term: requirement.business_term.clone(),
        mandatory: requirement.mandatory,
        new_in_spec: requirement.new_in_spec,
        dataset: requirement.dataset.clone(),
        mapped_columns: requirement.mapped_columns.clone(),
        in_template,
        ingestible: requirement.ingestible,
        population_pct: population_pct(requirement, input.data),
        rule_count: linked_rule_ids.len(),
        control_count,
        coverage_status,
    }
}

/// Non-empty percentage over the requirement's mapped columns within its
/// dataset. `None` when no data is loaded, the dataset is empty, or
/// nothing is mapped. When several columns are mapped, the best-populated
/// one counts. Rounding is left to presentation.
fn population_pct(requirement: &Requirement, data: Option<&DataContext>) -> Option<f64> {
    let data = data?;
    let records: &[Record] = match requirement.dataset.trim().to_lowercase().as_str() {
        "headers" | "header" => &data.headers,
        "lines" | "line" => &data.lines,
        "buyers" | "buyer" | "party" => &data.buyers,
        _ => return None,
    };
    if records.is_empty() || requirement.mapped_columns.is_empty() {
        return None;
    }
    requirement
        .mapped_columns
        .iter()
        .map(|column| {
            let non_empty = records.iter().filter(|r| !r.is_blank(column)).count();
            non_empty as f64 / records.len() as f64 * 100.0
        })
        .fold(None, |best: Option<f64>, pct| {
            Some(best.map_or(pct, |b| b.max(pct)))
        })
}
