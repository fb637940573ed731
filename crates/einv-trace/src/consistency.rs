//! Referential-integrity validation across the three catalogs.
//!
//! Run before any export: a rule pointing at a requirement that does not
//! exist, or a control pointing at an unknown rule, silently corrupts the
//! coverage matrix. Issues are reported, never panicked on.

use std::collections::HashSet;

use serde::Serialize;

use einv_model::{CheckDefinition, Control, Requirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyLevel {
    Error,
    Warning,
}

/// One cross-catalog integrity finding.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyIssue {
    pub level: ConsistencyLevel,
    /// The id of the offending catalog entry.
    pub subject: String,
    pub message: String,
}

impl ConsistencyIssue {
    fn error(subject: &str, message: String) -> Self {
        Self {
            level: ConsistencyLevel::Error,
            subject: subject.to_string(),
            message,
        }
    }

    fn warning(subject: &str, message: String) -> Self {
        Self {
            level: ConsistencyLevel::Warning,
            subject: subject.to_string(),
            message,
        }
    }
}

pub fn has_errors(issues: &[ConsistencyIssue]) -> bool {
    issues.iter().any(|i| i.level == ConsistencyLevel::Error)
}

/// Cross-check rule, control, and requirement catalogs.
pub fn validate_catalogs(
    checks: &[CheckDefinition],
    controls: &[Control],
    requirements: &[Requirement],
) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    let mut requirement_ids = HashSet::new();
    for requirement in requirements {
        if !requirement_ids.insert(requirement.id.as_str()) {
            issues.push(ConsistencyIssue::error(
                &requirement.id,
                format!("duplicate requirement id {}", requirement.id),
            ));
        }
    }

    let mut check_ids = HashSet::new();
    for check in checks {
        if !check_ids.insert(check.check_id.as_str()) {
            issues.push(ConsistencyIssue::error(
                &check.check_id,
                format!("duplicate check id {}", check.check_id),
            ));
        }
        for requirement_id in &check.linked_requirements {
            if !requirement_ids.contains(requirement_id.as_str()) {
                issues.push(ConsistencyIssue::error(
                    &check.check_id,
                    format!(
                        "check {} links unknown requirement {requirement_id}",
                        check.check_id
                    ),
                ));
            }
        }
    }

    let mut control_ids = HashSet::new();
    for control in controls {
        if !control_ids.insert(control.id.as_str()) {
            issues.push(ConsistencyIssue::error(
                &control.id,
                format!("duplicate control id {}", control.id),
            ));
        }
        if control.linked_rules.is_empty() {
            issues.push(ConsistencyIssue::warning(
                &control.id,
                format!("control {} is linked to no rules", control.id),
            ));
        }
        for rule_id in &control.linked_rules {
            if !check_ids.contains(rule_id.as_str()) {
                issues.push(ConsistencyIssue::error(
                    &control.id,
                    format!("control {} links unknown rule {rule_id}", control.id),
                ));
            }
        }
    }

    issues
}
