//! JSON findings report.
//!
//! The payload is schema-versioned so downstream case-management tooling
//! can detect layout changes instead of guessing from field shapes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use einv_model::{RunFindings, Severity};

pub const REPORT_SCHEMA: &str = "einv.findings_report";
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Exception counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &RunFindings) -> Self {
        Self {
            critical: findings.count_at(Severity::Critical),
            high: findings.count_at(Severity::High),
            medium: findings.count_at(Severity::Medium),
            low: findings.count_at(Severity::Low),
        }
    }
}

/// The on-disk report layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingsReportPayload {
    pub schema: String,
    pub schema_version: u32,
    pub generated_at: String,
    pub severity_counts: SeverityCounts,
    /// Critical plus High exceptions; what submission gating keys on.
    pub blocking_count: usize,
    pub exceptions: Vec<einv_model::Exception>,
    pub flags: Vec<einv_model::InvestigationFlag>,
}

impl FindingsReportPayload {
    pub fn new(findings: &RunFindings) -> Self {
        Self {
            schema: REPORT_SCHEMA.to_string(),
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            severity_counts: SeverityCounts::from_findings(findings),
            blocking_count: findings.blocking_count(),
            exceptions: findings.exceptions.clone(),
            flags: findings.flags.clone(),
        }
    }
}

/// Write `findings_report.json` under `output_dir`, creating it if needed.
///
/// # Errors
///
/// Returns an error when the directory cannot be created or the file
/// cannot be written.
pub fn write_findings_report_json(output_dir: &Path, findings: &RunFindings) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("create output dir: {}", output_dir.display()))?;
    let output_path = output_dir.join("findings_report.json");
    let payload = FindingsReportPayload::new(findings);
    let json = serde_json::to_string_pretty(&payload).context("serialize findings report")?;
    std::fs::write(&output_path, format!("{json}\n"))
        .with_context(|| format!("write report: {}", output_path.display()))?;
    Ok(output_path)
}
