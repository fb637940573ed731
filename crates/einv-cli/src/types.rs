use std::path::PathBuf;

use einv_model::{RunFindings, TraceabilityRow};
use einv_trace::ConsistencyIssue;

#[derive(Debug)]
pub struct RunResult {
    pub data_dir: PathBuf,
    pub checks_run: usize,
    pub custom_checks_run: usize,
    pub findings: RunFindings,
    pub report_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct TraceResult {
    pub issues: Vec<ConsistencyIssue>,
    pub rows: Vec<TraceabilityRow>,
    pub summary: einv_model::GapsSummary,
    pub has_errors: bool,
}

#[derive(Debug)]
pub struct SearchMatch {
    pub invoice_number: String,
    pub vendor_name: String,
    pub seller_trn: String,
    pub score: f64,
}
