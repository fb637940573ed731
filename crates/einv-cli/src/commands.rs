use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{info, info_span, warn};

use einv_cli::logging::redact_value;
use einv_cli::report::write_findings_report_json;
use einv_match::{Candidate, ScoredField, Strictness, rank};
use einv_model::RunFindings;
use einv_trace::{
    build_matrix, load_checks, load_controls, load_custom_checks, load_data_context,
    load_requirements, load_template_columns, validate_catalogs,
};
use einv_trace::{MatrixInput, has_errors};
use einv_validate::fields::resolve_str;
use einv_validate::{RuleEngine, run_custom_checks, run_search_checks};

use crate::cli::{RunArgs, SearchArgs, StrictnessArg, TraceArgs};
use crate::types::{RunResult, SearchMatch, TraceResult};

pub fn run_checks(args: &RunArgs) -> Result<RunResult> {
    let run_span = info_span!("run", data_dir = %args.data_dir.display());
    let _run_guard = run_span.enter();
    let started = Instant::now();

    let ctx = load_data_context(&args.data_dir)?;
    if ctx.is_empty() {
        warn!(data_dir = %args.data_dir.display(), "no invoice records loaded");
    }
    let checks = load_checks(&args.data_dir.join("checks.json")).context("load check catalog")?;
    let custom_path = args.data_dir.join("custom_checks.json");
    let custom_checks = if custom_path.exists() {
        load_custom_checks(&custom_path).context("load custom checks")?
    } else {
        Vec::new()
    };
    info!(
        headers = ctx.headers.len(),
        lines = ctx.lines.len(),
        buyers = ctx.buyers.len(),
        checks = checks.len(),
        custom_checks = custom_checks.len(),
        "loaded batch"
    );

    let engine = match args.tolerance {
        Some(tolerance) => RuleEngine::with_tolerance(tolerance),
        None => RuleEngine::new(),
    };
    let mut exceptions = engine.run_all(&checks, &ctx);
    exceptions.extend(run_custom_checks(&custom_checks, &ctx));
    let flags = run_search_checks(&custom_checks, &ctx);
    let findings = RunFindings { exceptions, flags };

    let report_path = if args.dry_run {
        None
    } else {
        let output_dir = args
            .output_dir
            .clone()
            .unwrap_or_else(|| args.data_dir.join("output"));
        Some(write_findings_report_json(&output_dir, &findings)?)
    };
    info!(
        exceptions = findings.exceptions.len(),
        flags = findings.flags.len(),
        blocking = findings.blocking_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run complete"
    );

    Ok(RunResult {
        data_dir: args.data_dir.clone(),
        checks_run: checks.iter().filter(|c| c.is_enabled).count(),
        custom_checks_run: custom_checks.iter().filter(|c| c.is_active).count(),
        findings,
        report_path,
    })
}

pub fn run_trace(args: &TraceArgs) -> Result<TraceResult> {
    let trace_span = info_span!("trace", data_dir = %args.data_dir.display());
    let _trace_guard = trace_span.enter();

    let requirements = load_requirements(&args.data_dir.join("requirements.csv"))
        .context("load requirement registry")?;
    let controls =
        load_controls(&args.data_dir.join("controls.csv")).context("load control catalog")?;
    let checks = load_checks(&args.data_dir.join("checks.json")).context("load check catalog")?;
    let template_columns = load_template(args)?;
    let data = load_data_context(&args.data_dir)?;

    let issues = validate_catalogs(&checks, &controls, &requirements);
    for issue in &issues {
        warn!(subject = %issue.subject, level = ?issue.level, "{}", issue.message);
    }

    let (rows, summary) = build_matrix(MatrixInput {
        requirements: &requirements,
        checks: &checks,
        controls: &controls,
        template_columns: &template_columns,
        data: (!data.is_empty()).then_some(&data),
    });
    info!(
        requirements = rows.len(),
        covered = summary.covered,
        "matrix built"
    );
    let catalog_errors = has_errors(&issues);
    Ok(TraceResult {
        issues,
        rows,
        summary,
        has_errors: catalog_errors,
    })
}

fn load_template(args: &TraceArgs) -> Result<Vec<String>> {
    for name in ["template.csv", "template.json"] {
        let path = args.data_dir.join(name);
        if path.exists() {
            return load_template_columns(&path);
        }
    }
    warn!(data_dir = %args.data_dir.display(),
        "no template file found; all requirements will report as not in template");
    Ok(Vec::new())
}

pub fn run_search(args: &SearchArgs) -> Result<Vec<SearchMatch>> {
    let ctx = load_data_context(&args.data_dir)?;
    if ctx.headers.is_empty() {
        bail!("no invoice headers in {}", args.data_dir.display());
    }

    let candidates: Vec<Candidate> = ctx
        .headers
        .iter()
        .map(|header| {
            let number = resolve_str(header, "invoice_number").unwrap_or_default();
            Candidate::new(
                number.clone(),
                vec![
                    ScoredField::new("invoice_number", number, 3.0),
                    ScoredField::new(
                        "vendor_name",
                        resolve_str(header, "vendor_name").unwrap_or_default(),
                        2.0,
                    ),
                    ScoredField::new(
                        "seller_trn",
                        resolve_str(header, "seller_trn").unwrap_or_default(),
                        2.0,
                    ),
                    ScoredField::new(
                        "buyer_name",
                        resolve_str(header, "buyer_name").unwrap_or_default(),
                        1.0,
                    ),
                ],
            )
        })
        .collect();

    let strictness = match args.strictness {
        StrictnessArg::Strict => Strictness::Strict,
        StrictnessArg::Balanced => Strictness::Balanced,
        StrictnessArg::Loose => Strictness::Loose,
    };
    let ranked = rank(&args.query, &candidates, strictness);
    info!(
        query = redact_value(&args.query),
        matches = ranked.len(),
        strictness = strictness.as_str(),
        "search complete"
    );

    Ok(ranked
        .into_iter()
        .take(args.limit)
        .map(|m| {
            let header = &ctx.headers[m.index];
            SearchMatch {
                invoice_number: m.label,
                vendor_name: resolve_str(header, "vendor_name").unwrap_or_default(),
                seller_trn: resolve_str(header, "seller_trn").unwrap_or_default(),
                score: m.score,
            }
        })
        .collect())
}
