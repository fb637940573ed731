//! Tenant-authored ad-hoc check execution.
//!
//! Five hard-exception kinds run here: missing, duplicate-key, math
//! comparison, regex pattern, and boolean formula. The three pairwise
//! search kinds produce investigation flags instead and live in
//! [`crate::search`].
//!
//! Failure policy per kind: a check missing its required parameters emits
//! nothing and logs a `warn`; a record whose expression cannot be
//! evaluated is skipped (math) or treated as in-scope (condition gates),
//! never crashed on.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use einv_match::{normalize_invoice_number, normalize_trn, normalize_vendor_name};
use einv_model::{CheckScope, CustomCheck, CustomCheckKind, DataContext, Exception, Record};
use regex::Regex;

use crate::catalog::{Emitter, Linkage};
use crate::expr;

/// Execute one ad-hoc check, producing hard exceptions.
///
/// Search kinds are rejected here; route them through
/// [`crate::search::run_search_check`].
pub fn run_custom_check(check: &CustomCheck, ctx: &DataContext) -> Vec<Exception> {
    if !check.is_active {
        return Vec::new();
    }
    if check.kind.is_search() {
        warn!(check_id = %check.id, kind = %check.kind,
            "search kind routed to the exception engine; skipping");
        return Vec::new();
    }
    let condition = check.condition.as_deref().and_then(|src| {
        match expr::parse(src) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                // A broken gate does not disable the rule.
                warn!(check_id = %check.id, %error, "condition failed to parse; rule runs ungated");
                None
            }
        }
    });
    let mut emitter = Emitter::for_custom(check);
    let records = records_for(ctx, check.dataset);
    match check.kind {
        CustomCheckKind::Missing => run_missing(check, ctx, records, condition.as_ref(), &mut emitter),
        CustomCheckKind::Duplicate => {
            run_duplicate(check, ctx, records, condition.as_ref(), &mut emitter);
        }
        CustomCheckKind::Math => run_math(check, ctx, records, condition.as_ref(), &mut emitter),
        CustomCheckKind::Regex => run_regex(check, ctx, records, condition.as_ref(), &mut emitter),
        CustomCheckKind::CustomFormula => {
            run_formula(check, ctx, records, condition.as_ref(), &mut emitter);
        }
        CustomCheckKind::FuzzyDuplicate
        | CustomCheckKind::InvoiceNumberVariant
        | CustomCheckKind::TrnFormatSimilarity => unreachable!("search kinds rejected above"),
    }
    emitter.finish()
}

/// Execute every active non-search check, concatenated in check order.
pub fn run_custom_checks(checks: &[CustomCheck], ctx: &DataContext) -> Vec<Exception> {
    let mut exceptions = Vec::new();
    for check in checks.iter().filter(|c| c.is_active && !c.kind.is_search()) {
        exceptions.extend(run_custom_check(check, ctx));
    }
    exceptions
}

fn records_for(ctx: &DataContext, scope: CheckScope) -> &[Record] {
    match scope {
        CheckScope::Header | CheckScope::CrossFile => &ctx.headers,
        CheckScope::Lines => &ctx.lines,
        CheckScope::Party => &ctx.buyers,
    }
}

fn linkage_for(record: &Record, scope: CheckScope, ctx: &DataContext) -> Linkage {
    match scope {
        CheckScope::Header | CheckScope::CrossFile => Linkage::header(record),
        CheckScope::Lines => Linkage::line(record, ctx),
        CheckScope::Party => Linkage::buyer(record),
    }
}

/// Evaluation errors in a gate default to "in scope": the rule still runs.
fn gate_passes(condition: Option<&expr::Expr>, record: &Record) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    match condition.eval(record) {
        Ok(value) => value.is_truthy(),
        Err(_) => true,
    }
}

fn run_missing(
    check: &CustomCheck,
    ctx: &DataContext,
    records: &[Record],
    condition: Option<&expr::Expr>,
    emitter: &mut Emitter,
) {
    let Some(field) = check.param_str("field") else {
        warn!(check_id = %check.id, "missing check has no 'field' parameter; skipping");
        return;
    };
    for record in records {
        if !gate_passes(condition, record) {
            continue;
        }
        if record.is_blank(field) {
            emitter.emit(
                linkage_for(record, check.dataset, ctx),
                Some(field),
                None,
                Some("non-empty value".to_string()),
                None,
            );
        }
    }
}

/// Normalization applied to key components before grouping, so formatting
/// noise does not split a duplicate group.
fn normalize_for_key(field: &str, value: &str) -> String {
    let lower = field.to_lowercase();
    if lower.contains("trn") {
        normalize_trn(value)
    } else if lower.contains("invoice_number") || lower.contains("inv_no") {
        normalize_invoice_number(value)
    } else if lower.contains("name") || lower.contains("vendor") {
        normalize_vendor_name(value)
    } else {
        value.trim().to_lowercase()
    }
}

fn run_duplicate(
    check: &CustomCheck,
    ctx: &DataContext,
    records: &[Record],
    condition: Option<&expr::Expr>,
    emitter: &mut Emitter,
) {
    let Some(key_fields) = check.param_str_list("fields").filter(|f| !f.is_empty()) else {
        warn!(check_id = %check.id, "duplicate check has no 'fields' parameter; skipping");
        return;
    };
    // Group record indices by composite key; records with any blank key
    // component are not groupable.
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, record) in records.iter().enumerate() {
        if !gate_passes(condition, record) {
            continue;
        }
        let mut parts = Vec::with_capacity(key_fields.len());
        let mut complete = true;
        for field in &key_fields {
            match record.field_str(field) {
                Some(value) if !value.trim().is_empty() => {
                    parts.push(normalize_for_key(field, &value));
                }
                _ => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            groups.entry(parts.join("|")).or_default().push(idx);
        }
    }
    // One exception per member of each oversized group, in record order.
    let mut flagged: Vec<(usize, usize)> = Vec::new();
    for indices in groups.values() {
        if indices.len() > 1 {
            for idx in indices {
                flagged.push((*idx, indices.len()));
            }
        }
    }
    flagged.sort_by_key(|(idx, _)| *idx);
    for (idx, group_size) in flagged {
        let record = &records[idx];
        emitter.emit(
            linkage_for(record, check.dataset, ctx),
            None,
            None,
            None,
            Some(format!(
                "{group_size} records share key ({})",
                key_fields.join(", ")
            )),
        );
    }
}

fn run_math(
    check: &CustomCheck,
    ctx: &DataContext,
    records: &[Record],
    condition: Option<&expr::Expr>,
    emitter: &mut Emitter,
) {
    let (Some(left_src), Some(right_src)) = (check.param_str("left"), check.param_str("right"))
    else {
        warn!(check_id = %check.id, "math check needs 'left' and 'right' expressions; skipping");
        return;
    };
    let operator = check.param_str("operator").unwrap_or("=");
    let tolerance = check.param_f64("tolerance").unwrap_or(0.01);
    let (Ok(left), Ok(right)) = (expr::parse(left_src), expr::parse(right_src)) else {
        warn!(check_id = %check.id, "math expression failed to parse; skipping check");
        return;
    };
    for record in records {
        if !gate_passes(condition, record) {
            continue;
        }
        // Missing or non-numeric fields make the record not-applicable.
        let (Some(lv), Some(rv)) = (eval_num(&left, record), eval_num(&right, record)) else {
            debug!(check_id = %check.id, "record skipped: expression not evaluable");
            continue;
        };
        let holds = match operator {
            "=" | "==" => (lv - rv).abs() <= tolerance,
            "!=" | "<>" => (lv - rv).abs() > tolerance,
            ">" => lv > rv,
            "<" => lv < rv,
            ">=" => lv >= rv,
            "<=" => lv <= rv,
            other => {
                warn!(check_id = %check.id, operator = other, "unknown operator; skipping check");
                return;
            }
        };
        if !holds {
            emitter.emit(
                linkage_for(record, check.dataset, ctx),
                None,
                Some(format!("{lv}")),
                Some(format!("{operator} {rv}")),
                None,
            );
        }
    }
}

fn eval_num(parsed: &expr::Expr, record: &Record) -> Option<f64> {
    match parsed.eval(record).ok()? {
        expr::ExprValue::Num(n) => Some(n),
        expr::ExprValue::Str(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn run_regex(
    check: &CustomCheck,
    ctx: &DataContext,
    records: &[Record],
    condition: Option<&expr::Expr>,
    emitter: &mut Emitter,
) {
    let (Some(field), Some(pattern)) = (check.param_str("field"), check.param_str("pattern"))
    else {
        warn!(check_id = %check.id, "regex check needs 'field' and 'pattern'; skipping");
        return;
    };
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => {
            warn!(check_id = %check.id, %error, "invalid pattern; skipping check");
            return;
        }
    };
    for record in records {
        if !gate_passes(condition, record) {
            continue;
        }
        // Blank fields are exempt; the missing kind owns those.
        let Some(value) = record.field_str(field) else {
            continue;
        };
        let trimmed = value.trim();
        if trimmed.is_empty() || regex.is_match(trimmed) {
            continue;
        }
        emitter.emit(
            linkage_for(record, check.dataset, ctx),
            Some(field),
            Some(trimmed.to_string()),
            Some(format!("match {pattern}")),
            None,
        );
    }
}

fn run_formula(
    check: &CustomCheck,
    ctx: &DataContext,
    records: &[Record],
    condition: Option<&expr::Expr>,
    emitter: &mut Emitter,
) {
    let Some(formula_src) = check.param_str("formula") else {
        warn!(check_id = %check.id, "formula check has no 'formula' parameter; skipping");
        return;
    };
    let formula = match expr::parse(formula_src) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(check_id = %check.id, %error, "formula failed to parse; skipping check");
            return;
        }
    };
    for record in records {
        if !gate_passes(condition, record) {
            continue;
        }
        match formula.eval(record) {
            Ok(value) if !value.is_truthy() => {
                // No field-specific detail beyond the message.
                emitter.emit(linkage_for(record, check.dataset, ctx), None, None, None, None);
            }
            Ok(_) => {}
            Err(_) => {
                debug!(check_id = %check.id, "record skipped: formula not evaluable");
            }
        }
    }
}
