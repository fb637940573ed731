//! Pairwise search checks: soft, confidence-scored investigation flags.
//!
//! Unlike the exception kinds, these never report defects; they surface
//! leads (probable duplicates, invoice-number variants, TRN formatting
//! drift) for a reviewer to chase. Every matched pair emits two flags, one
//! from each record's perspective, and a function-local seen-pair set
//! prevents re-emission when the pair is encountered in the reverse order.
//!
//! The comparison is O(n²) over header records; acceptable for the
//! interactive datasets this engine targets (a few thousand invoices).
//! Cheap per-kind prefilters (length deltas, normalized-key equality)
//! short-circuit most pairs before any edit-distance work.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use einv_match::{edit_distance, normalize_invoice_number, normalize_trn, normalize_vendor_name, similarity};
use einv_model::{CustomCheck, CustomCheckKind, DataContext, InvestigationFlag, Record};

use crate::catalog::parse_date;
use crate::fields;

/// Execute one search-kind check over the header population.
pub fn run_search_check(check: &CustomCheck, ctx: &DataContext) -> Vec<InvestigationFlag> {
    if !check.is_active {
        return Vec::new();
    }
    if !check.kind.is_search() {
        warn!(check_id = %check.id, kind = %check.kind,
            "non-search kind routed to the search engine; skipping");
        return Vec::new();
    }
    let mut flags = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let created_at = Utc::now();
    let headers = &ctx.headers;
    for i in 0..headers.len() {
        for j in (i + 1)..headers.len() {
            let a = &headers[i];
            let b = &headers[j];
            let key = pair_key(a, b, i, j);
            if seen.contains(&key) {
                continue;
            }
            let matched = match check.kind {
                CustomCheckKind::FuzzyDuplicate => match_fuzzy_duplicate(check, a, b),
                CustomCheckKind::InvoiceNumberVariant => match_number_variant(check, a, b),
                CustomCheckKind::TrnFormatSimilarity => match_trn_drift(a, b),
                _ => unreachable!("non-search kinds rejected above"),
            };
            if let Some((confidence, detail)) = matched {
                seen.insert(key);
                emit_pair(check, a, b, confidence, &detail, created_at, &mut flags);
            }
        }
    }
    flags
}

/// Execute every active search-kind check.
pub fn run_search_checks(checks: &[CustomCheck], ctx: &DataContext) -> Vec<InvestigationFlag> {
    let mut flags = Vec::new();
    for check in checks.iter().filter(|c| c.is_active && c.kind.is_search()) {
        flags.extend(run_search_check(check, ctx));
    }
    flags
}

/// Order-independent pair identity. Invoice ids when present, record
/// positions otherwise.
fn pair_key(a: &Record, b: &Record, i: usize, j: usize) -> (String, String) {
    let ka = a
        .field_str("invoice_id")
        .unwrap_or_else(|| format!("#{i}"));
    let kb = b
        .field_str("invoice_id")
        .unwrap_or_else(|| format!("#{j}"));
    if ka <= kb { (ka, kb) } else { (kb, ka) }
}

/// Same vendor (fuzzy), same amount (within tolerance), close dates.
fn match_fuzzy_duplicate(check: &CustomCheck, a: &Record, b: &Record) -> Option<(u8, String)> {
    let min_similarity = check.param_f64("min_similarity").unwrap_or(0.9);
    let amount_tolerance = check.param_f64("amount_tolerance").unwrap_or(0.01);
    let date_window = check.param_f64("date_window_days").unwrap_or(3.0) as i64;

    let vendor_a = normalize_vendor_name(&fields::resolve_str(a, "vendor_name")?);
    let vendor_b = normalize_vendor_name(&fields::resolve_str(b, "vendor_name")?);
    if vendor_a.is_empty() || vendor_b.is_empty() {
        return None;
    }
    let vendor_similarity = similarity(&vendor_a, &vendor_b);
    if vendor_similarity < min_similarity {
        return None;
    }

    let amount_a = fields::resolve_f64(a, "total_incl_vat")?;
    let amount_b = fields::resolve_f64(b, "total_incl_vat")?;
    if (amount_a - amount_b).abs() > amount_tolerance {
        return None;
    }

    let date_a = parse_date(&fields::resolve_str(a, "invoice_date")?)?;
    let date_b = parse_date(&fields::resolve_str(b, "invoice_date")?)?;
    if (date_a - date_b).num_days().abs() > date_window {
        return None;
    }

    // Average of vendor similarity and a constant ceiling; a perfect
    // vendor match is still only a lead, not proof.
    let confidence = (((vendor_similarity + 0.95) / 2.0) * 100.0).round().min(100.0) as u8;
    let detail = format!(
        "same vendor ({:.0}% similar), amount {amount_a:.2}, dates {} day(s) apart",
        vendor_similarity * 100.0,
        (date_a - date_b).num_days().abs()
    );
    Some((confidence, detail))
}

/// Near-but-not-identical invoice numbers after separator stripping.
fn match_number_variant(check: &CustomCheck, a: &Record, b: &Record) -> Option<(u8, String)> {
    let min_similarity = check.param_f64("min_similarity").unwrap_or(0.85);
    let number_a = normalize_invoice_number(&fields::resolve_str(a, "invoice_number")?);
    let number_b = normalize_invoice_number(&fields::resolve_str(b, "invoice_number")?);
    if number_a.is_empty() || number_b.is_empty() || number_a == number_b {
        // Identical normalized numbers are the duplicate kind's territory.
        return None;
    }
    // Length prefilter: a variant differs by a character or two, not by a
    // different numbering scheme.
    if number_a.chars().count().abs_diff(number_b.chars().count()) > 3 {
        return None;
    }
    let score = similarity(&number_a, &number_b);
    if score < min_similarity {
        return None;
    }
    let confidence = (score * 100.0).round().min(100.0) as u8;
    Some((confidence, format!("invoice numbers {:.0}% similar", score * 100.0)))
}

/// Same registration number under different formatting.
fn match_trn_drift(a: &Record, b: &Record) -> Option<(u8, String)> {
    let raw_a = fields::resolve_str(a, "seller_trn")?;
    let raw_b = fields::resolve_str(b, "seller_trn")?;
    let raw_a = raw_a.trim();
    let raw_b = raw_b.trim();
    if raw_a.is_empty() || raw_b.is_empty() || raw_a == raw_b {
        return None;
    }
    let digits_a = normalize_trn(raw_a);
    if digits_a.is_empty() || digits_a != normalize_trn(raw_b) {
        return None;
    }
    // Raw forms differ while digits agree: formatting drift. Map the raw
    // edit distance to a confidence, capped and floored.
    let distance = edit_distance(raw_a, raw_b);
    let confidence = (95_i64 - 12 * distance as i64).clamp(55, 95) as u8;
    Some((
        confidence,
        format!("same TRN digits, {distance} formatting edit(s) apart"),
    ))
}

fn emit_pair(
    check: &CustomCheck,
    a: &Record,
    b: &Record,
    confidence: u8,
    detail: &str,
    created_at: DateTime<Utc>,
    flags: &mut Vec<InvestigationFlag>,
) {
    for (record, other) in [(a, b), (b, a)] {
        let seq = flags.len() + 1;
        let other_label = fields::resolve_str(other, "invoice_number")
            .or_else(|| other.field_str("invoice_id"))
            .unwrap_or_else(|| "unidentified invoice".to_string());
        flags.push(InvestigationFlag {
            id: format!("{}-F{seq:04}", check.id),
            check_id: check.id.clone(),
            kind: check.kind,
            confidence,
            invoice_id: record.field_str("invoice_id"),
            invoice_number: fields::resolve_str(record, "invoice_number"),
            matched_invoice_id: other.field_str("invoice_id"),
            matched_invoice_number: fields::resolve_str(other, "invoice_number"),
            message: format!("{}: {other_label} ({detail})", check.message),
            created_at,
        });
    }
}
