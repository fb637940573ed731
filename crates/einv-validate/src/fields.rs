//! Field resolution: canonical names, legacy aliases, and dataset routing.
//!
//! Ingested templates drift across tenants; the alias table maps the
//! legacy/alternate column names seen in the field to the canonical names
//! the catalog checks are written against. Resolution tries the canonical
//! name first, then each alias in table order.

use einv_model::{CheckScope, Record};
use serde_json::Value;
use tracing::debug;

/// Canonical field name → accepted legacy/alternate names.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("invoice_number", &["inv_no", "invoice_no", "document_number"]),
    ("seller_trn", &["trn", "supplier_trn", "vat_number"]),
    ("vendor_name", &["supplier_name", "seller_name"]),
    ("total_excl_vat", &["subtotal", "net_total"]),
    ("vat_amount", &["tax_amount"]),
    ("total_incl_vat", &["grand_total", "total_amount"]),
    ("invoice_date", &["issue_date", "doc_date"]),
    ("payment_due_date", &["due_date"]),
    ("exchange_rate", &["fx_rate"]),
    ("line_total_excl_vat", &["line_net", "line_subtotal"]),
    ("quantity", &["qty"]),
    ("unit_price", &["price"]),
    ("buyer_trn", &["customer_trn"]),
    ("buyer_name", &["customer_name"]),
];

fn aliases_for(canonical: &str) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// Resolve a field value through the alias table.
pub fn resolve<'r>(record: &'r Record, canonical: &str) -> Option<&'r Value> {
    if let Some(value) = record.field(canonical) {
        return Some(value);
    }
    for alias in aliases_for(canonical) {
        if let Some(value) = record.field(alias) {
            return Some(value);
        }
    }
    None
}

pub fn resolve_str(record: &Record, canonical: &str) -> Option<String> {
    if let Some(s) = record.field_str(canonical) {
        return Some(s);
    }
    for alias in aliases_for(canonical) {
        if let Some(s) = record.field_str(alias) {
            return Some(s);
        }
    }
    None
}

pub fn resolve_f64(record: &Record, canonical: &str) -> Option<f64> {
    if let Some(n) = record.field_f64(canonical) {
        return Some(n);
    }
    for alias in aliases_for(canonical) {
        if let Some(n) = record.field_f64(alias) {
            return Some(n);
        }
    }
    None
}

/// True when neither the canonical name nor any alias holds a non-blank
/// value.
pub fn is_blank(record: &Record, canonical: &str) -> bool {
    match resolve(record, canonical) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Header fields the routing heuristic recognizes without a prefix.
const HEADER_FIELDS: &[&str] = &[
    "invoice_id",
    "invoice_number",
    "invoice_date",
    "invoice_type",
    "seller_trn",
    "vendor_name",
    "currency",
    "exchange_rate",
    "total_excl_vat",
    "vat_amount",
    "total_incl_vat",
    "payment_due_date",
    "payment_date",
    "tax_breakdown",
];

/// Line fields without the `line_` prefix.
const LINE_FIELDS: &[&str] = &["quantity", "unit_of_measure", "unit_price", "vat_rate"];

/// Infer the dataset a generic-fallback check should iterate from its
/// field name. Falls back to the check's declared scope when no prefix
/// matches; ambiguity here is configuration debt, not something to guess
/// around, so the fallback is logged.
pub fn route_dataset(field: &str, declared: CheckScope) -> CheckScope {
    let lower = field.to_lowercase();
    if lower.starts_with("buyer_") {
        return CheckScope::Party;
    }
    if lower.starts_with("line_") || LINE_FIELDS.contains(&lower.as_str()) {
        return CheckScope::Lines;
    }
    if HEADER_FIELDS.contains(&lower.as_str()) {
        return CheckScope::Header;
    }
    debug!(field, scope = %declared, "no dataset prefix matched; using declared scope");
    declared
}
