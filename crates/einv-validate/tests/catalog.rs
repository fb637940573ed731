//! Integration tests for the catalog rule engine.

use einv_model::{CheckDefinition, CheckScope, DataContext, Record, RuleType, Severity};
use einv_validate::RuleEngine;
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    serde_json::from_value(value).expect("record from json")
}

fn check(check_id: &str, rule_type: RuleType, scope: CheckScope) -> CheckDefinition {
    CheckDefinition {
        check_id: check_id.to_string(),
        title: check_id.to_string(),
        severity: Severity::High,
        scope,
        rule_type,
        parameters: Value::Null,
        is_enabled: true,
        message: format!("{check_id} failed"),
        suggested_fix: None,
        owner_team: None,
        linked_requirements: Vec::new(),
    }
}

fn header_ctx(headers: Vec<Value>) -> DataContext {
    DataContext::new(headers.into_iter().map(record).collect(), Vec::new(), Vec::new())
}

#[test]
fn seller_trn_presence() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "invoice_number": "INV-1", "seller_trn": "100234567890123"}),
        json!({"invoice_id": "I2", "invoice_number": "INV-2", "seller_trn": ""}),
    ]);
    let exceptions = RuleEngine::new().run(&check("EINV-001", RuleType::Presence, CheckScope::Header), &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I2"));
    assert_eq!(exceptions[0].field.as_deref(), Some("seller_trn"));
    assert_eq!(exceptions[0].sla_hours, 48);
}

#[test]
fn totals_reconciliation_passes_within_tolerance() {
    let ctx = DataContext::new(
        vec![record(json!({"invoice_id": "I1", "total_excl_vat": 300.0}))],
        vec![
            record(json!({"invoice_id": "I1", "line_id": "L1", "line_total_excl_vat": 100.0})),
            record(json!({"invoice_id": "I1", "line_id": "L2", "line_total_excl_vat": 200.0})),
        ],
        Vec::new(),
    );
    let c = check("EINV-007", RuleType::CrossRecord, CheckScope::CrossFile);
    assert!(RuleEngine::new().run(&c, &ctx).is_empty());
}

#[test]
fn totals_reconciliation_flags_the_header() {
    let ctx = DataContext::new(
        vec![record(json!({"invoice_id": "I1", "invoice_number": "INV-1", "total_excl_vat": 300.0}))],
        vec![
            record(json!({"invoice_id": "I1", "line_id": "L1", "line_total_excl_vat": 100.0})),
            record(json!({"invoice_id": "I1", "line_id": "L2", "line_total_excl_vat": 199.0})),
        ],
        Vec::new(),
    );
    let c = check("EINV-007", RuleType::CrossRecord, CheckScope::CrossFile);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I1"));
    assert!(exceptions[0].line_id.is_none());
    assert_eq!(exceptions[0].observed.as_deref(), Some("300"));
    assert!(exceptions[0].expected.as_deref().unwrap().starts_with("299"));
}

#[test]
fn line_vat_recompute() {
    let ctx = DataContext::new(
        vec![record(json!({"invoice_id": "I1", "invoice_number": "INV-1"}))],
        vec![
            record(json!({
                "invoice_id": "I1", "line_id": "L1",
                "line_total_excl_vat": 100.0, "vat_rate": 5.0, "line_vat_amount": 5.0
            })),
            record(json!({
                "invoice_id": "I1", "line_id": "L2",
                "line_total_excl_vat": 100.0, "vat_rate": 5.0, "line_vat_amount": 7.0
            })),
            // Unparseable rate: record skipped, not flagged.
            record(json!({
                "invoice_id": "I1", "line_id": "L3",
                "line_total_excl_vat": 100.0, "vat_rate": "n/a", "line_vat_amount": 9.0
            })),
        ],
        Vec::new(),
    );
    let c = check("EINV-008", RuleType::Arithmetic, CheckScope::Lines);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].line_id.as_deref(), Some("L2"));
    assert_eq!(exceptions[0].expected.as_deref(), Some("5.00"));
    // Line exceptions inherit header linkage.
    assert_eq!(exceptions[0].invoice_number.as_deref(), Some("INV-1"));
}

#[test]
fn decimal_precision_counts_string_digits() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "total_excl_vat": "100.50"}),
        json!({"invoice_id": "I2", "total_excl_vat": "100.505"}),
    ]);
    let c = check("EINV-009", RuleType::Format, CheckScope::Header);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I2"));
    assert_eq!(exceptions[0].observed.as_deref(), Some("100.505"));
}

#[test]
fn currency_codelist_and_fx() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "currency": "AED"}),
        json!({"invoice_id": "I2", "currency": "XYZ"}),
        json!({"invoice_id": "I3", "currency": "USD"}),
        json!({"invoice_id": "I4", "currency": "USD", "exchange_rate": 3.6725}),
    ]);
    let c = check("EINV-003", RuleType::CodeList, CheckScope::Header);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 2);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I2"));
    assert_eq!(exceptions[0].field.as_deref(), Some("currency"));
    assert_eq!(exceptions[1].invoice_id.as_deref(), Some("I3"));
    assert_eq!(exceptions[1].field.as_deref(), Some("exchange_rate"));
}

#[test]
fn payment_date_ordering() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "invoice_date": "2024-03-01", "payment_due_date": "2024-03-31"}),
        json!({"invoice_id": "I2", "invoice_date": "2024-03-01", "payment_due_date": "2024-02-01"}),
        json!({"invoice_id": "I3", "invoice_date": "garbled", "payment_due_date": "2024-02-01"}),
    ]);
    let c = check("EINV-004", RuleType::CrossField, CheckScope::Header);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I2"));
}

#[test]
fn trn_digit_pattern_normalizes_before_counting() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "seller_trn": "100-2345-6789-0123"}),
        json!({"invoice_id": "I2", "seller_trn": "12345"}),
    ]);
    let c = check("EINV-006", RuleType::Format, CheckScope::Header);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I2"));
}

#[test]
fn invoice_type_enumeration() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "invoice_type": "Standard"}),
        json!({"invoice_id": "I2", "invoice_type": "proforma"}),
    ]);
    let c = check("EINV-005", RuleType::CodeList, CheckScope::Header);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].observed.as_deref(), Some("proforma"));
}

#[test]
fn tax_breakdown_required_when_vat_charged() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "vat_amount": 5.0, "tax_breakdown": {"standard": 5.0}}),
        json!({"invoice_id": "I2", "vat_amount": 5.0}),
        json!({"invoice_id": "I3", "vat_amount": 0.0}),
    ]);
    let c = check("EINV-010", RuleType::Presence, CheckScope::Header);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I2"));
}

#[test]
fn buyer_trn_presence_and_format() {
    let ctx = DataContext::new(
        Vec::new(),
        Vec::new(),
        vec![
            record(json!({"buyer_id": "B1", "buyer_trn": "100234567890123"})),
            record(json!({"buyer_id": "B2", "buyer_trn": ""})),
            record(json!({"buyer_id": "B3", "buyer_trn": "999"})),
        ],
    );
    let c = check("EINV-011", RuleType::Format, CheckScope::Party);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 2);
    assert_eq!(exceptions[0].buyer_id.as_deref(), Some("B2"));
    assert_eq!(exceptions[1].buyer_id.as_deref(), Some("B3"));
}

#[test]
fn generic_presence_routes_by_prefix() {
    let ctx = DataContext::new(
        vec![record(json!({"invoice_id": "I1"}))],
        Vec::new(),
        vec![
            record(json!({"buyer_id": "B1", "buyer_country": "AE"})),
            record(json!({"buyer_id": "B2"})),
        ],
    );
    // Declared Header scope, but the buyer_ prefix routes to party records.
    let mut c = check("TEN-100", RuleType::Presence, CheckScope::Header);
    c.parameters = json!({"field": "buyer_country"});
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].buyer_id.as_deref(), Some("B2"));
}

#[test]
fn generic_codelist_on_lines() {
    let ctx = DataContext::new(
        vec![record(json!({"invoice_id": "I1"}))],
        vec![
            record(json!({"invoice_id": "I1", "line_id": "L1", "unit_of_measure": "PCS"})),
            record(json!({"invoice_id": "I1", "line_id": "L2", "unit_of_measure": "BUCKET"})),
        ],
        Vec::new(),
    );
    let mut c = check("TEN-101", RuleType::CodeList, CheckScope::Header);
    c.parameters = json!({"field": "unit_of_measure", "codelist": ["PCS", "KG", "HR"]});
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].line_id.as_deref(), Some("L2"));
}

#[test]
fn misconfigured_check_emits_nothing() {
    let ctx = header_ctx(vec![json!({"invoice_id": "I1"})]);
    // Generic presence without its field parameter: skipped, not fatal.
    let c = check("TEN-102", RuleType::Presence, CheckScope::Header);
    assert!(RuleEngine::new().run(&c, &ctx).is_empty());
    // Unknown id with a rule type the fallback does not cover.
    let c = check("TEN-103", RuleType::Arithmetic, CheckScope::Header);
    assert!(RuleEngine::new().run(&c, &ctx).is_empty());
}

#[test]
fn run_all_filters_disabled_and_is_idempotent() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "seller_trn": "", "invoice_type": "proforma"}),
    ]);
    let mut presence = check("EINV-001", RuleType::Presence, CheckScope::Header);
    let type_check = check("EINV-005", RuleType::CodeList, CheckScope::Header);
    let engine = RuleEngine::new();

    let first = engine.run_all(&[presence.clone(), type_check.clone()], &ctx);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].check_id, "EINV-001");
    assert_eq!(first[1].check_id, "EINV-005");

    // Same inputs, same findings (identity and timestamps aside).
    let second = engine.run_all(&[presence.clone(), type_check.clone()], &ctx);
    let shape = |exceptions: &[einv_model::Exception]| {
        exceptions
            .iter()
            .map(|e| (e.check_id.clone(), e.invoice_id.clone(), e.field.clone(), e.observed.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));

    presence.is_enabled = false;
    let third = engine.run_all(&[presence, type_check], &ctx);
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].check_id, "EINV-005");
}

#[test]
fn aliased_fields_resolve() {
    // Legacy template: trn + inv_no instead of canonical names.
    let ctx = header_ctx(vec![json!({"invoice_id": "I1", "trn": "12345", "inv_no": "INV-9"})]);
    let c = check("EINV-006", RuleType::Format, CheckScope::Header);
    let exceptions = RuleEngine::new().run(&c, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_number.as_deref(), Some("INV-9"));
    assert_eq!(exceptions[0].seller_trn.as_deref(), Some("12345"));
}
