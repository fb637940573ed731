//! Integration tests for the ad-hoc check engine.

use einv_model::{CheckScope, CustomCheck, CustomCheckKind, DataContext, Record, Severity};
use einv_validate::run_custom_check;
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    serde_json::from_value(value).expect("record from json")
}

fn custom(kind: CustomCheckKind, dataset: CheckScope, parameters: Value) -> CustomCheck {
    CustomCheck {
        id: "CUST-1".to_string(),
        name: "test check".to_string(),
        kind,
        dataset,
        severity: Severity::Medium,
        message: "custom check failed".to_string(),
        condition: None,
        parameters,
        is_active: true,
    }
}

fn header_ctx(headers: Vec<Value>) -> DataContext {
    DataContext::new(headers.into_iter().map(record).collect(), Vec::new(), Vec::new())
}

#[test]
fn duplicate_key_flags_every_group_member() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "k": "A"}),
        json!({"invoice_id": "I2", "k": "A"}),
        json!({"invoice_id": "I3", "k": "B"}),
    ]);
    let check = custom(
        CustomCheckKind::Duplicate,
        CheckScope::Header,
        json!({"fields": ["k"]}),
    );
    let exceptions = run_custom_check(&check, &ctx);
    assert_eq!(exceptions.len(), 2);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I1"));
    assert_eq!(exceptions[1].invoice_id.as_deref(), Some("I2"));
    assert!(exceptions[0].message.contains("2 records share key"));
}

#[test]
fn duplicate_key_normalizes_formatting_noise() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "invoice_number": "INV-2024/001"}),
        json!({"invoice_id": "I2", "invoice_number": "inv 2024 001"}),
    ]);
    let check = custom(
        CustomCheckKind::Duplicate,
        CheckScope::Header,
        json!({"fields": ["invoice_number"]}),
    );
    assert_eq!(run_custom_check(&check, &ctx).len(), 2);
}

#[test]
fn duplicate_skips_records_with_blank_key_parts() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "k": ""}),
        json!({"invoice_id": "I2", "k": ""}),
    ]);
    let check = custom(
        CustomCheckKind::Duplicate,
        CheckScope::Header,
        json!({"fields": ["k"]}),
    );
    assert!(run_custom_check(&check, &ctx).is_empty());
}

#[test]
fn math_equality_uses_tolerance() {
    let check = custom(
        CustomCheckKind::Math,
        CheckScope::Header,
        json!({"left": "{left}", "right": "{right}", "operator": "="}),
    );
    let within = header_ctx(vec![json!({"invoice_id": "I1", "left": 100.00, "right": 100.005})]);
    assert!(run_custom_check(&check, &within).is_empty());

    let outside = header_ctx(vec![json!({"invoice_id": "I1", "left": 100.00, "right": 100.02})]);
    let exceptions = run_custom_check(&check, &outside);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].observed.as_deref(), Some("100"));
}

#[test]
fn math_skips_unevaluable_records() {
    let check = custom(
        CustomCheckKind::Math,
        CheckScope::Header,
        json!({"left": "{total} - {vat}", "right": "{net}", "operator": "="}),
    );
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "total": 105.0, "vat": 5.0, "net": 100.0}),
        json!({"invoice_id": "I2", "total": "n/a", "vat": 5.0, "net": 100.0}),
        json!({"invoice_id": "I3", "total": 105.0, "vat": 5.0, "net": 90.0}),
    ]);
    let exceptions = run_custom_check(&check, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I3"));
}

#[test]
fn math_ordering_operators_compare_exactly() {
    let check = custom(
        CustomCheckKind::Math,
        CheckScope::Header,
        json!({"left": "{amount}", "right": "0", "operator": ">"}),
    );
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "amount": 0.005}),
        json!({"invoice_id": "I2", "amount": 0.0}),
    ]);
    let exceptions = run_custom_check(&check, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I2"));
}

#[test]
fn missing_respects_condition_gate() {
    let mut check = custom(
        CustomCheckKind::Missing,
        CheckScope::Header,
        json!({"field": "buyer_ref"}),
    );
    check.condition = Some("{invoice_type} = 'standard'".to_string());
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "invoice_type": "standard"}),
        json!({"invoice_id": "I2", "invoice_type": "simplified"}),
    ]);
    let exceptions = run_custom_check(&check, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I1"));
}

#[test]
fn broken_condition_defaults_to_running() {
    let mut check = custom(
        CustomCheckKind::Missing,
        CheckScope::Header,
        json!({"field": "buyer_ref"}),
    );
    check.condition = Some("{{{not an expression".to_string());
    let ctx = header_ctx(vec![json!({"invoice_id": "I1"})]);
    assert_eq!(run_custom_check(&check, &ctx).len(), 1);
}

#[test]
fn regex_exempts_blank_fields() {
    let check = custom(
        CustomCheckKind::Regex,
        CheckScope::Header,
        json!({"field": "po_number", "pattern": "^PO-[0-9]{4}$"}),
    );
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "po_number": "PO-1234"}),
        json!({"invoice_id": "I2", "po_number": ""}),
        json!({"invoice_id": "I3"}),
        json!({"invoice_id": "I4", "po_number": "order-9"}),
    ]);
    let exceptions = run_custom_check(&check, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I4"));
}

#[test]
fn invalid_pattern_skips_check() {
    let check = custom(
        CustomCheckKind::Regex,
        CheckScope::Header,
        json!({"field": "po_number", "pattern": "("}),
    );
    let ctx = header_ctx(vec![json!({"invoice_id": "I1", "po_number": "x"})]);
    assert!(run_custom_check(&check, &ctx).is_empty());
}

#[test]
fn formula_flags_falsy_results() {
    let check = custom(
        CustomCheckKind::CustomFormula,
        CheckScope::Header,
        json!({"formula": "{total_incl_vat} = {total_excl_vat} + {vat_amount}"}),
    );
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "total_incl_vat": 105.0, "total_excl_vat": 100.0, "vat_amount": 5.0}),
        json!({"invoice_id": "I2", "total_incl_vat": 110.0, "total_excl_vat": 100.0, "vat_amount": 5.0}),
        // Missing operand: record skipped, not flagged.
        json!({"invoice_id": "I3", "total_excl_vat": 100.0, "vat_amount": 5.0}),
    ]);
    let exceptions = run_custom_check(&check, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].invoice_id.as_deref(), Some("I2"));
    assert!(exceptions[0].field.is_none());
}

#[test]
fn inactive_and_search_kinds_emit_nothing() {
    let ctx = header_ctx(vec![json!({"invoice_id": "I1"})]);
    let mut check = custom(
        CustomCheckKind::Missing,
        CheckScope::Header,
        json!({"field": "anything"}),
    );
    check.is_active = false;
    assert!(run_custom_check(&check, &ctx).is_empty());

    let search = custom(CustomCheckKind::FuzzyDuplicate, CheckScope::Header, Value::Null);
    assert!(run_custom_check(&search, &ctx).is_empty());
}

#[test]
fn lines_scope_iterates_line_records() {
    let ctx = DataContext::new(
        vec![record(json!({"invoice_id": "I1", "invoice_number": "INV-1"}))],
        vec![
            record(json!({"invoice_id": "I1", "line_id": "L1", "description": "widgets"})),
            record(json!({"invoice_id": "I1", "line_id": "L2"})),
        ],
        Vec::new(),
    );
    let check = custom(
        CustomCheckKind::Missing,
        CheckScope::Lines,
        json!({"field": "description"}),
    );
    let exceptions = run_custom_check(&check, &ctx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].line_id.as_deref(), Some("L2"));
    assert_eq!(exceptions[0].invoice_number.as_deref(), Some("INV-1"));
}
