//! Integration tests for the pairwise search checks.

use einv_model::{CheckScope, CustomCheck, CustomCheckKind, DataContext, Record, Severity};
use einv_validate::run_search_check;
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    serde_json::from_value(value).expect("record from json")
}

fn search(kind: CustomCheckKind) -> CustomCheck {
    CustomCheck {
        id: "SRCH-1".to_string(),
        name: "search check".to_string(),
        kind,
        dataset: CheckScope::Header,
        severity: Severity::Low,
        message: "possible match".to_string(),
        condition: None,
        parameters: Value::Null,
        is_active: true,
    }
}

fn header_ctx(headers: Vec<Value>) -> DataContext {
    DataContext::new(headers.into_iter().map(record).collect(), Vec::new(), Vec::new())
}

fn duplicate_pair() -> Vec<Value> {
    vec![
        json!({
            "invoice_id": "I1", "invoice_number": "INV-1",
            "vendor_name": "ABC Trading LLC", "total_incl_vat": 105.0,
            "invoice_date": "2024-03-01"
        }),
        json!({
            "invoice_id": "I2", "invoice_number": "INV-2",
            "vendor_name": "ABC TRADING LLC", "total_incl_vat": 105.0,
            "invoice_date": "2024-03-03"
        }),
    ]
}

#[test]
fn fuzzy_duplicate_emits_one_flag_per_direction() {
    let ctx = header_ctx(duplicate_pair());
    let flags = run_search_check(&search(CustomCheckKind::FuzzyDuplicate), &ctx);
    assert_eq!(flags.len(), 2);
    assert_eq!(flags[0].invoice_id.as_deref(), Some("I1"));
    assert_eq!(flags[0].matched_invoice_id.as_deref(), Some("I2"));
    assert_eq!(flags[1].invoice_id.as_deref(), Some("I2"));
    assert_eq!(flags[1].matched_invoice_id.as_deref(), Some("I1"));
    // Identical vendors: mean of 1.0 similarity and the 0.95 ceiling.
    assert_eq!(flags[0].confidence, 98);
    assert_eq!(flags[0].confidence, flags[1].confidence);
}

#[test]
fn fuzzy_duplicate_not_reflagged_in_reverse_order() {
    let mut reversed = duplicate_pair();
    reversed.reverse();
    let ctx = header_ctx(reversed);
    let flags = run_search_check(&search(CustomCheckKind::FuzzyDuplicate), &ctx);
    assert_eq!(flags.len(), 2);
}

#[test]
fn fuzzy_duplicate_respects_amount_and_date_windows() {
    // Amount differs beyond tolerance.
    let ctx = header_ctx(vec![
        json!({
            "invoice_id": "I1", "vendor_name": "ABC Trading LLC",
            "total_incl_vat": 105.0, "invoice_date": "2024-03-01"
        }),
        json!({
            "invoice_id": "I2", "vendor_name": "ABC Trading LLC",
            "total_incl_vat": 106.0, "invoice_date": "2024-03-01"
        }),
    ]);
    assert!(run_search_check(&search(CustomCheckKind::FuzzyDuplicate), &ctx).is_empty());

    // Dates outside the three-day window.
    let ctx = header_ctx(vec![
        json!({
            "invoice_id": "I1", "vendor_name": "ABC Trading LLC",
            "total_incl_vat": 105.0, "invoice_date": "2024-03-01"
        }),
        json!({
            "invoice_id": "I2", "vendor_name": "ABC Trading LLC",
            "total_incl_vat": 105.0, "invoice_date": "2024-03-09"
        }),
    ]);
    assert!(run_search_check(&search(CustomCheckKind::FuzzyDuplicate), &ctx).is_empty());
}

#[test]
fn invoice_number_variant_flags_near_misses_only() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "invoice_number": "INV-2024-001"}),
        json!({"invoice_id": "I2", "invoice_number": "INV-2024-0011"}),
        // Identical after normalization: duplicate territory, not variant.
        json!({"invoice_id": "I3", "invoice_number": "inv 2024 001"}),
        json!({"invoice_id": "I4", "invoice_number": "PO-77"}),
    ]);
    let flags = run_search_check(&search(CustomCheckKind::InvoiceNumberVariant), &ctx);
    // I1~I2 and I2~I3 are variants; I1~I3 normalize identically.
    assert_eq!(flags.len(), 4);
    let pairs: Vec<(Option<&str>, Option<&str>)> = flags
        .iter()
        .map(|f| (f.invoice_id.as_deref(), f.matched_invoice_id.as_deref()))
        .collect();
    assert!(pairs.contains(&(Some("I1"), Some("I2"))));
    assert!(pairs.contains(&(Some("I2"), Some("I1"))));
    assert!(pairs.contains(&(Some("I2"), Some("I3"))));
    assert!(pairs.contains(&(Some("I3"), Some("I2"))));
    for flag in &flags {
        assert!(flag.confidence >= 85);
    }
}

#[test]
fn trn_drift_matches_same_digits_different_formatting() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "invoice_number": "INV-1", "seller_trn": "100-2345-6789-0123"}),
        json!({"invoice_id": "I2", "invoice_number": "INV-2", "seller_trn": "100234567890123"}),
        json!({"invoice_id": "I3", "invoice_number": "INV-3", "seller_trn": "999999999999999"}),
    ]);
    let flags = run_search_check(&search(CustomCheckKind::TrnFormatSimilarity), &ctx);
    assert_eq!(flags.len(), 2);
    // Three separator edits apart: 95 - 12*3 = 59.
    assert_eq!(flags[0].confidence, 59);
    assert!(flags[0].message.contains("formatting edit"));
}

#[test]
fn trn_drift_ignores_identical_raw_values() {
    let ctx = header_ctx(vec![
        json!({"invoice_id": "I1", "seller_trn": "100234567890123"}),
        json!({"invoice_id": "I2", "seller_trn": "100234567890123"}),
    ]);
    assert!(run_search_check(&search(CustomCheckKind::TrnFormatSimilarity), &ctx).is_empty());
}

#[test]
fn non_search_kind_is_rejected() {
    let ctx = header_ctx(duplicate_pair());
    let mut check = search(CustomCheckKind::FuzzyDuplicate);
    check.kind = CustomCheckKind::Missing;
    assert!(run_search_check(&check, &ctx).is_empty());
}

#[test]
fn flags_carry_no_workflow_fields() {
    let ctx = header_ctx(duplicate_pair());
    let flags = run_search_check(&search(CustomCheckKind::FuzzyDuplicate), &ctx);
    let json = serde_json::to_value(&flags[0]).expect("serialize flag");
    assert!(json.get("sla_hours").is_none());
    assert!(json.get("status").is_none());
    assert!(json.get("confidence").is_some());
}
