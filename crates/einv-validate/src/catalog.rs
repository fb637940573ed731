//! Rule engine for the seeded check catalog.
//!
//! The catalog is a closed set of named checks, each with bespoke
//! comparison logic, dispatched by check id through a registry of pure
//! handler functions. Checks whose id is not in the registry fall through
//! to a generic handler when their rule type only needs a single
//! field/codelist parameter.
//!
//! A misconfigured check (missing required parameter, bad pattern) emits
//! zero exceptions and a `warn` log; a run never aborts because one check
//! is broken.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use einv_match::normalize_trn;
use einv_model::{
    CheckDefinition, CheckScope, DataContext, Exception, ExceptionStatus, Record, RuleType,
};

use crate::fields;

type Handler = fn(&RuleEngine, &CheckDefinition, &DataContext, &mut Emitter);

/// Check-id → handler registry. One entry per bespoke catalog check.
const CATALOG_HANDLERS: &[(&str, Handler)] = &[
    ("EINV-001", check_seller_trn_presence),
    ("EINV-002", check_invoice_number_format),
    ("EINV-003", check_currency_and_fx),
    ("EINV-004", check_payment_date_order),
    ("EINV-005", check_invoice_type_allowed),
    ("EINV-006", check_trn_digit_pattern),
    ("EINV-007", check_totals_reconciliation),
    ("EINV-008", check_line_vat_recompute),
    ("EINV-009", check_decimal_precision),
    ("EINV-010", check_tax_breakdown_presence),
    ("EINV-011", check_buyer_trn),
];

/// Executes catalog checks against a data context.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    /// Tolerance for numeric comparisons. Financial totals are
    /// floating-point sums; exact equality would misfire.
    tolerance: f64,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self { tolerance: 0.01 }
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Execute one check. Order of emitted exceptions follows the record
    /// collection order.
    pub fn run(&self, check: &CheckDefinition, ctx: &DataContext) -> Vec<Exception> {
        let mut emitter = Emitter::new(check);
        if let Some(handler) = lookup_handler(&check.check_id) {
            handler(self, check, ctx, &mut emitter);
        } else {
            match check.rule_type {
                RuleType::Presence => generic_presence(check, ctx, &mut emitter),
                RuleType::CodeList => generic_codelist(check, ctx, &mut emitter),
                other => {
                    warn!(check_id = %check.check_id, rule_type = %other,
                        "no handler for check; skipping");
                }
            }
        }
        emitter.finish()
    }

    /// Execute every enabled check, concatenated in check order.
    pub fn run_all(&self, checks: &[CheckDefinition], ctx: &DataContext) -> Vec<Exception> {
        let mut exceptions = Vec::new();
        for check in checks.iter().filter(|c| c.is_enabled) {
            exceptions.extend(self.run(check, ctx));
        }
        exceptions
    }

    fn exceeds_tolerance(&self, actual: f64, expected: f64) -> bool {
        (actual - expected).abs() > self.tolerance
    }
}

fn lookup_handler(check_id: &str) -> Option<Handler> {
    CATALOG_HANDLERS
        .iter()
        .find(|(id, _)| *id == check_id)
        .map(|(_, handler)| *handler)
}

/// Record linkage carried onto an exception.
#[derive(Debug, Default, Clone)]
pub(crate) struct Linkage {
    invoice_id: Option<String>,
    invoice_number: Option<String>,
    seller_trn: Option<String>,
    buyer_id: Option<String>,
    line_id: Option<String>,
}

impl Linkage {
    pub(crate) fn header(record: &Record) -> Self {
        Self {
            invoice_id: record.field_str("invoice_id"),
            invoice_number: fields::resolve_str(record, "invoice_number"),
            seller_trn: fields::resolve_str(record, "seller_trn"),
            ..Self::default()
        }
    }

    pub(crate) fn line(record: &Record, ctx: &DataContext) -> Self {
        let invoice_id = record.field_str("invoice_id");
        let parent = invoice_id.as_deref().and_then(|id| ctx.header_by_invoice(id));
        Self {
            invoice_number: parent.and_then(|h| fields::resolve_str(h, "invoice_number")),
            seller_trn: parent.and_then(|h| fields::resolve_str(h, "seller_trn")),
            line_id: record.field_str("line_id"),
            invoice_id,
            ..Self::default()
        }
    }

    pub(crate) fn buyer(record: &Record) -> Self {
        Self {
            buyer_id: record.field_str("buyer_id"),
            ..Self::default()
        }
    }
}

/// Single construction point for exceptions, so identity, SLA freezing,
/// and message shaping stay uniform across both engines.
pub(crate) struct Emitter {
    check_id: String,
    severity: einv_model::Severity,
    scope: CheckScope,
    rule_type: RuleType,
    base_message: String,
    suggested_fix: Option<String>,
    created_at: DateTime<Utc>,
    out: Vec<Exception>,
}

impl Emitter {
    pub(crate) fn new(check: &CheckDefinition) -> Self {
        Self {
            check_id: check.check_id.clone(),
            severity: check.severity,
            scope: check.scope,
            rule_type: check.rule_type,
            base_message: check.message.clone(),
            suggested_fix: check.suggested_fix.clone(),
            created_at: Utc::now(),
            out: Vec::new(),
        }
    }

    pub(crate) fn for_custom(check: &einv_model::CustomCheck) -> Self {
        Self {
            check_id: check.id.clone(),
            severity: check.severity,
            scope: check.dataset,
            rule_type: RuleType::Custom,
            base_message: check.message.clone(),
            suggested_fix: None,
            created_at: Utc::now(),
            out: Vec::new(),
        }
    }

    pub(crate) fn emit(
        &mut self,
        linkage: Linkage,
        field: Option<&str>,
        observed: Option<String>,
        expected: Option<String>,
        detail: Option<String>,
    ) {
        let seq = self.out.len() + 1;
        let message = match detail {
            Some(detail) => format!("{}: {detail}", self.base_message),
            None => self.base_message.clone(),
        };
        self.out.push(Exception {
            id: format!("{}-{seq:04}", self.check_id),
            check_id: self.check_id.clone(),
            severity: self.severity,
            scope: self.scope,
            rule_type: self.rule_type,
            invoice_id: linkage.invoice_id,
            invoice_number: linkage.invoice_number,
            seller_trn: linkage.seller_trn,
            buyer_id: linkage.buyer_id,
            line_id: linkage.line_id,
            field: field.map(str::to_string),
            observed,
            expected,
            message,
            suggested_fix: self.suggested_fix.clone(),
            sla_hours: self.severity.sla_hours(),
            status: ExceptionStatus::Open,
            reason_code: None,
            created_at: self.created_at,
        });
    }

    pub(crate) fn finish(self) -> Vec<Exception> {
        self.out
    }
}

/// Parse the date formats seen in ingested templates.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    // RFC 3339 timestamps keep their date part.
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }
    None
}

fn check_seller_trn_presence(
    _engine: &RuleEngine,
    _check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    for header in &ctx.headers {
        if fields::is_blank(header, "seller_trn") {
            emitter.emit(
                Linkage::header(header),
                Some("seller_trn"),
                None,
                Some("non-empty TRN".to_string()),
                header_detail(header),
            );
        }
    }
}

const DEFAULT_INVOICE_NUMBER_PATTERN: &str = "^[A-Za-z0-9][A-Za-z0-9/_-]*$";

fn check_invoice_number_format(
    _engine: &RuleEngine,
    check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    let pattern = check
        .param_str("pattern")
        .unwrap_or(DEFAULT_INVOICE_NUMBER_PATTERN);
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => {
            warn!(check_id = %check.check_id, %error, "invalid pattern; skipping check");
            return;
        }
    };
    for header in &ctx.headers {
        let Some(number) = fields::resolve_str(header, "invoice_number") else {
            continue;
        };
        let trimmed = number.trim();
        if trimmed.is_empty() || regex.is_match(trimmed) {
            continue;
        }
        emitter.emit(
            Linkage::header(header),
            Some("invoice_number"),
            Some(trimmed.to_string()),
            Some(format!("match {pattern}")),
            None,
        );
    }
}

const DEFAULT_CURRENCIES: &[&str] = &["AED", "USD", "EUR", "GBP", "SAR", "INR", "CNY"];

/// Currency must come from the codelist; foreign-currency invoices must
/// carry a positive exchange rate.
fn check_currency_and_fx(
    _engine: &RuleEngine,
    check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    let codelist = check
        .param_str_list("codelist")
        .unwrap_or_else(|| DEFAULT_CURRENCIES.iter().map(|s| (*s).to_string()).collect());
    let base = check.param_str("base_currency").unwrap_or("AED").to_uppercase();
    for header in &ctx.headers {
        let Some(currency) = fields::resolve_str(header, "currency") else {
            continue;
        };
        let currency = currency.trim().to_uppercase();
        if currency.is_empty() {
            continue;
        }
        if !codelist.iter().any(|c| c.eq_ignore_ascii_case(&currency)) {
            emitter.emit(
                Linkage::header(header),
                Some("currency"),
                Some(currency.clone()),
                Some(format!("one of {}", codelist.join(", "))),
                None,
            );
            continue;
        }
        if currency != base {
            let rate = fields::resolve_f64(header, "exchange_rate");
            if !rate.is_some_and(|r| r > 0.0) {
                emitter.emit(
                    Linkage::header(header),
                    Some("exchange_rate"),
                    rate.map(|r| r.to_string()),
                    Some(format!("positive rate for {currency} invoice")),
                    None,
                );
            }
        }
    }
}

fn check_payment_date_order(
    _engine: &RuleEngine,
    _check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    for header in &ctx.headers {
        let invoice_date = fields::resolve_str(header, "invoice_date").and_then(|s| parse_date(&s));
        let due_date = fields::resolve_str(header, "payment_due_date").and_then(|s| parse_date(&s));
        let (Some(invoice_date), Some(due_date)) = (invoice_date, due_date) else {
            continue;
        };
        if due_date < invoice_date {
            emitter.emit(
                Linkage::header(header),
                Some("payment_due_date"),
                Some(due_date.to_string()),
                Some(format!("on or after {invoice_date}")),
                None,
            );
        }
    }
}

const DEFAULT_INVOICE_TYPES: &[&str] = &["standard", "simplified", "credit_note", "debit_note"];

fn check_invoice_type_allowed(
    _engine: &RuleEngine,
    check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    let allowed = check
        .param_str_list("allowed")
        .unwrap_or_else(|| DEFAULT_INVOICE_TYPES.iter().map(|s| (*s).to_string()).collect());
    for header in &ctx.headers {
        let Some(kind) = header.field_str("invoice_type") else {
            continue;
        };
        let trimmed = kind.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(trimmed)) {
            emitter.emit(
                Linkage::header(header),
                Some("invoice_type"),
                Some(trimmed.to_string()),
                Some(format!("one of {}", allowed.join(", "))),
                None,
            );
        }
    }
}

fn check_trn_digit_pattern(
    _engine: &RuleEngine,
    check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    let digits = check.param_f64("digits").map(|d| d as usize).unwrap_or(15);
    for header in &ctx.headers {
        let Some(trn) = fields::resolve_str(header, "seller_trn") else {
            continue;
        };
        if trn.trim().is_empty() {
            continue;
        }
        if normalize_trn(&trn).chars().count() != digits {
            emitter.emit(
                Linkage::header(header),
                Some("seller_trn"),
                Some(trn.trim().to_string()),
                Some(format!("{digits}-digit TRN")),
                None,
            );
        }
    }
}

/// Header totals must reconcile with the sum of their line totals.
/// One exception per failing invoice, referencing the header.
fn check_totals_reconciliation(
    engine: &RuleEngine,
    _check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    for header in &ctx.headers {
        let Some(invoice_id) = header.field_str("invoice_id") else {
            continue;
        };
        let lines = ctx.lines_for_invoice(&invoice_id);
        if lines.is_empty() {
            continue;
        }
        let Some(header_total) = fields::resolve_f64(header, "total_excl_vat") else {
            continue;
        };
        let line_sum: f64 = lines
            .iter()
            .filter_map(|line| fields::resolve_f64(line, "line_total_excl_vat"))
            .sum();
        if engine.exceeds_tolerance(header_total, line_sum) {
            emitter.emit(
                Linkage::header(header),
                Some("total_excl_vat"),
                Some(format!("{header_total}")),
                Some(format!("{line_sum} (sum of {} line(s))", lines.len())),
                None,
            );
        }
    }
}

/// Recompute each line's VAT from its net total and rate.
fn check_line_vat_recompute(
    engine: &RuleEngine,
    _check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    for line in &ctx.lines {
        let net = fields::resolve_f64(line, "line_total_excl_vat");
        let rate = fields::resolve_f64(line, "vat_rate");
        let actual = fields::resolve_f64(line, "line_vat_amount");
        let (Some(net), Some(rate), Some(actual)) = (net, rate, actual) else {
            continue;
        };
        let expected = net * rate / 100.0;
        if engine.exceeds_tolerance(actual, expected) {
            emitter.emit(
                Linkage::line(line, ctx),
                Some("line_vat_amount"),
                Some(format!("{actual}")),
                Some(format!("{expected:.2}")),
                None,
            );
        }
    }
}

const DEFAULT_PRECISION_FIELDS: &[&str] = &["total_excl_vat", "vat_amount", "total_incl_vat"];

/// Count digits after the decimal point on the string representation, so
/// trailing-zero artifacts from float formatting are not misreported.
pub(crate) fn decimal_places(raw: &str) -> usize {
    match raw.trim().split_once('.') {
        Some((_, frac)) => frac.chars().take_while(|c| c.is_ascii_digit()).count(),
        None => 0,
    }
}

fn check_decimal_precision(
    _engine: &RuleEngine,
    check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    let max = check.param_f64("max_decimals").map(|d| d as usize).unwrap_or(2);
    let field_names = check.param_str_list("fields").unwrap_or_else(|| {
        DEFAULT_PRECISION_FIELDS.iter().map(|s| (*s).to_string()).collect()
    });
    for header in &ctx.headers {
        for name in &field_names {
            let Some(raw) = fields::resolve_str(header, name) else {
                continue;
            };
            let places = decimal_places(&raw);
            if places > max {
                emitter.emit(
                    Linkage::header(header),
                    Some(name.as_str()),
                    Some(raw.trim().to_string()),
                    Some(format!("at most {max} decimal place(s)")),
                    None,
                );
            }
        }
    }
}

/// Invoices carrying VAT must include a tax breakdown structure.
fn check_tax_breakdown_presence(
    _engine: &RuleEngine,
    _check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    for header in &ctx.headers {
        let Some(vat) = fields::resolve_f64(header, "vat_amount") else {
            continue;
        };
        if vat <= 0.0 {
            continue;
        }
        let breakdown_present = match header.field("tax_breakdown") {
            None | Some(Value::Null) => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        if !breakdown_present {
            emitter.emit(
                Linkage::header(header),
                Some("tax_breakdown"),
                None,
                Some("breakdown for invoices with VAT".to_string()),
                header_detail(header),
            );
        }
    }
}

/// Buyer TRN must be present and carry the expected digit count.
fn check_buyer_trn(
    _engine: &RuleEngine,
    check: &CheckDefinition,
    ctx: &DataContext,
    emitter: &mut Emitter,
) {
    let digits = check.param_f64("digits").map(|d| d as usize).unwrap_or(15);
    for buyer in &ctx.buyers {
        if fields::is_blank(buyer, "buyer_trn") {
            emitter.emit(
                Linkage::buyer(buyer),
                Some("buyer_trn"),
                None,
                Some("non-empty TRN".to_string()),
                buyer.field_str("buyer_name").map(|n| format!("buyer {n}")),
            );
            continue;
        }
        let raw = fields::resolve_str(buyer, "buyer_trn").unwrap_or_default();
        if normalize_trn(&raw).chars().count() != digits {
            emitter.emit(
                Linkage::buyer(buyer),
                Some("buyer_trn"),
                Some(raw.trim().to_string()),
                Some(format!("{digits}-digit TRN")),
                None,
            );
        }
    }
}

fn records_for_scope(ctx: &DataContext, scope: CheckScope) -> &[Record] {
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

/// Generic fallback for unregistered Presence checks with a `field`
/// parameter.
fn generic_presence(check: &CheckDefinition, ctx: &DataContext, emitter: &mut Emitter) {
    let Some(field) = check.param_str("field") else {
        warn!(check_id = %check.check_id, "presence check missing 'field' parameter; skipping");
        return;
    };
    let scope = fields::route_dataset(field, check.scope);
    for record in records_for_scope(ctx, scope) {
        if fields::is_blank(record, field) {
            emitter.emit(
                linkage_for(record, scope, ctx),
                Some(field),
                None,
                Some("non-empty value".to_string()),
                None,
            );
        }
    }
}

/// Generic fallback for unregistered CodeList checks with `field` and
/// `codelist` parameters.
fn generic_codelist(check: &CheckDefinition, ctx: &DataContext, emitter: &mut Emitter) {
    let Some(field) = check.param_str("field") else {
        warn!(check_id = %check.check_id, "codelist check missing 'field' parameter; skipping");
        return;
    };
    let Some(codelist) = check.param_str_list("codelist") else {
        warn!(check_id = %check.check_id, "codelist check missing 'codelist' parameter; skipping");
        return;
    };
    let scope = fields::route_dataset(field, check.scope);
    for record in records_for_scope(ctx, scope) {
        let Some(value) = fields::resolve_str(record, field) else {
            continue;
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !codelist.iter().any(|c| c.eq_ignore_ascii_case(trimmed)) {
            emitter.emit(
                linkage_for(record, scope, ctx),
                Some(field),
                Some(trimmed.to_string()),
                Some(format!("one of {}", codelist.join(", "))),
                None,
            );
        }
    }
}

fn header_detail(header: &Record) -> Option<String> {
    fields::resolve_str(header, "invoice_number").map(|n| format!("invoice {n}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_places_on_string_form() {
        assert_eq!(decimal_places("100"), 0);
        assert_eq!(decimal_places("100.5"), 1);
        assert_eq!(decimal_places("100.50"), 2);
        assert_eq!(decimal_places("100.505"), 3);
        assert_eq!(decimal_places(" 7.25 "), 2);
    }

    #[test]
    fn date_parsing_accepts_template_formats() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("01/03/2024").is_some());
        assert!(parse_date("2024-03-01T10:00:00Z").is_some());
        assert!(parse_date("March 1st").is_none());
    }

    #[test]
    fn registry_covers_catalog_ids() {
        assert!(lookup_handler("EINV-001").is_some());
        assert!(lookup_handler("EINV-011").is_some());
        assert!(lookup_handler("EINV-999").is_none());
    }
}
