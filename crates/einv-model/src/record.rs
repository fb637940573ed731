//! Untyped invoice records and the in-memory data context.
//!
//! Ingested rows arrive as field-bags: string/number/date-like values keyed
//! by field name, with dotted paths reaching nested structure. The engines
//! never assume a fixed schema; they resolve fields by name and coerce on
//! demand.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single ingested row (invoice header, invoice line, or party).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Resolve a field by name. Dotted paths descend into nested objects
    /// (`tax_breakdown.standard_rate`).
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Render a field as a display string. Null and missing fields resolve
    /// to `None`; numbers and booleans render in their canonical JSON form.
    pub fn field_str(&self, path: &str) -> Option<String> {
        match self.field(path)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Coerce a field to a number. Numeric strings are parsed after
    /// stripping thousands separators, the way financial CSV exports
    /// deliver totals.
    pub fn field_f64(&self, path: &str) -> Option<f64> {
        match self.field(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok()
            }
            _ => None,
        }
    }

    /// True when the field is absent, null, or a blank string.
    pub fn is_blank(&self, path: &str) -> bool {
        match self.field(path) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Parse a JSON array of records, the shape ingestion delivers a
    /// dataset in.
    pub fn parse_array(raw: &str) -> crate::error::Result<Vec<Record>> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// The normalized dataset a compliance run evaluates: invoice headers,
/// invoice lines, and party (buyer) records, plus derived indices.
///
/// A line whose invoice id resolves to no header is a checkable condition,
/// not a structural error; the indices simply return nothing for it.
#[derive(Debug, Clone, Default)]
pub struct DataContext {
    pub headers: Vec<Record>,
    pub lines: Vec<Record>,
    pub buyers: Vec<Record>,
    header_index: HashMap<String, usize>,
    line_index: HashMap<String, Vec<usize>>,
}

/// Header field carrying the invoice identity.
pub const INVOICE_ID_FIELD: &str = "invoice_id";

impl DataContext {
    pub fn new(headers: Vec<Record>, lines: Vec<Record>, buyers: Vec<Record>) -> Self {
        let mut header_index = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(id) = header.field_str(INVOICE_ID_FIELD) {
                header_index.entry(id).or_insert(idx);
            }
        }
        let mut line_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, line) in lines.iter().enumerate() {
            if let Some(id) = line.field_str(INVOICE_ID_FIELD) {
                line_index.entry(id).or_default().push(idx);
            }
        }
        Self {
            headers,
            lines,
            buyers,
            header_index,
            line_index,
        }
    }

    pub fn header_by_invoice(&self, invoice_id: &str) -> Option<&Record> {
        self.header_index
            .get(invoice_id)
            .map(|idx| &self.headers[*idx])
    }

    /// Lines for an invoice, in their original ingestion order.
    pub fn lines_for_invoice(&self, invoice_id: &str) -> Vec<&Record> {
        self.line_index
            .get(invoice_id)
            .map(|indices| indices.iter().map(|idx| &self.lines[*idx]).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.lines.is_empty() && self.buyers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).expect("record from json")
    }

    #[test]
    fn dotted_path_resolution() {
        let rec = record(json!({
            "invoice_id": "INV-1",
            "tax_breakdown": {"standard_rate": {"vat_amount": 12.5}}
        }));
        assert_eq!(
            rec.field("tax_breakdown.standard_rate.vat_amount"),
            Some(&json!(12.5))
        );
        assert!(rec.field("tax_breakdown.zero_rate").is_none());
    }

    #[test]
    fn numeric_coercion_handles_separator_strings() {
        let rec = record(json!({"total": "1,250.75", "quantity": 3, "note": "n/a"}));
        assert_eq!(rec.field_f64("total"), Some(1250.75));
        assert_eq!(rec.field_f64("quantity"), Some(3.0));
        assert_eq!(rec.field_f64("note"), None);
    }

    #[test]
    fn blank_detection() {
        let rec = record(json!({"a": "  ", "b": null, "c": "x", "d": 0}));
        assert!(rec.is_blank("a"));
        assert!(rec.is_blank("b"));
        assert!(rec.is_blank("missing"));
        assert!(!rec.is_blank("c"));
        assert!(!rec.is_blank("d"));
    }

    #[test]
    fn parse_array_surfaces_json_errors() {
        let records = Record::parse_array(r#"[{"invoice_id": "INV-1"}]"#).expect("valid array");
        assert_eq!(records.len(), 1);
        assert!(Record::parse_array("{not json").is_err());
    }

    #[test]
    fn context_indices() {
        let ctx = DataContext::new(
            vec![record(json!({"invoice_id": "INV-1"}))],
            vec![
                record(json!({"invoice_id": "INV-1", "line_id": "L1"})),
                record(json!({"invoice_id": "INV-2", "line_id": "L2"})),
                record(json!({"invoice_id": "INV-1", "line_id": "L3"})),
            ],
            Vec::new(),
        );
        assert!(ctx.header_by_invoice("INV-1").is_some());
        assert!(ctx.header_by_invoice("INV-2").is_none());
        let lines = ctx.lines_for_invoice("INV-1");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].field_str("line_id").as_deref(), Some("L1"));
        assert_eq!(lines[1].field_str("line_id").as_deref(), Some("L3"));
    }
}
