//! Registry and catalog loaders.
//!
//! The requirement registry and control catalog ship as CSV (maintained by
//! compliance teams in spreadsheets); check catalogs and datasets arrive
//! as JSON. CSV rows missing their id column are skipped silently, the
//! registry files in the wild carry trailing annotation rows.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::debug;

use einv_model::{CheckDefinition, Control, CustomCheck, DataContext, Record, Requirement};

/// Read a CSV file into header-keyed row maps. Handles BOM characters and
/// trims values.
pub fn read_csv_rows(path: &Path) -> Result<Vec<BTreeMap<String, String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("read csv: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("read headers: {}", path.display()))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read record: {}", path.display()))?;
        let mut row = BTreeMap::new();
        for (idx, value) in record.iter().enumerate() {
            let key = headers
                .get(idx)
                .unwrap_or("")
                .trim_matches('\u{feff}')
                .trim()
                .to_string();
            row.insert(key, value.trim().to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

fn get_field(row: &BTreeMap<String, String>, key: &str) -> String {
    row.get(key).cloned().unwrap_or_default()
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "y" | "yes" | "true" | "1" | "m" | "mandatory"
    )
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([';', ','])
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Load the requirement registry.
///
/// Expected columns: `Requirement ID`, `Business Term`, `Mandatory`,
/// `New in Spec`, `Dataset`, `Mapped Columns` (semicolon-separated),
/// `Ingestible`.
pub fn load_requirements(path: &Path) -> Result<Vec<Requirement>> {
    let rows = read_csv_rows(path)?;
    let mut requirements = Vec::new();
    for row in rows {
        let id = get_field(&row, "Requirement ID");
        if id.is_empty() {
            continue;
        }
        let ingestible_raw = get_field(&row, "Ingestible");
        requirements.push(Requirement {
            id,
            business_term: get_field(&row, "Business Term"),
            mandatory: parse_bool(&get_field(&row, "Mandatory")),
            new_in_spec: parse_bool(&get_field(&row, "New in Spec")),
            dataset: get_field(&row, "Dataset"),
            mapped_columns: split_list(&get_field(&row, "Mapped Columns")),
            // Absent column means ingestible; only an explicit "no" opts out.
            ingestible: ingestible_raw.is_empty() || parse_bool(&ingestible_raw),
        });
    }
    debug!(count = requirements.len(), path = %path.display(), "loaded requirement registry");
    Ok(requirements)
}

/// Load the control catalog.
///
/// Expected columns: `Control ID`, `Name`, `Description`, `Linked Rules`
/// (comma-separated check ids).
pub fn load_controls(path: &Path) -> Result<Vec<Control>> {
    let rows = read_csv_rows(path)?;
    let mut controls = Vec::new();
    for row in rows {
        let id = get_field(&row, "Control ID");
        if id.is_empty() {
            continue;
        }
        let description = get_field(&row, "Description");
        controls.push(Control {
            id,
            name: get_field(&row, "Name"),
            description: (!description.is_empty()).then_some(description),
            linked_rules: split_list(&get_field(&row, "Linked Rules")),
        });
    }
    debug!(count = controls.len(), path = %path.display(), "loaded control catalog");
    Ok(controls)
}

/// Load a catalog check file (JSON array of check definitions).
pub fn load_checks(path: &Path) -> Result<Vec<CheckDefinition>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read checks: {}", path.display()))?;
    let checks: Vec<CheckDefinition> =
        serde_json::from_str(&raw).with_context(|| format!("parse checks: {}", path.display()))?;
    Ok(checks)
}

/// Load a custom check file (JSON array).
pub fn load_custom_checks(path: &Path) -> Result<Vec<CustomCheck>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read custom checks: {}", path.display()))?;
    let checks: Vec<CustomCheck> = serde_json::from_str(&raw)
        .with_context(|| format!("parse custom checks: {}", path.display()))?;
    Ok(checks)
}

/// Load the active ingestion template's column names.
///
/// Accepts either a JSON array of strings or a CSV file, in which case
/// the header row is the template.
pub fn load_template_columns(path: &Path) -> Result<Vec<String>> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read template: {}", path.display()))?;
        let columns: Vec<String> = serde_json::from_str(&raw)
            .with_context(|| format!("parse template: {}", path.display()))?;
        return Ok(columns);
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("read template: {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("read template headers: {}", path.display()))?;
    Ok(headers
        .iter()
        .map(|h| h.trim_matches('\u{feff}').trim().to_string())
        .filter(|h| !h.is_empty())
        .collect())
}

fn load_records(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("read data: {}", path.display()))?;
    Record::parse_array(&raw).with_context(|| format!("parse data: {}", path.display()))
}

/// Assemble a data context from a directory holding `headers.json`,
/// `lines.json`, and `buyers.json`. Missing files load as empty
/// collections.
pub fn load_data_context(dir: &Path) -> Result<DataContext> {
    let headers = load_records(&dir.join("headers.json"))?;
    let lines = load_records(&dir.join("lines.json"))?;
    let buyers = load_records(&dir.join("buyers.json"))?;
    debug!(
        headers = headers.len(),
        lines = lines.len(),
        buyers = buyers.len(),
        "loaded data context"
    );
    Ok(DataContext::new(headers, lines, buyers))
}
