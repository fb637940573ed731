//! Type-safe enumerations and definitions for compliance checks.
//!
//! Checks come in two flavors: the seeded catalog (`CheckDefinition`,
//! toggled by operators, never mutated mid-run) and tenant-authored ad-hoc
//! checks (`CustomCheck`, parameterized by kind).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Finding severity. Drives the SLA target frozen onto each exception at
/// creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    /// Default resolution SLA in hours for findings of this severity.
    pub fn sla_hours(&self) -> u32 {
        match self {
            Severity::Critical => 24,
            Severity::High => 48,
            Severity::Medium => 72,
            Severity::Low => 120,
        }
    }

    /// Sort order for summary tables. Critical first.
    pub fn sort_order(&self) -> u8 {
        match self {
            Severity::Critical => 1,
            Severity::High => 2,
            Severity::Medium => 3,
            Severity::Low => 4,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CRITICAL" => Ok(Severity::Critical),
            "HIGH" => Ok(Severity::High),
            "MEDIUM" => Ok(Severity::Medium),
            "LOW" => Ok(Severity::Low),
            _ => Err(format!("Unknown severity: {s}")),
        }
    }
}

/// Which record collection a check evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckScope {
    /// Invoice header records.
    #[serde(alias = "headers")]
    Header,
    /// Invoice line records.
    #[serde(alias = "line")]
    Lines,
    /// Party (buyer) records.
    #[serde(alias = "buyer", alias = "buyers")]
    Party,
    /// Checks that join across collections (header/line reconciliation).
    #[serde(alias = "cross-file", alias = "crossfile")]
    CrossFile,
}

impl CheckScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckScope::Header => "Header",
            CheckScope::Lines => "Lines",
            CheckScope::Party => "Party",
            CheckScope::CrossFile => "Cross-file",
        }
    }
}

impl fmt::Display for CheckScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CheckScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HEADER" | "HEADERS" => Ok(CheckScope::Header),
            "LINE" | "LINES" => Ok(CheckScope::Lines),
            "PARTY" | "BUYER" | "BUYERS" => Ok(CheckScope::Party),
            "CROSS-FILE" | "CROSS_FILE" | "CROSSFILE" => Ok(CheckScope::CrossFile),
            _ => Err(format!("Unknown check scope: {s}")),
        }
    }
}

/// Evaluation-logic tag on catalog checks. Bespoke handlers ignore it; the
/// generic fallback dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Presence,
    Format,
    CodeList,
    Arithmetic,
    CrossField,
    CrossRecord,
    Custom,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Presence => "Presence",
            RuleType::Format => "Format",
            RuleType::CodeList => "CodeList",
            RuleType::Arithmetic => "Arithmetic",
            RuleType::CrossField => "CrossField",
            RuleType::CrossRecord => "CrossRecord",
            RuleType::Custom => "Custom",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A seeded catalog check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDefinition {
    pub check_id: String,
    pub title: String,
    pub severity: Severity,
    pub scope: CheckScope,
    pub rule_type: RuleType,
    /// Kind-specific parameter bag; shape depends on `rule_type`.
    #[serde(default)]
    pub parameters: Value,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    /// Message template; `{field}` / `{value}` placeholders are filled at
    /// exception creation.
    pub message: String,
    #[serde(default)]
    pub suggested_fix: Option<String>,
    #[serde(default)]
    pub owner_team: Option<String>,
    /// Requirement ids this check gives coverage for.
    #[serde(default)]
    pub linked_requirements: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl CheckDefinition {
    /// Fetch a string parameter by name.
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name)?.as_str()
    }

    pub fn param_f64(&self, name: &str) -> Option<f64> {
        self.parameters.get(name)?.as_f64()
    }

    /// Fetch a string-array parameter by name (codelists, field lists).
    pub fn param_str_list(&self, name: &str) -> Option<Vec<String>> {
        let items = self.parameters.get(name)?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }
}

/// The kind of a tenant-authored check. The three search kinds never emit
/// hard exceptions; they produce investigation flags instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomCheckKind {
    Missing,
    Duplicate,
    Math,
    Regex,
    CustomFormula,
    FuzzyDuplicate,
    InvoiceNumberVariant,
    TrnFormatSimilarity,
}

impl CustomCheckKind {
    /// True for the pairwise kinds handled by `run_search_check`.
    pub fn is_search(&self) -> bool {
        matches!(
            self,
            CustomCheckKind::FuzzyDuplicate
                | CustomCheckKind::InvoiceNumberVariant
                | CustomCheckKind::TrnFormatSimilarity
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomCheckKind::Missing => "missing",
            CustomCheckKind::Duplicate => "duplicate",
            CustomCheckKind::Math => "math",
            CustomCheckKind::Regex => "regex",
            CustomCheckKind::CustomFormula => "custom_formula",
            CustomCheckKind::FuzzyDuplicate => "fuzzy_duplicate",
            CustomCheckKind::InvoiceNumberVariant => "invoice_number_variant",
            CustomCheckKind::TrnFormatSimilarity => "trn_format_similarity",
        }
    }
}

impl fmt::Display for CustomCheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tenant-authored ad-hoc check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCheck {
    pub id: String,
    pub name: String,
    pub kind: CustomCheckKind,
    /// The dataset this check iterates.
    pub dataset: CheckScope,
    pub severity: Severity,
    pub message: String,
    /// Optional boolean gate evaluated per record before the kind logic.
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default = "default_enabled")]
    pub is_active: bool,
}

impl CustomCheck {
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name)?.as_str()
    }

    pub fn param_f64(&self, name: &str) -> Option<f64> {
        self.parameters.get(name)?.as_f64()
    }

    pub fn param_str_list(&self, name: &str) -> Option<Vec<String>> {
        let items = self.parameters.get(name)?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }
}
