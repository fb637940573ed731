//! Fuzzy candidate ranking over multi-field records.
//!
//! Scores a query against every candidate as a weighted combination of
//! per-field similarity, then returns candidates sorted descending by
//! score and filtered by a strictness profile. Linear scan per ranking;
//! fine for interactive datasets of a few thousand records, a scaling
//! boundary beyond that.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::similarity::similarity;

/// Minimum-score profile for ranked search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Strict,
    #[default]
    Balanced,
    Loose,
}

impl Strictness {
    /// Minimum composite score a candidate must reach to be returned.
    pub fn threshold(&self) -> f64 {
        match self {
            Strictness::Strict => 0.85,
            Strictness::Balanced => 0.65,
            Strictness::Loose => 0.45,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strictness::Strict => "strict",
            Strictness::Balanced => "balanced",
            Strictness::Loose => "loose",
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Strictness::Strict),
            "balanced" => Ok(Strictness::Balanced),
            "loose" => Ok(Strictness::Loose),
            _ => Err(format!("Unknown strictness profile: {s}")),
        }
    }
}

/// One weighted text field of a candidate.
#[derive(Debug, Clone)]
pub struct ScoredField {
    pub name: String,
    pub value: String,
    pub weight: f64,
}

impl ScoredField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            weight,
        }
    }
}

/// A labeled candidate exposing several named text fields.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Caller-side identity (invoice id, row key).
    pub label: String,
    pub fields: Vec<ScoredField>,
}

impl Candidate {
    pub fn new(label: impl Into<String>, fields: Vec<ScoredField>) -> Self {
        Self {
            label: label.into(),
            fields,
        }
    }

    /// Weighted composite similarity of this candidate against a query.
    /// Zero when the candidate has no weighted fields.
    pub fn score_against(&self, query: &str) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for field in &self.fields {
            if field.weight <= 0.0 {
                continue;
            }
            weighted += field.weight * similarity(query, &field.value);
            total_weight += field.weight;
        }
        if total_weight == 0.0 {
            return 0.0;
        }
        weighted / total_weight
    }
}

/// One ranked result. `index` points back into the input slice.
#[derive(Debug, Clone)]
pub struct RankedMatch {
    pub index: usize,
    pub label: String,
    pub score: f64,
}

/// Rank candidates against a query, descending by score, filtered by the
/// strictness threshold. Ties keep input order (stable sort).
pub fn rank(query: &str, candidates: &[Candidate], strictness: Strictness) -> Vec<RankedMatch> {
    rank_excluding(query, candidates, strictness, None)
}

/// Rank with an excluded index, used when the query was built from a seed
/// record that is itself part of the candidate set.
pub fn rank_excluding(
    query: &str,
    candidates: &[Candidate],
    strictness: Strictness,
    exclude: Option<usize>,
) -> Vec<RankedMatch> {
    let threshold = strictness.threshold();
    let mut matches: Vec<RankedMatch> = candidates
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != exclude)
        .map(|(idx, candidate)| RankedMatch {
            index: idx,
            label: candidate.label.clone(),
            score: candidate.score_against(query),
        })
        .filter(|m| m.score >= threshold)
        .collect();
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str, number: &str, vendor: &str) -> Candidate {
        Candidate::new(
            label,
            vec![
                ScoredField::new("invoice_number", number, 2.0),
                ScoredField::new("vendor_name", vendor, 1.0),
            ],
        )
    }

    #[test]
    fn ranks_descending_with_threshold() {
        let candidates = vec![
            candidate("INV-1", "INV-2024-001", "ABC Trading LLC"),
            candidate("INV-2", "INV-2024-001", "INV-2024-001"),
            candidate("INV-3", "PO-9999", "Unrelated Parts Co"),
        ];
        let matches = rank("INV-2024-001", &candidates, Strictness::Balanced);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].label, "INV-2");
        assert_eq!(matches[1].label, "INV-1");
        assert!(matches[0].score > matches[1].score);
    }

    #[test]
    fn strict_profile_filters_harder() {
        let candidates = vec![candidate("INV-1", "INV-2024-099", "Someone Else")];
        assert!(rank("INV-2024-001", &candidates, Strictness::Strict).is_empty());
        assert!(!rank("INV-2024-001", &candidates, Strictness::Loose).is_empty());
    }

    #[test]
    fn tie_break_is_stable_by_input_order() {
        let candidates = vec![
            candidate("first", "SAME", "SAME"),
            candidate("second", "SAME", "SAME"),
        ];
        let matches = rank("SAME", &candidates, Strictness::Strict);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].label, "first");
        assert_eq!(matches[1].label, "second");
    }

    #[test]
    fn excludes_seed_index() {
        let candidates = vec![
            candidate("seed", "INV-1", "ABC"),
            candidate("other", "INV-1", "ABC"),
        ];
        let matches = rank_excluding("INV-1", &candidates, Strictness::Loose, Some(0));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].label, "other");
    }

    #[test]
    fn zero_weight_fields_are_ignored() {
        let c = Candidate::new(
            "x",
            vec![
                ScoredField::new("a", "match me", 0.0),
                ScoredField::new("b", "completely different text", 1.0),
            ],
        );
        assert!(c.score_against("match me") < 0.5);
    }
}
