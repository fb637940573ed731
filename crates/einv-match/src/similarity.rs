//! Edit distance, normalized similarity, and field normalizers.
//!
//! Normalizers are pure and idempotent, and must be applied before any
//! duplicate-key or similarity comparison so formatting noise (separators,
//! casing, spacing) does not produce false negatives.

/// Classic dynamic-programming edit distance over Unicode scalar values.
///
/// Full matrix, O(len(a) * len(b)) time and space. Invoice fields are
/// short (typically under 100 chars), so the quadratic cost is acceptable.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let cols = b.len() + 1;
    let mut matrix = vec![0usize; (a.len() + 1) * cols];
    for i in 0..=a.len() {
        matrix[i * cols] = i;
    }
    for j in 0..=b.len() {
        matrix[j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let deletion = matrix[(i - 1) * cols + j] + 1;
            let insertion = matrix[i * cols + (j - 1)] + 1;
            let substitution = matrix[(i - 1) * cols + (j - 1)] + cost;
            matrix[i * cols + j] = deletion.min(insertion).min(substitution);
        }
    }
    matrix[a.len() * cols + b.len()]
}

/// Normalized similarity in `[0, 1]` after case-folding.
///
/// `1.0` when both strings are empty, `0.0` when exactly one is empty,
/// otherwise `(max_len - edit_distance) / max_len`. Symmetric and
/// reflexive.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    let distance = edit_distance(&a, &b);
    (max_len.saturating_sub(distance)) as f64 / max_len as f64
}

/// Strip separator characters (whitespace, hyphen, underscore, slash) and
/// lower-case, so `INV-2024/001` and `inv 2024 001` compare equal.
pub fn normalize_invoice_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '/'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Trim, collapse internal whitespace runs to single spaces, and
/// lower-case.
pub fn normalize_vendor_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Keep only digits. Tax registration numbers are digit strings under
/// formatting drift (spaces, dashes, country prefixes typed by hand).
pub fn normalize_trn(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("", "ab"), 2);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("abc", "abc"), 0);
    }

    #[test]
    fn similarity_case_folds() {
        assert_eq!(similarity("ABC Trading LLC", "ABC TRADING LLC"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("ABC", ""), 0.0);
        assert_eq!(similarity("", "ABC"), 0.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = "Gulf Star Trading";
        let b = "Gulf Star Traders";
        assert_eq!(similarity(a, b), similarity(b, a));
        assert!(similarity(a, b) > 0.8);
    }

    #[test]
    fn invoice_number_normalization() {
        assert_eq!(normalize_invoice_number("INV-2024/001"), "inv2024001");
        assert_eq!(normalize_invoice_number("inv 2024_001"), "inv2024001");
        // Idempotent.
        let once = normalize_invoice_number("INV-2024/001");
        assert_eq!(normalize_invoice_number(&once), once);
    }

    #[test]
    fn vendor_name_normalization() {
        assert_eq!(
            normalize_vendor_name("  ABC   Trading\tLLC "),
            "abc trading llc"
        );
    }

    #[test]
    fn trn_normalization() {
        assert_eq!(normalize_trn("100-2345-6789-0123"), "100234567890123");
        assert_eq!(normalize_trn("TRN 100234567890123"), "100234567890123");
        assert_eq!(normalize_trn("no digits"), "");
    }
}
