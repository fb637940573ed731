pub mod ranker;
pub mod similarity;

pub use ranker::{Candidate, RankedMatch, ScoredField, Strictness, rank, rank_excluding};
pub use similarity::{
    edit_distance, normalize_invoice_number, normalize_trn, normalize_vendor_name, similarity,
};
