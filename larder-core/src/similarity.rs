//! Edit-distance similarity between ingredient names.

use crate::SimilarIngredient;
use std::cmp::Ordering;

/// Similarity in `[0, 1]` derived from Levenshtein distance.
///
/// `1 - distance / max(len(a), len(b))`, lengths counted in chars.
/// Two empty strings are identical (`1.0`).
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(a, b);
    1.0 - (distance as f64 / max_len as f64)
}

/// Score candidates against a normalized query and keep those at or above
/// `threshold`, best first. Ties keep candidate order.
pub fn rank_matches<I, S1, S2>(query: &str, candidates: I, threshold: f64) -> Vec<SimilarIngredient>
where
    I: IntoIterator<Item = (S1, S2)>,
    S1: Into<String>,
    S2: Into<String>,
{
    let mut matches: Vec<SimilarIngredient> = candidates
        .into_iter()
        .filter_map(|(id, name)| {
            let name = name.into();
            let score = similarity(query, &name);
            (score >= threshold).then(|| SimilarIngredient {
                id: id.into(),
                name,
                score,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    matches
}
