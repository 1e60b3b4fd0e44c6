//! Edit-distance similarity shared by the deterministic and assisted layers.

/// Normalized Levenshtein similarity over chars: `1 - distance / max_len`.
///
/// Two empty strings are identical (1.0); an empty string against a
/// non-empty one scores 0.0.
///
/// ```rust
/// use canonical::edit_similarity;
///
/// assert_eq!(edit_similarity("kitten", "kitten"), 1.0);
/// assert!((edit_similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
/// ```
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Like [`edit_similarity`] but gives up early and returns 0.0 when the
/// length difference alone rules out reaching `floor`.
pub fn edit_similarity_at_least(a: &str, b: &str, floor: f64) -> f64 {
    let la = a.chars().count();
    let lb = b.chars().count();
    let max = la.max(lb);
    if max == 0 {
        return 1.0;
    }
    let best_possible = 1.0 - la.abs_diff(lb) as f64 / max as f64;
    if best_possible < floor {
        return 0.0;
    }
    edit_similarity(a, b)
}
