//! Similarity metrics between two rating vectors.
//!
//! Every metric is a pure function over the "common support" of its
//! inputs: the set of ids both vectors carry a rating for. Empty
//! support yields similarity 0, never an error. Results are rounded to
//! 5 decimal digits, an exact precision contract relied on by the
//! model file round-trip (see [`crate::model`]).
//!
//! Inputs are ordered id → rating maps, so accumulation order (and
//! therefore the floating-point result) is deterministic.

use crate::catalog::{RATING_MAX, RATING_MIN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selects the metric used for pairwise similarity.
///
/// Dispatched exhaustively; there is no fallback arm. `Jaccard` is
/// meaningful only for user–user comparisons and the item-based
/// engines reject it at precompute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityMethod {
    /// Inverse squared-distance similarity, range (0, 1].
    Euclidean,
    /// Pearson correlation coefficient, range [-1, 1].
    Pearson,
    /// Jaccard overlap with a rating-difference penalty, range [0, 1).
    Jaccard,
}

impl SimilarityMethod {
    /// Computes the similarity between two rating vectors.
    #[must_use]
    pub fn between(&self, a: &BTreeMap<u32, f32>, b: &BTreeMap<u32, f32>) -> f32 {
        match self {
            SimilarityMethod::Euclidean => euclidean(a, b),
            SimilarityMethod::Pearson => pearson(a, b),
            SimilarityMethod::Jaccard => jaccard(a, b),
        }
    }
}

/// Rounds a similarity value to 5 decimal digits.
///
/// Computed similarities carry this precision so that a persisted
/// model reloads to exactly the in-memory values.
#[must_use]
pub fn round5(value: f32) -> f32 {
    (value * 100_000.0).round() / 100_000.0
}

fn common_support<'a>(
    a: &'a BTreeMap<u32, f32>,
    b: &'a BTreeMap<u32, f32>,
) -> impl Iterator<Item = (f32, f32)> + 'a {
    a.iter()
        .filter_map(|(id, &ra)| b.get(id).map(|&rb| (ra, rb)))
}

/// Inverse squared-distance similarity over common support.
///
/// `1 / (1 + Σ(ra − rb)²)`, which lands in (0, 1] for non-empty
/// support; empty support yields 0.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use sugerir::similarity::euclidean;
///
/// let a: BTreeMap<u32, f32> = [(1, 5.0), (2, 3.0)].into();
/// let b: BTreeMap<u32, f32> = [(1, 5.0), (2, 3.0)].into();
/// assert_eq!(euclidean(&a, &b), 1.0);
/// ```
#[must_use]
pub fn euclidean(a: &BTreeMap<u32, f32>, b: &BTreeMap<u32, f32>) -> f32 {
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for (ra, rb) in common_support(a, b) {
        sum_sq += (ra - rb) * (ra - rb);
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    round5(1.0 / (1.0 + sum_sq))
}

/// Pearson correlation coefficient over common support.
///
/// Returns 0 when the support is empty or either side has zero
/// variance over it; otherwise clamped to [-1, 1].
#[must_use]
pub fn pearson(a: &BTreeMap<u32, f32>, b: &BTreeMap<u32, f32>) -> f32 {
    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    let mut sum_sq_a = 0.0;
    let mut sum_sq_b = 0.0;
    let mut sum_prod = 0.0;
    let mut count = 0usize;

    for (ra, rb) in common_support(a, b) {
        sum_a += ra;
        sum_b += rb;
        sum_sq_a += ra * ra;
        sum_sq_b += rb * rb;
        sum_prod += ra * rb;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }

    let n = count as f32;
    let numerator = sum_prod - (sum_a * sum_b) / n;
    let var_a = sum_sq_a - (sum_a * sum_a) / n;
    let var_b = sum_sq_b - (sum_b * sum_b) / n;
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }

    let result = numerator / (var_a * var_b).sqrt();
    round5(result.clamp(-1.0, 1.0))
}

/// Jaccard overlap with a rating-difference penalty (user–user only).
///
/// `|common| / |union|` minus the mean absolute rating difference over
/// the common support, scaled into a [0, 1] fraction of the rating
/// range. The penalty is subtracted, not multiplied, so the raw value
/// can go negative before the 0 floor; the resulting range differs
/// from the other metrics.
#[must_use]
pub fn jaccard(a: &BTreeMap<u32, f32>, b: &BTreeMap<u32, f32>) -> f32 {
    let mut total_diff = 0.0;
    let mut count = 0usize;
    for (ra, rb) in common_support(a, b) {
        total_diff += (ra - rb).abs();
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }

    let n = count as f32;
    let union = a.len() as f32 + b.len() as f32 - n;
    let diff_penalty = total_diff / (n * (RATING_MAX - RATING_MIN));
    let similarity = n / union - diff_penalty;
    round5(similarity.max(0.0))
}
