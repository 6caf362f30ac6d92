//! Memory-based neighborhood collaborative filtering.
//!
//! [`ItemKnn`] ranks items by pairwise similarity over their raters;
//! [`UserKnn`] ranks users by pairwise similarity over their rated
//! items. Both build a [`SimilarityMatrix`] during precompute and then
//! answer queries with weighted aggregation over stored neighbor
//! lists. The aggregation routines are free functions reused by the
//! SVD-projection engine, which shares the exact same query contract.

use crate::catalog::{clamp_rating, Catalog, User};
use crate::error::{Result, SugerirError};
use crate::model::{ModelStore, Neighbor, SimilarityMatrix};
use crate::similarity::SimilarityMethod;
use crate::traits::{Recommendation, Recommender};
use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Pairs below this similarity are dropped from every neighbor list.
pub const DEFAULT_MIN_SIMILARITY: f32 = 1e-5;

/// Item-based memory CF: "users who liked this also liked".
///
/// Precompute builds, for every catalog item, a descending list of
/// similar items over the users that rated both. Predictions average
/// the active user's own ratings of an item's neighbors, weighted by
/// similarity.
///
/// # Examples
///
/// ```
/// use sugerir::catalog::{Catalog, Item, Rating, User};
/// use sugerir::neighborhood::ItemKnn;
/// use sugerir::traits::Recommender;
///
/// let mut catalog = Catalog::new();
/// catalog.add_item(Item::new(1, "A"));
/// catalog.add_item(Item::new(2, "B"));
/// for (id, ratings) in [(1, vec![(1, 5.0), (2, 3.0)]), (2, vec![(1, 4.0), (2, 2.0)]), (3, vec![(1, 4.0)])] {
///     let mut user = User::new(id, format!("U-{id}"));
///     for (item, value) in ratings {
///         user.ratings_mut().add(Rating::new(item, value));
///     }
///     catalog.add_user(user);
/// }
///
/// let mut engine = ItemKnn::new();
/// engine.set_data(catalog);
/// engine.precompute(true).expect("precompute succeeds");
///
/// // User 3 never rated item 2; the estimate comes from item 1.
/// assert_eq!(engine.predict_rating(3, 2), Some(4.0));
/// ```
#[derive(Debug)]
pub struct ItemKnn {
    similarity: SimilarityMethod,
    min_similarity: f32,
    neighborhood_size: Option<usize>,
    catalog: Catalog,
    store: ModelStore,
}

impl Default for ItemKnn {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemKnn {
    /// Creates an engine with Euclidean similarity, no neighbor limit,
    /// and persistence disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            similarity: SimilarityMethod::Euclidean,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            neighborhood_size: None,
            catalog: Catalog::new(),
            store: ModelStore::new(),
        }
    }

    /// Sets the similarity metric (`Jaccard` is rejected at precompute;
    /// it is only defined for user–user comparisons).
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityMethod) -> Self {
        self.similarity = similarity;
        self
    }

    /// Sets the minimum similarity kept in neighbor lists.
    #[must_use]
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Limits every neighbor list to its top-K entries.
    #[must_use]
    pub fn with_neighborhood_size(mut self, size: usize) -> Self {
        self.neighborhood_size = Some(size);
        self
    }

    /// Sets the model file path and enables saving after recompute.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.set_path(Some(path.into()));
        self.store.set_save_enabled(true);
        self
    }

    /// Borrows the similarity matrix once precomputed.
    #[must_use]
    pub fn matrix(&self) -> Option<&SimilarityMatrix> {
        self.store.matrix()
    }
}

impl Recommender for ItemKnn {
    fn set_data(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn precompute(&mut self, force_recompute: bool) -> Result<()> {
        let catalog = &self.catalog;
        let similarity = self.similarity;
        let min_similarity = self.min_similarity;
        let limit = self.neighborhood_size;
        self.store.precompute(force_recompute, || {
            build_item_matrix(catalog, similarity, min_similarity, limit)
        })
    }

    fn rating_for(&self, user: &User, item_id: u32) -> Option<f32> {
        item_rating_from(self.store.matrix()?, user, item_id)
    }

    fn recommendations_for(&self, user_id: u32, top_n: usize) -> Option<Vec<Recommendation>> {
        let matrix = self.store.matrix()?;
        let user = self.catalog.user(user_id)?;
        Some(item_recommendations_from(matrix, user, top_n))
    }
}

/// User-based memory CF: "users similar to you liked".
///
/// Precompute builds, for every user, a descending list of similar
/// users over the items both rated. Predictions average the neighbor
/// users' ratings of the target item, weighted by similarity.
#[derive(Debug)]
pub struct UserKnn {
    similarity: SimilarityMethod,
    min_similarity: f32,
    neighborhood_size: Option<usize>,
    catalog: Catalog,
    store: ModelStore,
}

impl Default for UserKnn {
    fn default() -> Self {
        Self::new()
    }
}

impl UserKnn {
    /// Creates an engine with Pearson similarity, no neighbor limit,
    /// and persistence disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            similarity: SimilarityMethod::Pearson,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            neighborhood_size: None,
            catalog: Catalog::new(),
            store: ModelStore::new(),
        }
    }

    /// Sets the similarity metric.
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityMethod) -> Self {
        self.similarity = similarity;
        self
    }

    /// Sets the minimum similarity kept in neighbor lists.
    #[must_use]
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Limits every neighbor list to its top-K entries.
    #[must_use]
    pub fn with_neighborhood_size(mut self, size: usize) -> Self {
        self.neighborhood_size = Some(size);
        self
    }

    /// Sets the model file path and enables saving after recompute.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.set_path(Some(path.into()));
        self.store.set_save_enabled(true);
        self
    }

    /// Borrows the similarity matrix once precomputed.
    #[must_use]
    pub fn matrix(&self) -> Option<&SimilarityMatrix> {
        self.store.matrix()
    }
}

impl Recommender for UserKnn {
    fn set_data(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn precompute(&mut self, force_recompute: bool) -> Result<()> {
        let catalog = &self.catalog;
        let similarity = self.similarity;
        let min_similarity = self.min_similarity;
        let limit = self.neighborhood_size;
        self.store.precompute(force_recompute, || {
            build_user_matrix(catalog, similarity, min_similarity, limit)
        })
    }

    fn rating_for(&self, user: &User, item_id: u32) -> Option<f32> {
        user_rating_from(self.store.matrix()?, &self.catalog, user, item_id)
    }

    fn recommendations_for(&self, user_id: u32, top_n: usize) -> Option<Vec<Recommendation>> {
        let matrix = self.store.matrix()?;
        let user = self.catalog.user(user_id)?;
        Some(user_recommendations_from(matrix, &self.catalog, user, top_n))
    }
}

/// Builds the item–item similarity matrix.
///
/// Candidates for each item are restricted to items sharing at least
/// one rater (a pure optimization: anything else has empty common
/// support, similarity 0, and falls under the threshold anyway).
pub(crate) fn build_item_matrix(
    catalog: &Catalog,
    similarity: SimilarityMethod,
    min_similarity: f32,
    limit: Option<usize>,
) -> Result<SimilarityMatrix> {
    if similarity == SimilarityMethod::Jaccard {
        return Err(SugerirError::InvalidHyperparameter {
            param: "similarity".to_string(),
            value: "Jaccard".to_string(),
            constraint: "Euclidean or Pearson for item-item comparisons".to_string(),
        });
    }

    // Invert the catalog once: per-item vectors keyed by rater id.
    let mut vectors: BTreeMap<u32, BTreeMap<u32, f32>> = catalog
        .items()
        .map(|item| (item.id(), BTreeMap::new()))
        .collect();
    for user in catalog.users() {
        for (item_id, value) in user.ratings().iter() {
            if let Some(vector) = vectors.get_mut(&item_id) {
                vector.insert(user.id(), value);
            }
        }
    }

    let mut matrix = SimilarityMatrix::new();
    for (&item_id, vector) in &vectors {
        let mut candidates: BTreeSet<u32> = BTreeSet::new();
        for user_id in vector.keys() {
            if let Some(user) = catalog.user(*user_id) {
                candidates.extend(user.ratings().iter().map(|(id, _)| id));
            }
        }
        candidates.remove(&item_id);

        let mut neighbors = Vec::new();
        for other_id in candidates {
            let Some(other) = vectors.get(&other_id) else {
                continue;
            };
            let sim = similarity.between(vector, other);
            if sim < min_similarity {
                continue;
            }
            neighbors.push(Neighbor::new(other_id, sim));
        }
        matrix.insert(item_id, ranked(neighbors, limit));
    }
    info!(
        "item similarity matrix built for {} items ({} raters)",
        matrix.len(),
        catalog.n_users()
    );
    Ok(matrix)
}

/// Builds the user–user similarity matrix.
pub(crate) fn build_user_matrix(
    catalog: &Catalog,
    similarity: SimilarityMethod,
    min_similarity: f32,
    limit: Option<usize>,
) -> Result<SimilarityMatrix> {
    // Per-item rater index, used to restrict each scan to users
    // sharing at least one item.
    let mut raters: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for user in catalog.users() {
        for (item_id, _) in user.ratings().iter() {
            raters.entry(item_id).or_default().push(user.id());
        }
    }

    let mut matrix = SimilarityMatrix::new();
    for user in catalog.users() {
        let mut candidates: BTreeSet<u32> = BTreeSet::new();
        for (item_id, _) in user.ratings().iter() {
            if let Some(ids) = raters.get(&item_id) {
                candidates.extend(ids.iter().copied());
            }
        }
        candidates.remove(&user.id());

        let mut neighbors = Vec::new();
        for other_id in candidates {
            let Some(other) = catalog.user(other_id) else {
                continue;
            };
            let sim = similarity.between(user.ratings().as_map(), other.ratings().as_map());
            if sim < min_similarity {
                continue;
            }
            neighbors.push(Neighbor::new(other_id, sim));
        }
        matrix.insert(user.id(), ranked(neighbors, limit));
    }
    info!(
        "user similarity matrix built for {} users ({} items)",
        matrix.len(),
        catalog.n_items()
    );
    Ok(matrix)
}

/// Sorts descending by similarity (ascending id on ties) and applies
/// the optional top-K limit.
pub(crate) fn ranked(mut neighbors: Vec<Neighbor>, limit: Option<usize>) -> Vec<Neighbor> {
    neighbors.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.id.cmp(&b.id))
    });
    if let Some(limit) = limit {
        neighbors.truncate(limit);
    }
    neighbors
}

/// Weighted rating estimate from an item's stored neighbor list.
///
/// `Σ rating·|sim| / Σ|sim|` over the neighbors the user rated,
/// clamped to the rating scale; `None` when either sum is zero or the
/// item has no stored list.
pub(crate) fn item_rating_from(
    matrix: &SimilarityMatrix,
    user: &User,
    item_id: u32,
) -> Option<f32> {
    let neighbors = matrix.neighbors(item_id)?;
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for neighbor in neighbors {
        if let Some(rating) = user.rating_for(neighbor.id) {
            weighted += rating * neighbor.similarity.abs();
            weight += neighbor.similarity.abs();
        }
    }
    if weighted == 0.0 || weight == 0.0 {
        return None;
    }
    Some(clamp_rating(weighted / weight))
}

/// Weighted rating estimate from a user's stored neighbor list.
pub(crate) fn user_rating_from(
    matrix: &SimilarityMatrix,
    catalog: &Catalog,
    user: &User,
    item_id: u32,
) -> Option<f32> {
    let neighbors = matrix.neighbors(user.id())?;
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for neighbor in neighbors {
        let Some(other) = catalog.user(neighbor.id) else {
            continue;
        };
        if let Some(rating) = other.rating_for(item_id) {
            weighted += rating * neighbor.similarity.abs();
            weight += neighbor.similarity.abs();
        }
    }
    if weighted == 0.0 || weight == 0.0 {
        return None;
    }
    Some(clamp_rating(weighted / weight))
}

/// Item-based recommendations: unions the neighbor lists of every item
/// the user rated, accumulating weighted sums per unseen candidate.
pub(crate) fn item_recommendations_from(
    matrix: &SimilarityMatrix,
    user: &User,
    top_n: usize,
) -> Vec<Recommendation> {
    let mut weighted: BTreeMap<u32, f32> = BTreeMap::new();
    let mut weight: BTreeMap<u32, f32> = BTreeMap::new();

    for (item_id, rating) in user.ratings().iter() {
        let Some(neighbors) = matrix.neighbors(item_id) else {
            continue;
        };
        for neighbor in neighbors {
            if user.has_rated(neighbor.id) {
                continue;
            }
            *weighted.entry(neighbor.id).or_insert(0.0) += rating * neighbor.similarity.abs();
            *weight.entry(neighbor.id).or_insert(0.0) += neighbor.similarity.abs();
        }
    }
    collect_recommendations(weighted, &weight, top_n)
}

/// User-based recommendations: candidates are the unrated items of the
/// user's stored neighbors, weighted by neighbor similarity.
pub(crate) fn user_recommendations_from(
    matrix: &SimilarityMatrix,
    catalog: &Catalog,
    user: &User,
    top_n: usize,
) -> Vec<Recommendation> {
    let mut weighted: BTreeMap<u32, f32> = BTreeMap::new();
    let mut weight: BTreeMap<u32, f32> = BTreeMap::new();

    let Some(neighbors) = matrix.neighbors(user.id()) else {
        return Vec::new();
    };
    for neighbor in neighbors {
        let Some(other) = catalog.user(neighbor.id) else {
            continue;
        };
        for (item_id, rating) in other.ratings().iter() {
            if user.has_rated(item_id) {
                continue;
            }
            *weighted.entry(item_id).or_insert(0.0) += rating * neighbor.similarity.abs();
            *weight.entry(item_id).or_insert(0.0) += neighbor.similarity.abs();
        }
    }
    collect_recommendations(weighted, &weight, top_n)
}

fn collect_recommendations(
    weighted: BTreeMap<u32, f32>,
    weight: &BTreeMap<u32, f32>,
    top_n: usize,
) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = weighted
        .into_iter()
        .filter_map(|(item_id, sum)| {
            let total = weight.get(&item_id).copied().unwrap_or(0.0);
            if sum == 0.0 || total == 0.0 {
                return None;
            }
            Some(Recommendation::new(item_id, sum / total))
        })
        .collect();
    recommendations.sort_by(|a, b| {
        b.estimate
            .total_cmp(&a.estimate)
            .then(a.item_id.cmp(&b.item_id))
    });
    recommendations.truncate(top_n);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Item, Rating};

    /// Three users with opposed tastes over items A=1, B=2, plus a
    /// fourth user who only rated A.
    fn scenario_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_item(Item::new(1, "A"));
        catalog.add_item(Item::new(2, "B"));

        let ratings = [
            (1, vec![(1, 5.0), (2, 3.0)]),
            (2, vec![(1, 4.0), (2, 2.0)]),
            (3, vec![(1, 1.0), (2, 5.0)]),
            (4, vec![(1, 4.0)]),
        ];
        for (id, list) in ratings {
            let mut user = User::new(id, format!("U-{id}"));
            for (item_id, value) in list {
                user.ratings_mut().add(Rating::new(item_id, value));
            }
            catalog.add_user(user);
        }
        catalog
    }

    #[test]
    fn item_matrix_has_no_self_entries_and_scenario_value() {
        let mut engine = ItemKnn::new();
        engine.set_data(scenario_catalog());
        engine.precompute(true).expect("precompute succeeds");

        let matrix = engine.matrix().expect("model built");
        for (entity_id, neighbors) in matrix.iter() {
            assert!(neighbors.iter().all(|n| n.id != entity_id));
        }

        // Common raters of A and B are users 1..3: 1/(1+24) = 0.04.
        let neighbors = matrix.neighbors(1).expect("item 1 present");
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].id, 2);
        assert_eq!(neighbors[0].similarity, 0.04);
    }

    #[test]
    fn item_prediction_weights_by_own_ratings() {
        let mut engine = ItemKnn::new();
        engine.set_data(scenario_catalog());
        engine.precompute(true).expect("precompute succeeds");

        // User 4 rated only A=4.0; the single neighbor of B is A.
        assert_eq!(engine.predict_rating(4, 2), Some(4.0));
    }

    #[test]
    fn short_circuit_returns_existing_rating_without_model() {
        let mut engine = ItemKnn::new();
        engine.set_data(scenario_catalog());

        // No precompute at all: rated pairs still answer.
        assert_eq!(engine.predict_rating(1, 2), Some(3.0));
        // Unrated pairs are unavailable.
        assert_eq!(engine.predict_rating(4, 2), None);
        assert!(engine.recommendations_for(4, 10).is_none());
    }

    #[test]
    fn recommendations_exclude_rated_items() {
        let mut engine = ItemKnn::new();
        engine.set_data(scenario_catalog());
        engine.precompute(true).expect("precompute succeeds");

        let recommendations = engine
            .recommendations_for(4, 10)
            .expect("model available");
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].item_id, 2);
        assert_eq!(recommendations[0].estimate, 4.0);

        // Users who rated everything get an empty list, not None.
        let full = engine.recommendations_for(1, 10).expect("model available");
        assert!(full.is_empty());
    }

    #[test]
    fn jaccard_is_rejected_for_items() {
        let mut engine = ItemKnn::new().with_similarity(SimilarityMethod::Jaccard);
        engine.set_data(scenario_catalog());

        assert!(matches!(
            engine.precompute(true),
            Err(SugerirError::InvalidHyperparameter { .. })
        ));
    }

    /// U1/U2 agree perfectly over {A, B}; U3 disagrees perfectly; U2
    /// also rated C, the recommendation candidate for U1.
    fn user_scenario_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_item(Item::new(1, "A"));
        catalog.add_item(Item::new(2, "B"));
        catalog.add_item(Item::new(3, "C"));

        let ratings = [
            (1, vec![(1, 5.0), (2, 3.0)]),
            (2, vec![(1, 4.0), (2, 2.0), (3, 4.0)]),
            (3, vec![(1, 1.0), (2, 5.0)]),
        ];
        for (id, list) in ratings {
            let mut user = User::new(id, format!("U-{id}"));
            for (item_id, value) in list {
                user.ratings_mut().add(Rating::new(item_id, value));
            }
            catalog.add_user(user);
        }
        catalog
    }

    #[test]
    fn user_matrix_drops_negative_correlations() {
        let mut engine = UserKnn::new();
        engine.set_data(user_scenario_catalog());
        engine.precompute(true).expect("precompute succeeds");

        let matrix = engine.matrix().expect("model built");
        let neighbors = matrix.neighbors(1).expect("user 1 present");
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].id, 2);
        assert_eq!(neighbors[0].similarity, 1.0);

        // User 3 anti-correlates with everyone; empty list, no self.
        let neighbors = matrix.neighbors(3).expect("user 3 present");
        assert!(neighbors.is_empty());
    }

    #[test]
    fn user_prediction_and_recommendations_come_from_neighbors() {
        let mut engine = UserKnn::new();
        engine.set_data(user_scenario_catalog());
        engine.precompute(true).expect("precompute succeeds");

        assert_eq!(engine.predict_rating(1, 3), Some(4.0));

        let recommendations = engine
            .recommendations_for(1, 10)
            .expect("model available");
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].item_id, 3);
        assert_eq!(recommendations[0].estimate, 4.0);

        // No neighbors means no estimates.
        assert_eq!(engine.predict_rating(3, 3), None);
        let empty = engine.recommendations_for(3, 10).expect("model available");
        assert!(empty.is_empty());
    }

    #[test]
    fn neighborhood_size_truncates_ranked_lists() {
        let mut catalog = Catalog::new();
        for id in 1..=3 {
            catalog.add_item(Item::new(id, format!("I-{id}")));
        }
        // Item 1 vs 2 differ by 1 point, item 1 vs 3 by 2 points, so
        // sim(1,2) > sim(1,3) > 0 under Euclidean.
        let ratings = [
            (1, vec![(1, 5.0), (2, 4.0), (3, 3.0)]),
            (2, vec![(1, 4.0), (2, 3.0), (3, 2.0)]),
        ];
        for (id, list) in ratings {
            let mut user = User::new(id, format!("U-{id}"));
            for (item_id, value) in list {
                user.ratings_mut().add(Rating::new(item_id, value));
            }
            catalog.add_user(user);
        }

        let mut engine = ItemKnn::new().with_neighborhood_size(1);
        engine.set_data(catalog);
        engine.precompute(true).expect("precompute succeeds");

        let matrix = engine.matrix().expect("model built");
        let neighbors = matrix.neighbors(1).expect("item 1 present");
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].id, 2);
    }

    #[test]
    fn ranked_breaks_ties_by_ascending_id() {
        let neighbors = vec![
            Neighbor::new(9, 0.5),
            Neighbor::new(2, 0.5),
            Neighbor::new(5, 0.7),
        ];
        let ranked = ranked(neighbors, None);
        let ids: Vec<u32> = ranked.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![5, 2, 9]);
    }
}
