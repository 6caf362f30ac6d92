//! Decomposition-based neighborhood CF over a reduced embedding space.
//!
//! [`SvdKnn`] builds a dense rating matrix, hands it to an injected
//! [`Decomposition`] capability, and keeps only the leading two
//! singular directions. Each entity's raw rating vector is projected
//! into that 2-D space and compared to every same-kind entity by
//! cosine similarity; the surviving pairs form a
//! [`SimilarityMatrix`] served through the exact same weighted
//! aggregation as the memory-based engines.

use crate::catalog::{Catalog, User};
use crate::error::{Result, SugerirError};
use crate::model::{ModelStore, Neighbor, SimilarityMatrix};
use crate::neighborhood::{
    item_rating_from, item_recommendations_from, ranked, user_rating_from,
    user_recommendations_from,
};
use crate::primitives::Matrix;
use crate::similarity::round5;
use crate::traits::{Decomposition, Recommendation, Recommender, Svd};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Similarities below this cosine are dropped from neighbor lists.
pub const DEFAULT_MIN_COSINE: f32 = 0.9;

/// Which entity axis the engine ranks: items against items, or users
/// against users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// Rows are items; similar items are ranked.
    Item,
    /// Rows are users; similar users are ranked.
    User,
}

/// Model-based CF over a rank-2 decomposition of the rating matrix.
///
/// The decomposition itself is injected; this engine owns the matrix
/// construction, the projection into the reduced basis, the cosine
/// scan, and the neighbor aggregation.
pub struct SvdKnn {
    kind: EntityKind,
    min_similarity: f32,
    neighborhood_size: Option<usize>,
    catalog: Catalog,
    store: ModelStore,
    decomposer: Box<dyn Decomposition>,
}

impl fmt::Debug for SvdKnn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SvdKnn")
            .field("kind", &self.kind)
            .field("min_similarity", &self.min_similarity)
            .field("neighborhood_size", &self.neighborhood_size)
            .finish_non_exhaustive()
    }
}

impl SvdKnn {
    /// Creates an item-axis engine with the given decomposition.
    #[must_use]
    pub fn item_based(decomposer: Box<dyn Decomposition>) -> Self {
        Self::new(EntityKind::Item, decomposer)
    }

    /// Creates a user-axis engine with the given decomposition.
    #[must_use]
    pub fn user_based(decomposer: Box<dyn Decomposition>) -> Self {
        Self::new(EntityKind::User, decomposer)
    }

    fn new(kind: EntityKind, decomposer: Box<dyn Decomposition>) -> Self {
        Self {
            kind,
            min_similarity: DEFAULT_MIN_COSINE,
            neighborhood_size: None,
            catalog: Catalog::new(),
            store: ModelStore::new(),
            decomposer,
        }
    }

    /// Returns the entity axis this engine ranks.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Sets the minimum cosine similarity kept in neighbor lists.
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

impl Recommender for SvdKnn {
    fn set_data(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn precompute(&mut self, force_recompute: bool) -> Result<()> {
        let catalog = &self.catalog;
        let kind = self.kind;
        let decomposer = &self.decomposer;
        let min_similarity = self.min_similarity;
        let limit = self.neighborhood_size;
        self.store.precompute(force_recompute, || {
            build_projected_matrix(catalog, kind, decomposer.as_ref(), min_similarity, limit)
        })
    }

    fn rating_for(&self, user: &User, item_id: u32) -> Option<f32> {
        let matrix = self.store.matrix()?;
        match self.kind {
            EntityKind::Item => item_rating_from(matrix, user, item_id),
            EntityKind::User => user_rating_from(matrix, &self.catalog, user, item_id),
        }
    }

    fn recommendations_for(&self, user_id: u32, top_n: usize) -> Option<Vec<Recommendation>> {
        let matrix = self.store.matrix()?;
        let user = self.catalog.user(user_id)?;
        Some(match self.kind {
            EntityKind::Item => item_recommendations_from(matrix, user, top_n),
            EntityKind::User => user_recommendations_from(matrix, &self.catalog, user, top_n),
        })
    }
}

fn build_projected_matrix(
    catalog: &Catalog,
    kind: EntityKind,
    decomposer: &dyn Decomposition,
    min_similarity: f32,
    limit: Option<usize>,
) -> Result<SimilarityMatrix> {
    let item_ids: Vec<u32> = catalog.items().map(|i| i.id()).collect();
    let user_ids: Vec<u32> = catalog.users().map(|u| u.id()).collect();
    let (row_ids, col_ids) = match kind {
        EntityKind::Item => (item_ids.clone(), user_ids.clone()),
        EntityKind::User => (user_ids.clone(), item_ids.clone()),
    };

    if row_ids.is_empty() || col_ids.is_empty() {
        let mut matrix = SimilarityMatrix::new();
        for id in row_ids {
            matrix.insert(id, Vec::new());
        }
        return Ok(matrix);
    }

    let ratings = rating_matrix(catalog, kind, &item_ids, &user_ids);
    let svd = decomposer.decompose(&ratings)?;
    validate_shapes(&svd, row_ids.len(), col_ids.len())?;

    let same_basis = two_columns(&svd.u);
    let opposite_basis = two_columns(&svd.v);
    let s_inv = invert_2x2(
        svd.s.get(0, 0),
        svd.s.get(0, 1),
        svd.s.get(1, 0),
        svd.s.get(1, 1),
    );

    let mut matrix = SimilarityMatrix::new();
    for (row, &entity_id) in row_ids.iter().enumerate() {
        let raw = ratings.row(row);
        let projected = [raw.dot(&opposite_basis.column(0)), raw.dot(&opposite_basis.column(1))];
        let embedded = [
            projected[0] * s_inv[0][0] + projected[1] * s_inv[1][0],
            projected[0] * s_inv[0][1] + projected[1] * s_inv[1][1],
        ];
        let embedded_norm = (embedded[0] * embedded[0] + embedded[1] * embedded[1]).sqrt();

        let mut neighbors = Vec::new();
        for (other_row, &other_id) in row_ids.iter().enumerate() {
            if other_id == entity_id {
                continue;
            }
            let basis = [same_basis.get(other_row, 0), same_basis.get(other_row, 1)];
            let basis_norm = (basis[0] * basis[0] + basis[1] * basis[1]).sqrt();
            let mut similarity = (embedded[0] * basis[0] + embedded[1] * basis[1])
                / (embedded_norm * basis_norm);
            if !similarity.is_finite() {
                similarity = 0.0;
            }
            if similarity < min_similarity {
                continue;
            }
            neighbors.push(Neighbor::new(other_id, similarity));
        }

        // Rank on the unrounded cosines, then apply the precision
        // contract to the survivors.
        let neighbors = ranked(neighbors, limit)
            .into_iter()
            .map(|n| Neighbor::new(n.id, round5(n.similarity)))
            .collect();
        matrix.insert(entity_id, neighbors);
    }
    info!(
        "projected similarity matrix built for {} entities ({:?} axis)",
        matrix.len(),
        kind
    );
    Ok(matrix)
}

/// Dense rating matrix for the requested axis; missing ratings are 0.
fn rating_matrix(
    catalog: &Catalog,
    kind: EntityKind,
    item_ids: &[u32],
    user_ids: &[u32],
) -> Matrix<f32> {
    let item_index: BTreeMap<u32, usize> =
        item_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let user_index: BTreeMap<u32, usize> =
        user_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let (rows, cols) = match kind {
        EntityKind::Item => (item_ids.len(), user_ids.len()),
        EntityKind::User => (user_ids.len(), item_ids.len()),
    };
    let mut matrix = Matrix::zeros(rows, cols);
    for user in catalog.users() {
        let Some(&u) = user_index.get(&user.id()) else {
            continue;
        };
        for (item_id, value) in user.ratings().iter() {
            let Some(&i) = item_index.get(&item_id) else {
                continue;
            };
            match kind {
                EntityKind::Item => matrix.set(i, u, value),
                EntityKind::User => matrix.set(u, i, value),
            }
        }
    }
    matrix
}

fn validate_shapes(svd: &Svd, rows: usize, cols: usize) -> Result<()> {
    if svd.u.n_rows() != rows || svd.u.n_cols() < 2 {
        return Err(SugerirError::Decomposition(format!(
            "U must be {rows}x>=2, got {}x{}",
            svd.u.n_rows(),
            svd.u.n_cols()
        )));
    }
    if svd.v.n_rows() != cols || svd.v.n_cols() < 2 {
        return Err(SugerirError::Decomposition(format!(
            "V must be {cols}x>=2, got {}x{}",
            svd.v.n_rows(),
            svd.v.n_cols()
        )));
    }
    if svd.s.n_rows() < 2 || svd.s.n_cols() < 2 {
        return Err(SugerirError::Decomposition(format!(
            "S must be at least 2x2, got {}x{}",
            svd.s.n_rows(),
            svd.s.n_cols()
        )));
    }
    Ok(())
}

/// First two columns of a matrix as an n×2 matrix.
fn two_columns(m: &Matrix<f32>) -> Matrix<f32> {
    let mut data = Vec::with_capacity(m.n_rows() * 2);
    for row in 0..m.n_rows() {
        data.push(m.get(row, 0));
        data.push(m.get(row, 1));
    }
    match Matrix::from_vec(m.n_rows(), 2, data) {
        Ok(matrix) => matrix,
        Err(_) => unreachable!("length is rows * 2 by construction"),
    }
}

/// Inverse of a 2×2 matrix. A singular input yields non-finite
/// entries, which downstream cosine handling maps to similarity 0.
fn invert_2x2(a: f32, b: f32, c: f32, d: f32) -> [[f32; 2]; 2] {
    let det = a * d - b * c;
    [[d / det, -b / det], [-c / det, a / det]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Item, Rating};

    const R2: f32 = std::f32::consts::FRAC_1_SQRT_2;
    const S2: f32 = 7.071_067_8;

    /// Two pairs of identical items: 1,2 rated (5,5,0) and 3,4 rated
    /// (0,0,5) over users 1..3.
    fn block_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        for id in 1..=4 {
            catalog.add_item(Item::new(id, format!("I-{id}")));
        }
        let ratings = [
            (1, vec![(1, 5.0), (2, 5.0)]),
            (2, vec![(1, 5.0), (2, 5.0)]),
            (3, vec![(3, 5.0), (4, 5.0)]),
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

    /// Hand-computed thin SVD of the 4×3 item-axis block matrix.
    struct FixedItemAxis;

    impl Decomposition for FixedItemAxis {
        fn decompose(&self, _matrix: &Matrix<f32>) -> Result<Svd> {
            Ok(Svd {
                u: Matrix::from_vec(4, 2, vec![R2, 0.0, R2, 0.0, 0.0, R2, 0.0, R2])
                    .expect("valid"),
                s: Matrix::from_vec(2, 2, vec![10.0, 0.0, 0.0, S2]).expect("valid"),
                v: Matrix::from_vec(3, 2, vec![R2, 0.0, R2, 0.0, 0.0, 1.0]).expect("valid"),
            })
        }
    }

    /// Hand-computed thin SVD of the 3×4 user-axis block matrix.
    struct FixedUserAxis;

    impl Decomposition for FixedUserAxis {
        fn decompose(&self, _matrix: &Matrix<f32>) -> Result<Svd> {
            Ok(Svd {
                u: Matrix::from_vec(3, 2, vec![R2, 0.0, R2, 0.0, 0.0, 1.0]).expect("valid"),
                s: Matrix::from_vec(2, 2, vec![10.0, 0.0, 0.0, S2]).expect("valid"),
                v: Matrix::from_vec(4, 2, vec![R2, 0.0, R2, 0.0, 0.0, R2, 0.0, R2])
                    .expect("valid"),
            })
        }
    }

    #[test]
    fn item_axis_pairs_identical_items_and_drops_orthogonal_ones() {
        let mut engine = SvdKnn::item_based(Box::new(FixedItemAxis));
        engine.set_data(block_catalog());
        engine.precompute(true).expect("precompute succeeds");

        let matrix = engine.matrix().expect("model built");
        assert_eq!(matrix.len(), 4);
        for (entity_id, neighbors) in matrix.iter() {
            assert!(neighbors.iter().all(|n| n.id != entity_id));
        }

        let neighbors = matrix.neighbors(1).expect("item 1 present");
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].id, 2);
        assert_eq!(neighbors[0].similarity, 1.0);

        let neighbors = matrix.neighbors(3).expect("item 3 present");
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].id, 4);
    }

    #[test]
    fn user_axis_pairs_identical_users() {
        let mut engine = SvdKnn::user_based(Box::new(FixedUserAxis));
        engine.set_data(block_catalog());
        engine.precompute(true).expect("precompute succeeds");

        let matrix = engine.matrix().expect("model built");
        let neighbors = matrix.neighbors(1).expect("user 1 present");
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].id, 2);
        assert_eq!(neighbors[0].similarity, 1.0);

        // User 3 is orthogonal to both others.
        assert!(matrix.neighbors(3).expect("user 3 present").is_empty());
    }

    #[test]
    fn never_precomputed_engine_is_unavailable() {
        let mut engine = SvdKnn::item_based(Box::new(FixedItemAxis));
        engine.set_data(block_catalog());

        assert_eq!(engine.predict_rating(1, 3), None);
        assert!(engine.recommendations_for(1, 5).is_none());
    }

    /// Returns zero matrices of the right shapes: the degenerate case
    /// where the reduced S is singular.
    struct ZeroDecomposition;

    impl Decomposition for ZeroDecomposition {
        fn decompose(&self, matrix: &Matrix<f32>) -> Result<Svd> {
            let (rows, cols) = matrix.shape();
            Ok(Svd {
                u: Matrix::zeros(rows, 2),
                s: Matrix::zeros(2, 2),
                v: Matrix::zeros(cols, 2),
            })
        }
    }

    #[test]
    fn singular_reduced_s_yields_empty_neighbor_lists() {
        let mut engine = SvdKnn::item_based(Box::new(ZeroDecomposition));
        engine.set_data(block_catalog());
        engine.precompute(true).expect("precompute succeeds");

        let matrix = engine.matrix().expect("model built");
        assert_eq!(matrix.len(), 4);
        for (_, neighbors) in matrix.iter() {
            assert!(neighbors.is_empty());
        }
    }

    /// Produces a U with a single column, which the engine must reject.
    struct NarrowDecomposition;

    impl Decomposition for NarrowDecomposition {
        fn decompose(&self, matrix: &Matrix<f32>) -> Result<Svd> {
            let (rows, cols) = matrix.shape();
            Ok(Svd {
                u: Matrix::zeros(rows, 1),
                s: Matrix::zeros(2, 2),
                v: Matrix::zeros(cols, 2),
            })
        }
    }

    #[test]
    fn undersized_decomposition_output_is_an_error() {
        let mut engine = SvdKnn::item_based(Box::new(NarrowDecomposition));
        engine.set_data(block_catalog());

        assert!(matches!(
            engine.precompute(true),
            Err(SugerirError::Decomposition(_))
        ));
        assert!(engine.matrix().is_none());
    }

    #[test]
    fn loaded_model_drives_item_aggregation() {
        use std::io::Write as _;

        // A crafted model file: item 2's only neighbor is item 1.
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "1\n2|0.95\n2\n1|0.95").expect("write");
        file.flush().expect("flush");

        let mut engine = SvdKnn::item_based(Box::new(FixedItemAxis))
            .with_model_path(file.path());
        let mut catalog = Catalog::new();
        catalog.add_item(Item::new(1, "A"));
        catalog.add_item(Item::new(2, "B"));
        let mut user = User::new(1, "U-1");
        user.ratings_mut().add(Rating::new(1, 4.0));
        catalog.add_user(user);
        engine.set_data(catalog);

        engine.precompute(false).expect("load succeeds");
        assert_eq!(engine.predict_rating(1, 2), Some(4.0));

        let recommendations = engine.recommendations_for(1, 5).expect("model loaded");
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].item_id, 2);
    }
}
