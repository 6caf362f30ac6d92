//! Core traits: the uniform engine contract and injected capabilities.

use crate::catalog::{Catalog, User};
use crate::error::Result;
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};

/// One recommended item with its estimated rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Id of the recommended item.
    pub item_id: u32,
    /// Estimated rating for the active user.
    pub estimate: f32,
}

impl Recommendation {
    /// Creates a recommendation entry.
    #[must_use]
    pub fn new(item_id: u32, estimate: f32) -> Self {
        Self { item_id, estimate }
    }
}

/// Uniform contract implemented by every collaborative-filtering engine.
///
/// Lifecycle: `set_data` hands the engine its read-only catalog,
/// `precompute` builds or loads the model, then `predict_rating` /
/// `recommendations_for` serve queries. Queries against an engine with
/// no model return `None` ("unavailable"), never an error.
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
/// for (id, a, b) in [(1, 5.0, 3.0), (2, 4.0, 2.0), (3, 1.0, 5.0)] {
///     let mut user = User::new(id, format!("U-{id}"));
///     user.ratings_mut().add(Rating::new(1, a));
///     user.ratings_mut().add(Rating::new(2, b));
///     catalog.add_user(user);
/// }
///
/// let mut engine = ItemKnn::new();
/// engine.set_data(catalog);
/// engine.precompute(true).expect("precompute succeeds");
///
/// // An existing rating short-circuits the model entirely.
/// assert_eq!(engine.predict_rating(1, 2), Some(3.0));
/// ```
pub trait Recommender {
    /// Hands the engine the rating catalog it will serve queries from.
    ///
    /// Any previously built model stays in place until the next
    /// [`precompute`](Recommender::precompute).
    fn set_data(&mut self, catalog: Catalog);

    /// Borrows the engine's catalog (empty before `set_data`).
    fn catalog(&self) -> &Catalog;

    /// Builds the model, or reloads a persisted one.
    ///
    /// # Errors
    ///
    /// Propagates model rebuild, persistence, and configuration errors.
    fn precompute(&mut self, force_recompute: bool) -> Result<()>;

    /// Engine-specific rating estimate, ignoring any existing rating.
    ///
    /// Returns `None` when the model is unset, the weighted sums
    /// degenerate to zero, or the entity is unknown.
    fn rating_for(&self, user: &User, item_id: u32) -> Option<f32>;

    /// Ranked recommendations for a user, best estimate first.
    ///
    /// Returns `None` when the model is unset or the user is unknown.
    /// Never contains an item the user already rated.
    fn recommendations_for(&self, user_id: u32, top_n: usize) -> Option<Vec<Recommendation>>;

    /// Predicts the user's rating for an item.
    ///
    /// If the user already rated the item, that literal value is
    /// returned without consulting the model; this short-circuit holds
    /// for every engine regardless of model state.
    fn predict_rating(&self, user_id: u32, item_id: u32) -> Option<f32> {
        let user = self.catalog().user(user_id)?;
        if let Some(rating) = user.rating_for(item_id) {
            return Some(rating);
        }
        self.rating_for(user, item_id)
    }
}

/// Result of a singular value decomposition: `matrix ≈ U·S·Vᵗ`.
#[derive(Debug, Clone, PartialEq)]
pub struct Svd {
    /// Left singular vectors (one row per input row entity).
    pub u: Matrix<f32>,
    /// Diagonal matrix of singular values, descending.
    pub s: Matrix<f32>,
    /// Right singular vectors (one row per input column entity).
    pub v: Matrix<f32>,
}

/// Injected dense-matrix decomposition capability.
///
/// The SVD engines consume this seam; the crate never implements the
/// decomposition itself. Implementations must return singular values
/// in descending order on the diagonal of `s`.
pub trait Decomposition {
    /// Decomposes `matrix` into `U`, `S`, `V` with `matrix ≈ U·S·Vᵗ`.
    ///
    /// # Errors
    ///
    /// Returns an error if the decomposition cannot be computed.
    fn decompose(&self, matrix: &Matrix<f32>) -> Result<Svd>;
}
