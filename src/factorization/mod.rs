//! Incremental matrix factorization (gradient-descent latent factors).
//!
//! [`IncrementalSvd`] learns K scalar features per user and per item,
//! one feature index at a time, by regularized gradient descent over
//! every known rating. Each feature trains until its own epoch stop
//! rule fires, then the running per-pair estimate is cached and the
//! next feature trains on top of it.

use crate::catalog::{clamp_rating, Catalog, User};
use crate::error::{Result, SugerirError};
use crate::traits::{Recommendation, Recommender};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Trained latent features: per feature index, an entity id → weight
/// map for users and one for items.
///
/// Supports binary snapshotting so a long training run can be reused
/// across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentFactors {
    user_features: Vec<BTreeMap<u32, f32>>,
    item_features: Vec<BTreeMap<u32, f32>>,
    epoch_rmse: Vec<Vec<f32>>,
}

impl LatentFactors {
    /// Number of trained feature dimensions.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.user_features.len()
    }

    /// Trained weight of `feature` for a user, if known.
    #[must_use]
    pub fn user_feature(&self, feature: usize, user_id: u32) -> Option<f32> {
        self.user_features.get(feature)?.get(&user_id).copied()
    }

    /// Trained weight of `feature` for an item, if known.
    #[must_use]
    pub fn item_feature(&self, feature: usize, item_id: u32) -> Option<f32> {
        self.item_features.get(feature)?.get(&item_id).copied()
    }

    /// Per-feature, per-epoch training RMSE history.
    #[must_use]
    pub fn epoch_rmse(&self) -> &[Vec<f32>] {
        &self.epoch_rmse
    }

    /// Saves the model to a binary file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| SugerirError::Serialization(e.to_string()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Loads a model from a binary file.
    ///
    /// # Errors
    ///
    /// Returns an error if file reading or deserialization fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        bincode::deserialize(&bytes).map_err(|e| SugerirError::Serialization(e.to_string()))
    }
}

/// Latent-factor CF via incremental (feature-at-a-time) factorization.
///
/// Defaults: 10 features seeded at 0.1, learning rate 0.001,
/// regularization 0.015, 50–100 epochs per feature with a 1e-4 RMSE
/// improvement cutoff.
///
/// # Examples
///
/// ```
/// use sugerir::catalog::{Catalog, Item, Rating, User};
/// use sugerir::factorization::IncrementalSvd;
/// use sugerir::traits::Recommender;
///
/// let mut catalog = Catalog::new();
/// catalog.add_item(Item::new(1, "A"));
/// let mut user = User::new(1, "U-1");
/// user.ratings_mut().add(Rating::new(1, 5.0));
/// catalog.add_user(user);
///
/// let mut engine = IncrementalSvd::new().with_n_features(2);
/// engine.set_data(catalog);
/// engine.precompute(true).expect("training succeeds");
///
/// let rating = engine.predict_rating(1, 1).expect("known pair");
/// assert!((1.0..=5.0).contains(&rating));
/// ```
#[derive(Debug)]
pub struct IncrementalSvd {
    n_features: usize,
    feature_init: f32,
    learning_rate: f32,
    regularization: f32,
    min_epochs: usize,
    max_epochs: usize,
    min_improvement: f32,
    catalog: Catalog,
    model: Option<LatentFactors>,
}

impl Default for IncrementalSvd {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalSvd {
    /// Creates an engine with the default hyperparameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_features: 10,
            feature_init: 0.1,
            learning_rate: 0.001,
            regularization: 0.015,
            min_epochs: 50,
            max_epochs: 100,
            min_improvement: 0.0001,
            catalog: Catalog::new(),
            model: None,
        }
    }

    /// Sets the number of latent features.
    #[must_use]
    pub fn with_n_features(mut self, n_features: usize) -> Self {
        self.n_features = n_features;
        self
    }

    /// Sets the gradient-descent learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the regularization constant.
    #[must_use]
    pub fn with_regularization(mut self, regularization: f32) -> Self {
        self.regularization = regularization;
        self
    }

    /// Sets the per-feature epoch bounds (minimum before the
    /// improvement cutoff applies, hard maximum).
    #[must_use]
    pub fn with_epoch_bounds(mut self, min_epochs: usize, max_epochs: usize) -> Self {
        self.min_epochs = min_epochs;
        self.max_epochs = max_epochs;
        self
    }

    /// Sets the RMSE improvement below which training stops.
    #[must_use]
    pub fn with_min_improvement(mut self, min_improvement: f32) -> Self {
        self.min_improvement = min_improvement;
        self
    }

    /// Borrows the trained model, if training has run.
    #[must_use]
    pub fn model(&self) -> Option<&LatentFactors> {
        self.model.as_ref()
    }

    /// Installs a previously trained (e.g. loaded) model.
    pub fn install(&mut self, model: LatentFactors) {
        self.model = Some(model);
    }

    fn validate(&self) -> Result<()> {
        if self.n_features == 0 {
            return Err(SugerirError::InvalidHyperparameter {
                param: "n_features".to_string(),
                value: "0".to_string(),
                constraint: "at least 1".to_string(),
            });
        }
        if self.learning_rate <= 0.0 {
            return Err(SugerirError::InvalidHyperparameter {
                param: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                constraint: "> 0".to_string(),
            });
        }
        if self.max_epochs < self.min_epochs {
            return Err(SugerirError::InvalidHyperparameter {
                param: "max_epochs".to_string(),
                value: self.max_epochs.to_string(),
                constraint: format!(">= min_epochs ({})", self.min_epochs),
            });
        }
        Ok(())
    }

    fn train(&self) -> LatentFactors {
        let k = self.n_features;
        let seed = self.feature_init;

        let mut user_features: Vec<BTreeMap<u32, f32>> = (0..k)
            .map(|_| self.catalog.users().map(|u| (u.id(), seed)).collect())
            .collect();
        let mut item_features: Vec<BTreeMap<u32, f32>> = (0..k)
            .map(|_| self.catalog.items().map(|i| (i.id(), seed)).collect())
            .collect();

        // Running estimate through the already-trained features, keyed
        // by (user, item); 0 stands for "not yet cached".
        let mut cache: BTreeMap<(u32, u32), f32> = BTreeMap::new();
        let mut epoch_rmse: Vec<Vec<f32>> = Vec::with_capacity(k);

        // The RMSE pair deliberately carries across features.
        let mut last_rmse = 2.0_f32;
        let mut rmse = 2.0_f32;

        for feature in 0..k {
            // Number of features above this one still at their seed
            // value; the trailing correction pretends they contribute
            // seed^2 each. For 1-based index i this is K - i - 1, which
            // reaches -1 on the final feature.
            let untrained = k as f32 - feature as f32 - 2.0;

            let mut history = Vec::new();
            let mut epoch = 0;
            while epoch < self.min_epochs || rmse <= last_rmse - self.min_improvement {
                last_rmse = rmse;
                let mut sq_error = 0.0_f32;
                let mut count = 0_usize;

                for user in self.catalog.users() {
                    let user_id = user.id();
                    for (item_id, actual) in user.ratings().iter() {
                        let cached = cache.get(&(user_id, item_id)).copied().unwrap_or(0.0);
                        let uv = user_features[feature][&user_id];
                        let iv = item_features[feature][&item_id];

                        let estimate = partial_estimate(cached, uv, iv, Some(untrained), seed);
                        let error = actual - estimate;
                        sq_error += error * error;

                        let lr = self.learning_rate;
                        let reg = self.regularization;
                        let user_slot = user_features[feature]
                            .get_mut(&user_id)
                            .expect("every catalog user is seeded");
                        *user_slot += lr * (error * iv - reg * uv);
                        let item_slot = item_features[feature]
                            .get_mut(&item_id)
                            .expect("every rated item exists in the catalog");
                        *item_slot += lr * (error * uv - reg * iv);
                        count += 1;
                    }
                }
                if count == 0 {
                    break;
                }

                epoch += 1;
                rmse = (sq_error / count as f32).sqrt();
                history.push(rmse);
                if epoch > self.max_epochs {
                    break;
                }
            }

            // Re-baseline the cache through this feature, without the
            // trailing correction.
            for user in self.catalog.users() {
                let user_id = user.id();
                for (item_id, _) in user.ratings().iter() {
                    let key = (user_id, item_id);
                    let cached = cache.get(&key).copied().unwrap_or(0.0);
                    let uv = user_features[feature][&user_id];
                    let iv = item_features[feature][&item_id];
                    cache.insert(key, partial_estimate(cached, uv, iv, None, seed));
                }
            }

            info!(
                "feature {}/{k} trained in {} epochs (rmse {rmse:.5})",
                feature + 1,
                history.len()
            );
            epoch_rmse.push(history);
        }

        LatentFactors {
            user_features,
            item_features,
            epoch_rmse,
        }
    }
}

/// Running estimate through one more feature: cached baseline (1 when
/// uncached) plus this feature's product, plus the optional trailing
/// correction for untrained features, clamped to the rating scale.
fn partial_estimate(cached: f32, uv: f32, iv: f32, untrained: Option<f32>, seed: f32) -> f32 {
    let mut rating = if cached != 0.0 { cached } else { 1.0 };
    rating += iv * uv;
    if let Some(untrained) = untrained {
        rating += untrained * (seed * seed);
    }
    clamp_rating(rating)
}

impl Recommender for IncrementalSvd {
    fn set_data(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Trains the latent features. `force_recompute` is ignored: this
    /// engine has no similarity matrix to reload, so every precompute
    /// trains from the seeded state.
    fn precompute(&mut self, _force_recompute: bool) -> Result<()> {
        self.validate()?;
        self.model = Some(self.train());
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if called before training completes; querying an
    /// untrained factorization is a programming error, not an
    /// "unavailable" answer.
    fn rating_for(&self, user: &User, item_id: u32) -> Option<f32> {
        let model = self
            .model
            .as_ref()
            .expect("IncrementalSvd queried before precompute; train the engine first");

        let mut rating = 1.0;
        for feature in 0..model.n_features() {
            let iv = model.item_feature(feature, item_id)?;
            let uv = model.user_feature(feature, user.id())?;
            rating = clamp_rating(rating + iv * uv);
        }
        Some(rating)
    }

    /// # Panics
    ///
    /// Panics if called before training completes, like
    /// [`rating_for`](Recommender::rating_for).
    fn recommendations_for(&self, user_id: u32, top_n: usize) -> Option<Vec<Recommendation>> {
        let user = self.catalog.user(user_id)?;
        let mut recommendations = Vec::new();
        for item in self.catalog.items() {
            if user.has_rated(item.id()) {
                continue;
            }
            if let Some(estimate) = self.rating_for(user, item.id()) {
                recommendations.push(Recommendation::new(item.id(), estimate));
            }
        }
        recommendations.sort_by(|a, b| {
            b.estimate
                .total_cmp(&a.estimate)
                .then(a.item_id.cmp(&b.item_id))
        });
        recommendations.truncate(top_n);
        Some(recommendations)
    }
}
