//! Engine selection surface: method type × algorithm.
//!
//! Two closed enums select exactly one of the five concrete engines.
//! Invalid pairings are hard errors, not silent no-engines.

use crate::error::{Result, SugerirError};
use crate::factorization::IncrementalSvd;
use crate::neighborhood::{ItemKnn, UserKnn};
use crate::svd::SvdKnn;
use crate::traits::{Decomposition, Recommender};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad family of collaborative filtering approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodType {
    /// Neighborhood methods computed directly from the rating data.
    MemoryBased,
    /// Methods that first learn a model (decomposition or factors).
    ModelBased,
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodType::MemoryBased => write!(f, "memory_based"),
            MethodType::ModelBased => write!(f, "model_based"),
        }
    }
}

/// Concrete algorithm within a method type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Item-based memory CF ([`ItemKnn`]).
    ItemBased,
    /// User-based memory CF ([`UserKnn`]).
    UserBased,
    /// Decomposition-based item CF ([`SvdKnn`]).
    SvdItemBased,
    /// Decomposition-based user CF ([`SvdKnn`]).
    SvdUserBased,
    /// Incremental matrix factorization ([`IncrementalSvd`]).
    SvdIncremental,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::ItemBased => write!(f, "item_based"),
            Algorithm::UserBased => write!(f, "user_based"),
            Algorithm::SvdItemBased => write!(f, "svd_item_based"),
            Algorithm::SvdUserBased => write!(f, "svd_user_based"),
            Algorithm::SvdIncremental => write!(f, "svd_incremental"),
        }
    }
}

/// Builds the engine selected by a `(method, algorithm)` pair.
///
/// The SVD-projection algorithms consume the injected `decomposition`;
/// the other engines ignore it.
///
/// # Errors
///
/// Returns [`SugerirError::UnsupportedAlgorithm`] for a pairing that
/// selects no engine, and [`SugerirError::InvalidHyperparameter`] when
/// an SVD-projection algorithm is requested without a decomposition.
///
/// # Examples
///
/// ```
/// use sugerir::factory::{recommender_for, Algorithm, MethodType};
///
/// let engine = recommender_for(MethodType::MemoryBased, Algorithm::ItemBased, None);
/// assert!(engine.is_ok());
///
/// let engine = recommender_for(MethodType::MemoryBased, Algorithm::SvdIncremental, None);
/// assert!(engine.is_err());
/// ```
pub fn recommender_for(
    method: MethodType,
    algorithm: Algorithm,
    decomposition: Option<Box<dyn Decomposition>>,
) -> Result<Box<dyn Recommender>> {
    match (method, algorithm) {
        (MethodType::MemoryBased, Algorithm::ItemBased) => Ok(Box::new(ItemKnn::new())),
        (MethodType::MemoryBased, Algorithm::UserBased) => Ok(Box::new(UserKnn::new())),
        (MethodType::ModelBased, Algorithm::SvdItemBased) => {
            let decomposition = require_decomposition(decomposition)?;
            Ok(Box::new(SvdKnn::item_based(decomposition)))
        }
        (MethodType::ModelBased, Algorithm::SvdUserBased) => {
            let decomposition = require_decomposition(decomposition)?;
            Ok(Box::new(SvdKnn::user_based(decomposition)))
        }
        (MethodType::ModelBased, Algorithm::SvdIncremental) => {
            Ok(Box::new(IncrementalSvd::new()))
        }
        (method, algorithm) => Err(SugerirError::UnsupportedAlgorithm {
            method: method.to_string(),
            algorithm: algorithm.to_string(),
        }),
    }
}

fn require_decomposition(
    decomposition: Option<Box<dyn Decomposition>>,
) -> Result<Box<dyn Decomposition>> {
    decomposition.ok_or_else(|| SugerirError::InvalidHyperparameter {
        param: "decomposition".to_string(),
        value: "none".to_string(),
        constraint: "required for SVD-projection algorithms".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Matrix;
    use crate::traits::Svd;

    struct StubDecomposition;

    impl Decomposition for StubDecomposition {
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
    fn all_five_valid_pairs_build() {
        assert!(recommender_for(MethodType::MemoryBased, Algorithm::ItemBased, None).is_ok());
        assert!(recommender_for(MethodType::MemoryBased, Algorithm::UserBased, None).is_ok());
        assert!(recommender_for(MethodType::ModelBased, Algorithm::SvdIncremental, None).is_ok());
        assert!(recommender_for(
            MethodType::ModelBased,
            Algorithm::SvdItemBased,
            Some(Box::new(StubDecomposition))
        )
        .is_ok());
        assert!(recommender_for(
            MethodType::ModelBased,
            Algorithm::SvdUserBased,
            Some(Box::new(StubDecomposition))
        )
        .is_ok());
    }

    #[test]
    fn cross_pairings_are_hard_errors() {
        for algorithm in [
            Algorithm::SvdItemBased,
            Algorithm::SvdUserBased,
            Algorithm::SvdIncremental,
        ] {
            assert!(matches!(
                recommender_for(MethodType::MemoryBased, algorithm, None),
                Err(SugerirError::UnsupportedAlgorithm { .. })
            ));
        }
        for algorithm in [Algorithm::ItemBased, Algorithm::UserBased] {
            assert!(matches!(
                recommender_for(MethodType::ModelBased, algorithm, None),
                Err(SugerirError::UnsupportedAlgorithm { .. })
            ));
        }
    }

    #[test]
    fn svd_projection_without_decomposition_is_rejected() {
        assert!(matches!(
            recommender_for(MethodType::ModelBased, Algorithm::SvdItemBased, None),
            Err(SugerirError::InvalidHyperparameter { .. })
        ));
    }

    #[test]
    fn axis_names_match_the_selection_surface() {
        assert_eq!(MethodType::MemoryBased.to_string(), "memory_based");
        assert_eq!(Algorithm::SvdUserBased.to_string(), "svd_user_based");
    }
}
