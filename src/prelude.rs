//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use sugerir::prelude::*;
//! ```

pub use crate::catalog::{Catalog, Item, Rating, RatingList, User};
pub use crate::error::{Result, SugerirError};
pub use crate::factorization::{IncrementalSvd, LatentFactors};
pub use crate::factory::{recommender_for, Algorithm, MethodType};
pub use crate::model::{Neighbor, SimilarityMatrix};
pub use crate::neighborhood::{ItemKnn, UserKnn};
pub use crate::primitives::{Matrix, Vector};
pub use crate::similarity::SimilarityMethod;
pub use crate::svd::{EntityKind, SvdKnn};
pub use crate::traits::{Decomposition, Recommendation, Recommender, Svd};
