//! Sugerir: collaborative filtering recommendation engines in pure Rust.
//!
//! Sugerir predicts a user's rating for an item and ranks unseen items
//! by estimated preference, using interchangeable collaborative
//! filtering strategies over a user–item rating catalog: two
//! neighborhood ("memory-based") engines, an incremental matrix
//! factorization engine, and two decomposition-based engines over a
//! reduced embedding space.
//!
//! # Quick Start
//!
//! ```
//! use sugerir::prelude::*;
//!
//! // Build a catalog: two items, three users.
//! let mut catalog = Catalog::new();
//! catalog.add_item(Item::new(1, "A"));
//! catalog.add_item(Item::new(2, "B"));
//! for (id, a, b) in [(1, 5.0, 3.0), (2, 4.0, 2.0), (3, 1.0, 5.0)] {
//!     let mut user = User::new(id, format!("U-{id}"));
//!     user.ratings_mut().add(Rating::new(1, a));
//!     user.ratings_mut().add(Rating::new(2, b));
//!     catalog.add_user(user);
//! }
//!
//! // Select an engine, hand it the data, build the model, query.
//! let mut engine = recommender_for(MethodType::MemoryBased, Algorithm::ItemBased, None)
//!     .expect("supported selection");
//! engine.set_data(catalog);
//! engine.precompute(true).expect("model builds");
//!
//! // A user's existing rating short-circuits the model.
//! assert_eq!(engine.predict_rating(1, 2), Some(3.0));
//! ```
//!
//! # Modules
//!
//! - [`catalog`]: Users, items, and per-user rating lists
//! - [`similarity`]: Pairwise similarity metrics (Euclidean, Pearson, Jaccard)
//! - [`model`]: Similarity-matrix model, persistence, precompute-or-load
//! - [`neighborhood`]: Item-based and user-based memory CF engines
//! - [`factorization`]: Incremental matrix factorization engine
//! - [`svd`]: Decomposition-based CF over a reduced embedding space
//! - [`factory`]: Engine selection surface (method type × algorithm)
//! - [`primitives`]: Dense Matrix and Vector compute types
//! - [`traits`]: The uniform engine contract and injected capabilities
//! - [`error`]: Error enum and `Result` alias

pub mod catalog;
pub mod error;
pub mod factorization;
pub mod factory;
pub mod model;
pub mod neighborhood;
pub mod prelude;
pub mod primitives;
pub mod similarity;
pub mod svd;
pub mod traits;

pub use error::{Result, SugerirError};
pub use traits::{Decomposition, Recommender};
