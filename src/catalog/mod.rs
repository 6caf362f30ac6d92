//! Rating catalog: users, items, and per-user rating lists.
//!
//! Pure data holders shared by every engine. A [`Catalog`] is built
//! once and treated as read-only for the lifetime of a session; every
//! mapping is id-keyed and iterates in ascending id order, which the
//! engines rely on for deterministic accumulation and tie-breaking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lower bound of the rating scale.
pub const RATING_MIN: f32 = 1.0;

/// Upper bound of the rating scale.
pub const RATING_MAX: f32 = 5.0;

/// Clamps a predicted rating into the `[RATING_MIN, RATING_MAX]` scale.
#[must_use]
pub fn clamp_rating(value: f32) -> f32 {
    value.clamp(RATING_MIN, RATING_MAX)
}

/// An item that users rate.
///
/// # Examples
///
/// ```
/// use sugerir::catalog::Item;
///
/// let item = Item::new(1, "Twelve Monkeys");
/// assert_eq!(item.id(), 1);
/// assert_eq!(item.name(), "Twelve Monkeys");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: u32,
    name: String,
}

impl Item {
    /// Creates a new item.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns the item id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the item name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A single rating a user gave to an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// Id of the rated item.
    pub item_id: u32,
    /// Rating value on the `[RATING_MIN, RATING_MAX]` scale.
    pub value: f32,
}

impl Rating {
    /// Creates a new rating.
    #[must_use]
    pub fn new(item_id: u32, value: f32) -> Self {
        Self { item_id, value }
    }
}

/// A user's ratings, keyed by item id.
///
/// Unique per item: adding a second rating for the same item replaces
/// the first. Iteration is in ascending item-id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingList {
    ratings: BTreeMap<u32, f32>,
}

impl RatingList {
    /// Creates an empty rating list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rating, replacing any existing rating for the same item.
    pub fn add(&mut self, rating: Rating) {
        self.ratings.insert(rating.item_id, rating.value);
    }

    /// Returns the rating value for an item, if present.
    #[must_use]
    pub fn rating_for(&self, item_id: u32) -> Option<f32> {
        self.ratings.get(&item_id).copied()
    }

    /// Returns true if the list contains a rating for the item.
    #[must_use]
    pub fn contains(&self, item_id: u32) -> bool {
        self.ratings.contains_key(&item_id)
    }

    /// Number of ratings in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    /// Returns true if the list holds no ratings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Iterates over `(item_id, value)` pairs in ascending item-id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.ratings.iter().map(|(&id, &value)| (id, value))
    }

    /// Borrows the underlying id → rating map.
    ///
    /// Similarity metrics consume this representation directly.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<u32, f32> {
        &self.ratings
    }
}

/// A user with an owned, mutable rating list.
///
/// # Examples
///
/// ```
/// use sugerir::catalog::{Rating, User};
///
/// let mut user = User::new(7, "U-7");
/// user.ratings_mut().add(Rating::new(1, 4.0));
/// assert_eq!(user.rating_for(1), Some(4.0));
/// assert!(user.has_rated(1));
/// assert!(!user.has_rated(2));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: u32,
    name: String,
    ratings: RatingList,
}

impl User {
    /// Creates a new user with an empty rating list.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ratings: RatingList::new(),
        }
    }

    /// Returns the user id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the user name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrows the user's rating list.
    #[must_use]
    pub fn ratings(&self) -> &RatingList {
        &self.ratings
    }

    /// Mutably borrows the user's rating list.
    pub fn ratings_mut(&mut self) -> &mut RatingList {
        &mut self.ratings
    }

    /// Returns the rating this user gave an item, if any.
    #[must_use]
    pub fn rating_for(&self, item_id: u32) -> Option<f32> {
        self.ratings.rating_for(item_id)
    }

    /// Returns true if this user rated the item.
    #[must_use]
    pub fn has_rated(&self, item_id: u32) -> bool {
        self.ratings.contains(item_id)
    }
}

/// The full user–item rating dataset consumed by every engine.
///
/// Built once by the host, read-only afterwards. Engines assume every
/// rated item id exists in `items` (caller's responsibility).
///
/// # Examples
///
/// ```
/// use sugerir::catalog::{Catalog, Item, Rating, User};
///
/// let mut catalog = Catalog::new();
/// catalog.add_item(Item::new(1, "Heat"));
/// let mut user = User::new(1, "U-1");
/// user.ratings_mut().add(Rating::new(1, 5.0));
/// catalog.add_user(user);
///
/// assert_eq!(catalog.n_users(), 1);
/// assert_eq!(catalog.n_items(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    users: BTreeMap<u32, User>,
    items: BTreeMap<u32, Item>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, replacing any user with the same id.
    pub fn add_user(&mut self, user: User) {
        self.users.insert(user.id(), user);
    }

    /// Adds an item, replacing any item with the same id.
    pub fn add_item(&mut self, item: Item) {
        self.items.insert(item.id(), item);
    }

    /// Looks up a user by id.
    #[must_use]
    pub fn user(&self, id: u32) -> Option<&User> {
        self.users.get(&id)
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn item(&self, id: u32) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Iterates users in ascending id order.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Iterates items in ascending id order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Number of users.
    #[must_use]
    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    /// Number of items.
    #[must_use]
    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Total number of ratings across all users.
    #[must_use]
    pub fn n_ratings(&self) -> usize {
        self.users.values().map(|u| u.ratings().len()).sum()
    }
}
