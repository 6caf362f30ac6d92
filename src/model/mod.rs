//! Similarity-matrix model and its precompute-or-load lifecycle.
//!
//! [`ModelStore`] is the shared persistence helper behind every
//! matrix-building engine: it owns the optional model file path, the
//! rebuild-then-save orchestration, and the line-oriented model file
//! format. Engines plug in through a narrow rebuild closure instead of
//! inheriting from a base class.
//!
//! # Model file format
//!
//! ```text
//! <entity_id>
//! <neighbor_id>|<similarity>
//! <neighbor_id>|<similarity>
//! <entity_id_2>
//! ...
//! ```
//!
//! A line with a single field opens a new entity's neighbor block; a
//! block may be empty. Similarities are written with 5-decimal
//! precision (see [`crate::similarity::round5`]), so a reloaded model
//! compares equal to the persisted one.

use crate::error::{Result, SugerirError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One entry in an entity's ranked neighbor list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Id of the similar entity.
    pub id: u32,
    /// Similarity score, rounded to 5 decimal digits.
    pub similarity: f32,
}

impl Neighbor {
    /// Creates a neighbor entry.
    #[must_use]
    pub fn new(id: u32, similarity: f32) -> Self {
        Self { id, similarity }
    }
}

/// Per-entity ranked neighbor lists, keyed by entity id.
///
/// Lists are ordered descending by similarity and never contain the
/// entity itself. Produced only by an engine's precompute; immutable
/// while queries run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    entries: BTreeMap<u32, Vec<Neighbor>>,
}

impl SimilarityMatrix {
    /// Creates an empty matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the neighbor list for an entity.
    pub fn insert(&mut self, entity_id: u32, neighbors: Vec<Neighbor>) {
        self.entries.insert(entity_id, neighbors);
    }

    /// Returns the neighbor list for an entity, if present.
    #[must_use]
    pub fn neighbors(&self, entity_id: u32) -> Option<&[Neighbor]> {
        self.entries.get(&entity_id).map(Vec::as_slice)
    }

    /// Iterates `(entity_id, neighbors)` in ascending entity-id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[Neighbor])> {
        self.entries.iter().map(|(&id, v)| (id, v.as_slice()))
    }

    /// Number of entities with a stored neighbor list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entity has a stored list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Precompute-or-load orchestration shared by matrix-building engines.
///
/// Holds the optional model file path, whether recomputed models are
/// saved back to it, and the model itself once built or loaded.
#[derive(Debug, Default)]
pub struct ModelStore {
    path: Option<PathBuf>,
    save_enabled: bool,
    matrix: Option<SimilarityMatrix>,
}

impl ModelStore {
    /// Creates a store with no path and persistence disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model file path.
    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    /// Enables or disables saving after a recompute.
    pub fn set_save_enabled(&mut self, enabled: bool) {
        self.save_enabled = enabled;
    }

    /// Returns the model, if one has been built or loaded.
    #[must_use]
    pub fn matrix(&self) -> Option<&SimilarityMatrix> {
        self.matrix.as_ref()
    }

    /// Returns true once a model is available for queries.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.matrix.is_some()
    }

    /// Installs a freshly built model.
    pub fn install(&mut self, matrix: SimilarityMatrix) {
        self.matrix = Some(matrix);
    }

    /// Builds or loads the model.
    ///
    /// With `force_recompute` the `rebuild` closure runs and its result
    /// is installed, then persisted when saving is enabled. Without it,
    /// the model is loaded from the configured path; if no path is
    /// configured this is a no-op and the model stays unset.
    ///
    /// # Errors
    ///
    /// Propagates rebuild, I/O, and parse errors. A failed load leaves
    /// the model unset.
    pub fn precompute<F>(&mut self, force_recompute: bool, rebuild: F) -> Result<()>
    where
        F: FnOnce() -> Result<SimilarityMatrix>,
    {
        if force_recompute {
            self.matrix = Some(rebuild()?);
            if self.save_enabled {
                self.persist()?;
            }
        } else if self.path.is_some() {
            self.load()?;
        }
        Ok(())
    }

    /// Writes the model to the configured path in the line format.
    ///
    /// A store with no model writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SugerirError::MissingModelPath`] if no path is
    /// configured, or an I/O error from writing.
    pub fn persist(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or(SugerirError::MissingModelPath)?;
        let Some(matrix) = self.matrix.as_ref() else {
            return Ok(());
        };
        write_matrix(path, matrix)
    }

    /// Loads the model from the configured path, replacing any model.
    ///
    /// # Errors
    ///
    /// Returns [`SugerirError::MissingModelPath`] if no path is
    /// configured, an I/O error from reading, or
    /// [`SugerirError::MalformedModel`] on a non-conforming file (the
    /// model is left unset in that case).
    pub fn load(&mut self) -> Result<()> {
        let path = self.path.as_deref().ok_or(SugerirError::MissingModelPath)?;
        self.matrix = None;
        self.matrix = Some(read_matrix(path)?);
        Ok(())
    }
}

fn write_matrix(path: &Path, matrix: &SimilarityMatrix) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (entity_id, neighbors) in matrix.iter() {
        writeln!(writer, "{entity_id}")?;
        for neighbor in neighbors {
            writeln!(writer, "{}|{}", neighbor.id, neighbor.similarity)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_matrix(path: &Path) -> Result<SimilarityMatrix> {
    let reader = BufReader::new(File::open(path)?);
    let mut matrix = SimilarityMatrix::new();
    let mut current: Option<(u32, Vec<Neighbor>)> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = index + 1;
        let mut fields = line.split('|');
        let first = fields.next().unwrap_or("");
        match (fields.next(), fields.next()) {
            (None, _) => {
                let entity_id = parse_id(first, lineno)?;
                if let Some((id, neighbors)) = current.take() {
                    matrix.insert(id, neighbors);
                }
                current = Some((entity_id, Vec::new()));
            }
            (Some(second), None) => {
                let Some((_, neighbors)) = current.as_mut() else {
                    return Err(malformed(lineno, "neighbor line before any entity header"));
                };
                let id = parse_id(first, lineno)?;
                let similarity: f32 = second
                    .parse()
                    .map_err(|_| malformed(lineno, "similarity is not a number"))?;
                if !similarity.is_finite() {
                    return Err(malformed(lineno, "similarity is not finite"));
                }
                neighbors.push(Neighbor::new(id, similarity));
            }
            (Some(_), Some(_)) => {
                return Err(malformed(lineno, "expected <id> or <id>|<similarity>"));
            }
        }
    }
    if let Some((id, neighbors)) = current.take() {
        matrix.insert(id, neighbors);
    }
    Ok(matrix)
}

fn parse_id(field: &str, lineno: usize) -> Result<u32> {
    field
        .parse()
        .map_err(|_| malformed(lineno, "entity id is not an integer"))
}

fn malformed(line: usize, message: &str) -> SugerirError {
    SugerirError::MalformedModel {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::round5;
    use proptest::prelude::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn sample_matrix() -> SimilarityMatrix {
        let mut matrix = SimilarityMatrix::new();
        matrix.insert(
            1,
            vec![Neighbor::new(3, 0.97561), Neighbor::new(2, 0.04762)],
        );
        matrix.insert(2, vec![]);
        matrix.insert(5, vec![Neighbor::new(1, 1.0)]);
        matrix
    }

    fn store_with_path(path: &Path) -> ModelStore {
        let mut store = ModelStore::new();
        store.set_path(Some(path.to_path_buf()));
        store
    }

    #[test]
    fn round_trip_preserves_ids_order_and_values() {
        let file = NamedTempFile::new().expect("temp file");
        let mut store = store_with_path(file.path());
        store.install(sample_matrix());
        store.persist().expect("persist succeeds");

        let mut reloaded = store_with_path(file.path());
        reloaded.load().expect("load succeeds");

        assert_eq!(reloaded.matrix(), Some(&sample_matrix()));
    }

    #[test]
    fn empty_neighbor_blocks_round_trip() {
        let file = NamedTempFile::new().expect("temp file");
        let mut matrix = SimilarityMatrix::new();
        matrix.insert(7, vec![]);
        matrix.insert(8, vec![]);

        let mut store = store_with_path(file.path());
        store.install(matrix.clone());
        store.persist().expect("persist succeeds");

        let mut reloaded = store_with_path(file.path());
        reloaded.load().expect("load succeeds");
        assert_eq!(reloaded.matrix(), Some(&matrix));
    }

    #[test]
    fn persist_without_path_is_an_explicit_error() {
        let mut store = ModelStore::new();
        store.install(sample_matrix());

        assert!(matches!(
            store.persist(),
            Err(SugerirError::MissingModelPath)
        ));
        assert!(matches!(store.load(), Err(SugerirError::MissingModelPath)));
    }

    #[test]
    fn precompute_without_path_or_force_leaves_model_unset() {
        let mut store = ModelStore::new();
        store
            .precompute(false, || Ok(sample_matrix()))
            .expect("no-op precompute succeeds");
        assert!(!store.is_ready());
    }

    #[test]
    fn precompute_with_force_installs_and_saves() {
        let file = NamedTempFile::new().expect("temp file");
        let mut store = store_with_path(file.path());
        store.set_save_enabled(true);
        store
            .precompute(true, || Ok(sample_matrix()))
            .expect("precompute succeeds");
        assert!(store.is_ready());

        let mut reloaded = store_with_path(file.path());
        reloaded.load().expect("saved file loads");
        assert_eq!(reloaded.matrix(), Some(&sample_matrix()));
    }

    #[test]
    fn precompute_save_enabled_without_path_surfaces_misconfiguration() {
        let mut store = ModelStore::new();
        store.set_save_enabled(true);
        assert!(matches!(
            store.precompute(true, || Ok(sample_matrix())),
            Err(SugerirError::MissingModelPath)
        ));
    }

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file.flush().expect("flush");
        file
    }

    #[test]
    fn loader_rejects_neighbor_before_header() {
        let file = write_temp("2|0.5\n");
        let mut store = store_with_path(file.path());
        let err = store.load().expect_err("must fail");
        assert!(matches!(err, SugerirError::MalformedModel { line: 1, .. }));
        assert!(!store.is_ready());
    }

    #[test]
    fn loader_rejects_garbage_fields() {
        for content in ["abc\n", "1\nx|0.5\n", "1\n2|high\n", "1\n2|0.5|junk\n"] {
            let file = write_temp(content);
            let mut store = store_with_path(file.path());
            assert!(
                matches!(store.load(), Err(SugerirError::MalformedModel { .. })),
                "accepted: {content:?}"
            );
        }
    }

    #[test]
    fn loader_rejects_non_finite_similarity() {
        let file = write_temp("1\n2|NaN\n");
        let mut store = store_with_path(file.path());
        assert!(matches!(
            store.load(),
            Err(SugerirError::MalformedModel { line: 2, .. })
        ));
    }

    proptest! {
        #[test]
        fn round_trip_is_lossless_for_five_decimal_values(
            raw in proptest::collection::vec((1u32..1000, -100_000i32..=100_000), 0..30)
        ) {
            let mut matrix = SimilarityMatrix::new();
            let mut neighbors = Vec::new();
            let mut seen = std::collections::BTreeSet::new();
            for (id, scaled) in raw {
                if seen.insert(id) {
                    neighbors.push(Neighbor::new(id, round5(scaled as f32 / 100_000.0)));
                }
            }
            matrix.insert(42, neighbors);

            let file = NamedTempFile::new().expect("temp file");
            let mut store = store_with_path(file.path());
            store.install(matrix.clone());
            store.persist().expect("persist succeeds");

            let mut reloaded = store_with_path(file.path());
            reloaded.load().expect("load succeeds");
            prop_assert_eq!(reloaded.matrix(), Some(&matrix));
        }
    }
}
