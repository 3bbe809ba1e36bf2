//! Combines the selected priority sources into one mapping.
//!
//! Every source is merged with the same rule: a key keeps the lowest priority
//! any source gave it. The final mapping therefore does not depend on the
//! order sources are processed in.

use crate::error::SieveError;
use crate::morph::{Evaluation, MorphKey, PriorityMap};
use crate::parallel::{load_files, ParallelConfig};
use crate::priority_file::{assign_priority_if_lower, PriorityFileReader};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Selection token for priorities computed from the card collection itself.
pub const COLLECTION_FREQUENCY_OPTION: &str = "Collection frequency";

/// Selection token meaning "no priority source".
pub const NONE_OPTION: &str = "(none)";

/// Source of priorities derived from the user's collection.
pub trait CollectionPriorities {
    fn morph_priorities_from_collection(
        &self,
        only_lemma_priorities: bool,
    ) -> Result<PriorityMap, SieveError>;
}

impl CollectionPriorities for PriorityMap {
    fn morph_priorities_from_collection(
        &self,
        only_lemma_priorities: bool,
    ) -> Result<PriorityMap, SieveError> {
        if only_lemma_priorities {
            return Ok(lemma_priorities(self));
        }
        Ok(self.clone())
    }
}

/// Used when no collection is available; selecting it is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollection;

impl CollectionPriorities for NoCollection {
    fn morph_priorities_from_collection(
        &self,
        _only_lemma_priorities: bool,
    ) -> Result<PriorityMap, SieveError> {
        Err(SieveError::CollectionUnavailable)
    }
}

/// Re-keys a mapping by lemma, keeping the lowest priority per lemma and reading.
pub fn lemma_priorities(priorities: &PriorityMap) -> PriorityMap {
    let mut lemmas = PriorityMap::new();
    for (key, &priority) in priorities {
        assign_priority_if_lower(
            &mut lemmas,
            MorphKey::lemma_only(key.lemma.clone(), key.reading.clone()),
            priority,
        );
    }
    lemmas
}

/// One or many selection tokens; configs written by older versions hold a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrioritySelection {
    Single(String),
    Many(Vec<String>),
}

impl Default for PrioritySelection {
    fn default() -> Self {
        PrioritySelection::Many(Vec::new())
    }
}

impl From<&str> for PrioritySelection {
    fn from(token: &str) -> Self {
        PrioritySelection::Single(token.to_string())
    }
}

impl From<String> for PrioritySelection {
    fn from(token: String) -> Self {
        PrioritySelection::Single(token)
    }
}

impl From<Vec<String>> for PrioritySelection {
    fn from(tokens: Vec<String>) -> Self {
        PrioritySelection::Many(tokens)
    }
}

impl From<&[&str]> for PrioritySelection {
    fn from(tokens: &[&str]) -> Self {
        PrioritySelection::Many(tokens.iter().map(|t| t.to_string()).collect())
    }
}

impl PrioritySelection {
    /// Trimmed, non-empty, deduplicated tokens in first-seen order, without `(none)`.
    pub fn normalized(&self) -> Vec<String> {
        let candidates: &[String] = match self {
            PrioritySelection::Single(token) => std::slice::from_ref(token),
            PrioritySelection::Many(tokens) => tokens,
        };

        let mut seen = HashSet::new();
        candidates
            .iter()
            .map(|candidate| candidate.trim())
            .filter(|selection| !selection.is_empty() && *selection != NONE_OPTION)
            .filter(|selection| seen.insert(selection.to_string()))
            .map(str::to_string)
            .collect()
    }
}

/// Merges `source` into `target`, keeping the lower priority on conflicts.
pub fn merge_priorities(target: &mut PriorityMap, source: PriorityMap) {
    for (key, priority) in source {
        assign_priority_if_lower(target, key, priority);
    }
}

/// Builds the canonical priority mapping from a selection.
pub struct PriorityMerger<'a> {
    files: &'a PriorityFileReader,
    priority_files_dir: PathBuf,
    collection: &'a dyn CollectionPriorities,
    parallel: ParallelConfig,
}

impl<'a> PriorityMerger<'a> {
    pub fn new(
        files: &'a PriorityFileReader,
        priority_files_dir: impl Into<PathBuf>,
        collection: &'a dyn CollectionPriorities,
    ) -> Self {
        Self {
            files,
            priority_files_dir: priority_files_dir.into(),
            collection,
            parallel: ParallelConfig::sequential(),
        }
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn priority_files_dir(&self) -> &Path {
        &self.priority_files_dir
    }

    /// Merges the collection pseudo-source (when selected) and every selected file.
    ///
    /// The first failing source aborts the merge; its error is returned unchanged.
    pub fn get_morph_priority(
        &self,
        evaluation: Evaluation,
        selection: &PrioritySelection,
    ) -> Result<PriorityMap, SieveError> {
        let selections = selection.normalized();
        let mut merged = PriorityMap::new();

        if selections.iter().any(|s| s == COLLECTION_FREQUENCY_OPTION) {
            let collection = self
                .collection
                .morph_priorities_from_collection(evaluation.only_lemma_priorities())?;
            debug!(entries = collection.len(), "merging collection frequencies");
            merge_priorities(&mut merged, collection);
        }

        let paths: Vec<PathBuf> = selections
            .iter()
            .filter(|s| s.as_str() != COLLECTION_FREQUENCY_OPTION)
            .map(|name| self.priority_files_dir.join(name))
            .collect();

        for loaded in load_files(self.files, &paths, evaluation, &self.parallel) {
            let priorities = loaded?;
            merge_priorities(&mut merged, priorities);
        }

        info!(
            sources = selections.len(),
            entries = merged.len(),
            ?evaluation,
            "merged morph priorities"
        );
        Ok(merged)
    }
}

/// Names of the `.csv` files in `dir`, sorted.
pub fn list_priority_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PriorityFileError;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn key(lemma: &str) -> MorphKey {
        MorphKey::lemma_only(lemma, "")
    }

    fn priority_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    // ─────────────────────────────────────────────────────────────
    // Selection normalization
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn single_token_selection() {
        let selection = PrioritySelection::from(" news.csv ");
        assert_eq!(selection.normalized(), vec!["news.csv"]);
    }

    #[test]
    fn selection_drops_empty_none_and_duplicates() {
        let selection = PrioritySelection::from(
            &["b.csv", "", "  ", NONE_OPTION, "a.csv", " b.csv", "a.csv"][..],
        );
        assert_eq!(selection.normalized(), vec!["b.csv", "a.csv"]);
    }

    #[test]
    fn none_only_selection_is_empty() {
        assert!(PrioritySelection::from(NONE_OPTION).normalized().is_empty());
    }

    // ─────────────────────────────────────────────────────────────
    // Merge rule
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn merge_keeps_lowest_priority() {
        let mut target = PriorityMap::from([(key("a"), 5), (key("b"), 1)]);
        merge_priorities(
            &mut target,
            PriorityMap::from([(key("a"), 2), (key("b"), 3), (key("c"), 9)]),
        );
        assert_eq!(target, PriorityMap::from([(key("a"), 2), (key("b"), 1), (key("c"), 9)]));
    }

    fn priority_map() -> impl Strategy<Value = PriorityMap> {
        proptest::collection::hash_map("[a-h]", 0i64..100, 0..4)
            .prop_map(|m| m.into_iter().map(|(l, p)| (key(&l), p)).collect())
    }

    proptest! {
        #[test]
        fn merged_value_is_min_over_sources(a in priority_map(), b in priority_map()) {
            let mut merged = PriorityMap::new();
            merge_priorities(&mut merged, a.clone());
            merge_priorities(&mut merged, b.clone());

            for k in a.keys().chain(b.keys()) {
                let expected = a.get(k).copied().unwrap_or(i64::MAX)
                    .min(b.get(k).copied().unwrap_or(i64::MAX));
                prop_assert_eq!(merged[k], expected);
            }
            prop_assert!(merged.keys().all(|k| a.contains_key(k) || b.contains_key(k)));
        }

        #[test]
        fn merge_is_order_independent(a in priority_map(), b in priority_map()) {
            let mut ab = PriorityMap::new();
            merge_priorities(&mut ab, a.clone());
            merge_priorities(&mut ab, b.clone());

            let mut ba = PriorityMap::new();
            merge_priorities(&mut ba, b);
            merge_priorities(&mut ba, a);

            prop_assert_eq!(ab, ba);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Merger
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn merges_files_and_collection() {
        let dir = priority_dir(&[
            ("first.csv", "Lemma\na\nb\nc\n"),
            ("second.csv", "Lemma\nc\nd\n"),
        ]);
        let collection = PriorityMap::from([(MorphKey::new("b", "bs", ""), 0), (key("e"), 7)]);
        let reader = PriorityFileReader::default();
        let merger = PriorityMerger::new(&reader, dir.path(), &collection);
        assert_eq!(merger.priority_files_dir(), dir.path());

        let merged = merger
            .get_morph_priority(
                Evaluation::Lemma,
                &PrioritySelection::from(
                    &["first.csv", COLLECTION_FREQUENCY_OPTION, "second.csv"][..],
                ),
            )
            .unwrap();

        assert_eq!(
            merged,
            PriorityMap::from([
                (key("a"), 0),
                (key("b"), 0),
                (key("c"), 0),
                (key("d"), 1),
                (key("e"), 7),
            ])
        );
    }

    #[test]
    fn file_order_does_not_change_result() {
        let dir = priority_dir(&[
            ("x.csv", "Lemma\na\nb\n"),
            ("y.csv", "Lemma\nb\na\n"),
        ]);
        let reader = PriorityFileReader::default();
        let merger = PriorityMerger::new(&reader, dir.path(), &NoCollection);

        let select = |names: &[&str]| {
            merger
                .get_morph_priority(Evaluation::Lemma, &PrioritySelection::from(names))
                .unwrap()
        };
        let xy = select(&["x.csv", "y.csv"]);
        let yx = select(&["y.csv", "x.csv"]);
        assert_eq!(xy, yx);
        assert_eq!(xy[&key("a")], 0);
        assert_eq!(xy[&key("b")], 0);
    }

    #[test]
    fn empty_selection_gives_empty_mapping() {
        let reader = PriorityFileReader::default();
        let merger = PriorityMerger::new(&reader, "unused", &NoCollection);
        let merged = merger
            .get_morph_priority(Evaluation::Inflection, &PrioritySelection::default())
            .unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn missing_file_propagates_not_found() {
        let dir = priority_dir(&[("ok.csv", "Lemma\na\n")]);
        let reader = PriorityFileReader::default();
        let merger = PriorityMerger::new(&reader, dir.path(), &NoCollection);

        let selection = PrioritySelection::from(&["ok.csv", "gone.csv"][..]);
        let err = merger
            .get_morph_priority(Evaluation::Lemma, &selection)
            .unwrap_err();
        assert!(matches!(
            err,
            SieveError::PriorityFile(PriorityFileError::NotFound { .. })
        ));
    }

    #[test]
    fn incompatible_file_propagates_malformed() {
        let dir = priority_dir(&[("minimal.csv", "Lemma\na\n")]);
        let reader = PriorityFileReader::default();
        let merger = PriorityMerger::new(&reader, dir.path(), &NoCollection);

        let err = merger
            .get_morph_priority(Evaluation::Inflection, &PrioritySelection::from("minimal.csv"))
            .unwrap_err();
        match err {
            SieveError::PriorityFile(PriorityFileError::Malformed { path, .. }) => {
                assert_eq!(path, dir.path().join("minimal.csv"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn collection_without_source_is_an_error() {
        let reader = PriorityFileReader::default();
        let merger = PriorityMerger::new(&reader, "unused", &NoCollection);
        let selection = PrioritySelection::from(COLLECTION_FREQUENCY_OPTION);
        let err = merger
            .get_morph_priority(Evaluation::Lemma, &selection)
            .unwrap_err();
        assert!(matches!(err, SieveError::CollectionUnavailable));
    }

    #[test]
    fn collection_is_keyed_by_lemma_when_evaluating_lemmas() {
        let collection = PriorityMap::from([
            (MorphKey::new("食べる", "食べた", "たべた"), 4),
            (MorphKey::new("食べる", "食べて", "たべた"), 1),
        ]);
        let reader = PriorityFileReader::default();
        let merger = PriorityMerger::new(&reader, "unused", &collection);

        let selection = PrioritySelection::from(COLLECTION_FREQUENCY_OPTION);
        let lemmas = merger.get_morph_priority(Evaluation::Lemma, &selection).unwrap();
        assert_eq!(
            lemmas,
            PriorityMap::from([(MorphKey::new("食べる", "食べる", "たべた"), 1)])
        );

        let inflections = merger.get_morph_priority(Evaluation::Inflection, &selection).unwrap();
        assert_eq!(inflections, collection);
    }

    #[test]
    fn list_priority_files_only_returns_csv() {
        let dir = priority_dir(&[
            ("b.csv", "Lemma\n"),
            ("a.CSV", "Lemma\n"),
            ("notes.txt", "x"),
        ]);
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        assert_eq!(list_priority_files(dir.path()).unwrap(), vec!["a.CSV", "b.csv"]);
    }
}
