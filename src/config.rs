//! User settings, read from a YAML file.

use crate::error::ConfigError;
use crate::interval::RubyStyle;
use crate::merge::PrioritySelection;
use crate::morph::{Evaluation, MORPH_UNKNOWN_PENALTY};
use crate::parallel::ParallelConfig;
use crate::priority_file::{HeaderNames, PriorityFileReader};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Every field is optional in the file and falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SieveConfig {
    pub evaluation: Evaluation,
    /// Days of review interval after which a morph counts as known
    pub interval_for_known_morphs: u32,
    /// A single file name or a list; legacy configs use a string.
    pub morph_priority_selection: PrioritySelection,
    pub priority_files_dir: PathBuf,
    pub row_cutoff: usize,
    pub headers: HeaderNames,
    pub ruby_style: RubyStyle,
    /// Worker threads for parsing priority files, `0` for one per CPU
    pub threads: usize,
    pub dev_mode: bool,
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self {
            evaluation: Evaluation::default(),
            interval_for_known_morphs: 21,
            morph_priority_selection: PrioritySelection::default(),
            priority_files_dir: PathBuf::from("priority-files"),
            row_cutoff: MORPH_UNKNOWN_PENALTY,
            headers: HeaderNames::default(),
            ruby_style: RubyStyle::default(),
            threads: 1,
            dev_mode: false,
        }
    }
}

impl SieveConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(path, &contents)
    }

    /// `path` is only used in errors.
    pub fn from_yaml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        // an empty document deserializes as null rather than an empty mapping
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn priority_file_reader(&self) -> PriorityFileReader {
        PriorityFileReader::new(self.headers.clone()).with_row_cutoff(self.row_cutoff)
    }

    pub fn parallel(&self) -> ParallelConfig {
        ParallelConfig::with_threads(self.threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> SieveConfig {
        SieveConfig::from_yaml(Path::new("test.yaml"), yaml).unwrap()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse("");
        assert_eq!(config, SieveConfig::default());
        assert_eq!(config.interval_for_known_morphs, 21);
        assert_eq!(config.row_cutoff, MORPH_UNKNOWN_PENALTY);
        assert_eq!(config.priority_files_dir, PathBuf::from("priority-files"));
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = parse("evaluation: inflection\nruby_style: html\n");
        assert_eq!(config.evaluation, Evaluation::Inflection);
        assert_eq!(config.ruby_style, RubyStyle::Html);
        assert_eq!(config.interval_for_known_morphs, 21);
        assert_eq!(config.headers, HeaderNames::default());
    }

    #[test]
    fn legacy_single_string_selection() {
        let config = parse("morph_priority_selection: ja_news.csv\n");
        assert_eq!(config.morph_priority_selection.normalized(), vec!["ja_news.csv"]);
    }

    #[test]
    fn list_selection() {
        let config = parse(
            "morph_priority_selection:\n  - Collection frequency\n  - plan.csv\n  - (none)\n",
        );
        assert_eq!(
            config.morph_priority_selection.normalized(),
            vec!["Collection frequency", "plan.csv"]
        );
    }

    #[test]
    fn custom_header_names() {
        let config = parse("headers:\n  lemma: Word\n  reading: Kana\n");
        assert_eq!(config.headers.lemma, "Word");
        assert_eq!(config.headers.reading, "Kana");
        assert_eq!(config.headers.inflection, "Inflection");
        assert_eq!(config.priority_file_reader().headers().lemma, "Word");
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let err = SieveConfig::from_yaml(Path::new("bad.yaml"), "threads: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = SieveConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sieve.yaml");
        fs::write(&path, "threads: 0\nrow_cutoff: 10\ndev_mode: true\n").unwrap();
        let config = SieveConfig::load(&path).unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.priority_file_reader().row_cutoff(), 10);
        assert!(config.parallel().num_threads >= 1);
    }
}
