//! JSON persistence for priority mappings.
//!
//! JSON objects need string keys, so each [`MorphKey`] is flattened to
//! `lemma|inflection|reading`. Caches written before readings were tracked
//! have `lemma|inflection` keys; those load with an empty reading.

use crate::error::{CacheError, SieveError};
use crate::merge::{lemma_priorities, CollectionPriorities};
use crate::morph::{MorphKey, Priority, PriorityMap};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const KEY_SEPARATOR: char = '|';

/// Flattens keys; the `BTreeMap` keeps the written file stable.
pub fn to_flat_keys(priorities: &PriorityMap) -> BTreeMap<String, Priority> {
    priorities
        .iter()
        .map(|(key, &priority)| (key.to_string(), priority))
        .collect()
}

pub fn from_flat_keys(
    flat: impl IntoIterator<Item = (String, Priority)>,
) -> Result<PriorityMap, CacheError> {
    flat.into_iter()
        .map(|(key, priority)| Ok((parse_flat_key(&key)?, priority)))
        .collect()
}

fn parse_flat_key(key: &str) -> Result<MorphKey, CacheError> {
    let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    match parts.as_slice() {
        [lemma, inflection] => Ok(MorphKey::new(*lemma, *inflection, "")),
        [lemma, inflection, reading] => Ok(MorphKey::new(*lemma, *inflection, *reading)),
        _ => Err(CacheError::InvalidKey {
            key: key.to_string(),
        }),
    }
}

pub fn save_to_json_file(path: &Path, priorities: &PriorityMap) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &to_flat_keys(priorities)).map_err(|source| {
        CacheError::Json {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.flush().map_err(io_err)?;
    Ok(())
}

pub fn load_from_json_file(path: &Path) -> Result<PriorityMap, CacheError> {
    let file = File::open(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let flat: BTreeMap<String, Priority> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    from_flat_keys(flat)
}

/// Collection frequencies snapshotted to a priority cache file.
#[derive(Debug, Clone)]
pub struct CachedCollection {
    path: PathBuf,
}

impl CachedCollection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CollectionPriorities for CachedCollection {
    fn morph_priorities_from_collection(
        &self,
        only_lemma_priorities: bool,
    ) -> Result<PriorityMap, SieveError> {
        let priorities = load_from_json_file(&self.path)?;
        if only_lemma_priorities {
            return Ok(lemma_priorities(&priorities));
        }
        Ok(priorities)
    }
}
