//! Priority files and study plans.
//!
//! Both are CSV files with a `Lemma` column. They come in two formats:
//! - Minimal: no `Inflection` column. Priorities are the row order.
//! - Full: has an `Inflection` column. A full *priority file* also carries
//!   `Lemma-Priority` and `Inflection-Priority` columns, a full *study plan*
//!   is ranked by row order instead.
//!
//! A `Reading` column is optional in every case.

use crate::error::PriorityFileError;
use crate::morph::{Evaluation, MorphKey, Priority, PriorityMap, MORPH_UNKNOWN_PENALTY};
use crate::reading::{KanaNormalizer, ReadingNormalizer};
use crate::records::Records;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityFileType {
    PriorityFile,
    StudyPlan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityFileFormat {
    Minimal,
    Full,
}

/// Header names recognised in priority files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderNames {
    pub lemma: String,
    pub inflection: String,
    pub reading: String,
    pub lemma_priority: String,
    pub inflection_priority: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            lemma: "Lemma".to_string(),
            inflection: "Inflection".to_string(),
            reading: "Reading".to_string(),
            lemma_priority: "Lemma-Priority".to_string(),
            inflection_priority: "Inflection-Priority".to_string(),
        }
    }
}

/// Type, format and column layout of one priority file, derived from its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityFile {
    pub file_type: PriorityFileType,
    pub format: PriorityFileFormat,
    pub lemma_index: usize,
    pub inflection_index: Option<usize>,
    pub reading_index: Option<usize>,
    pub lemma_priority_index: Option<usize>,
    pub inflection_priority_index: Option<usize>,
}

impl PriorityFile {
    /// Classifies a header row.
    ///
    /// Minimal files and minimal study plans are processed identically, so a
    /// minimal file is always reported as [`PriorityFileType::PriorityFile`].
    pub fn from_headers(
        path: &Path,
        headers: Option<&[String]>,
        names: &HeaderNames,
    ) -> Result<Self, PriorityFileError> {
        let headers = match headers {
            Some(headers) if !headers.is_empty() => headers,
            _ => {
                return Err(PriorityFileError::malformed(
                    path,
                    "Priority file does not have headers.",
                ))
            }
        };

        let position = |name: &str| headers.iter().position(|header| header == name);

        let lemma_index = position(&names.lemma).ok_or_else(|| {
            PriorityFileError::malformed(
                path,
                format!("Priority file is missing the '{}' header", names.lemma),
            )
        })?;
        let reading_index = position(&names.reading);

        let Some(inflection_index) = position(&names.inflection) else {
            return Ok(Self {
                file_type: PriorityFileType::PriorityFile,
                format: PriorityFileFormat::Minimal,
                lemma_index,
                inflection_index: None,
                reading_index,
                lemma_priority_index: None,
                inflection_priority_index: None,
            });
        };

        if let Some(lemma_priority_index) = position(&names.lemma_priority) {
            let inflection_priority_index =
                position(&names.inflection_priority).ok_or_else(|| {
                    PriorityFileError::malformed(
                        path,
                        format!(
                            "Priority file is missing the '{}' header",
                            names.inflection_priority
                        ),
                    )
                })?;

            return Ok(Self {
                file_type: PriorityFileType::PriorityFile,
                format: PriorityFileFormat::Full,
                lemma_index,
                inflection_index: Some(inflection_index),
                reading_index,
                lemma_priority_index: Some(lemma_priority_index),
                inflection_priority_index: Some(inflection_priority_index),
            });
        }

        Ok(Self {
            file_type: PriorityFileType::StudyPlan,
            format: PriorityFileFormat::Full,
            lemma_index,
            inflection_index: Some(inflection_index),
            reading_index,
            lemma_priority_index: None,
            inflection_priority_index: None,
        })
    }
}

/// How the rows of a classified file turn into keys and priorities.
#[derive(Debug, Clone, Copy)]
enum RowLayout {
    /// (lemma, lemma, reading) ranked by row index
    LemmaByRow,
    /// (lemma, lemma, reading) ranked by the given column
    LemmaByColumn(usize),
    /// (lemma, inflection, reading) ranked by the given column
    InflectionByColumn { inflection: usize, priority: usize },
    /// (lemma, inflection, reading) ranked by row index
    InflectionByRow { inflection: usize },
}

impl RowLayout {
    fn select(
        path: &Path,
        file: &PriorityFile,
        evaluation: Evaluation,
    ) -> Result<Self, PriorityFileError> {
        use PriorityFileFormat::{Full, Minimal};

        let layout = match (evaluation, file.format, file.file_type) {
            (Evaluation::Lemma, Minimal, _) => Some(RowLayout::LemmaByRow),
            (Evaluation::Lemma, Full, PriorityFileType::StudyPlan) => {
                return Err(PriorityFileError::malformed(
                    path,
                    "Study plans containing inflections are incompatible with the 'evaluate lemmas' option.",
                ))
            }
            (Evaluation::Lemma, Full, PriorityFileType::PriorityFile) => {
                file.lemma_priority_index.map(RowLayout::LemmaByColumn)
            }
            (Evaluation::Inflection, Minimal, _) => {
                return Err(PriorityFileError::malformed(
                    path,
                    "Priority files or study plans without inflections are incompatible with the 'evaluate inflections' option.",
                ))
            }
            (Evaluation::Inflection, Full, PriorityFileType::PriorityFile) => file
                .inflection_index
                .zip(file.inflection_priority_index)
                .map(|(inflection, priority)| RowLayout::InflectionByColumn {
                    inflection,
                    priority,
                }),
            (Evaluation::Inflection, Full, PriorityFileType::StudyPlan) => file
                .inflection_index
                .map(|inflection| RowLayout::InflectionByRow { inflection }),
        };

        layout.ok_or_else(|| {
            PriorityFileError::malformed(path, "unsupported priority file type or format")
        })
    }
}

/// Reads priority files into [`PriorityMap`]s.
pub struct PriorityFileReader {
    headers: HeaderNames,
    row_cutoff: usize,
    normalizer: Box<dyn ReadingNormalizer>,
}

impl Default for PriorityFileReader {
    fn default() -> Self {
        Self::new(HeaderNames::default())
    }
}

impl PriorityFileReader {
    pub fn new(headers: HeaderNames) -> Self {
        Self {
            headers,
            row_cutoff: MORPH_UNKNOWN_PENALTY,
            normalizer: Box::new(KanaNormalizer),
        }
    }

    /// Rows with a zero-based index above `cutoff` are never read.
    pub fn with_row_cutoff(mut self, cutoff: usize) -> Self {
        self.row_cutoff = cutoff;
        self
    }

    pub fn with_normalizer(mut self, normalizer: impl ReadingNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn headers(&self) -> &HeaderNames {
        &self.headers
    }

    pub fn row_cutoff(&self) -> usize {
        self.row_cutoff
    }

    pub fn load(
        &self,
        path: &Path,
        evaluation: Evaluation,
    ) -> Result<PriorityMap, PriorityFileError> {
        let file = File::open(path).map_err(|e| PriorityFileError::from_io(path, e))?;
        let priorities = self.read(path, BufReader::new(file), evaluation)?;
        debug!(
            path = %path.display(),
            entries = priorities.len(),
            "loaded priority file"
        );
        Ok(priorities)
    }

    /// Parses an already opened source. `path` is only used in errors.
    pub fn read<R: BufRead>(
        &self,
        path: &Path,
        reader: R,
        evaluation: Evaluation,
    ) -> Result<PriorityMap, PriorityFileError> {
        let mut records = Records::new(reader);
        let headers = records
            .next()
            .transpose()
            .map_err(|e| PriorityFileError::from_io(path, e))?;

        let file = PriorityFile::from_headers(path, headers.as_deref(), &self.headers)?;
        let layout = RowLayout::select(path, &file, evaluation)?;
        debug!(
            path = %path.display(),
            file_type = ?file.file_type,
            format = ?file.format,
            ?evaluation,
            "classified priority file"
        );

        let mut priorities = PriorityMap::new();

        for (index, record) in records.enumerate() {
            if index > self.row_cutoff {
                // the scoring never reaches priorities this low
                break;
            }
            let row = record.map_err(|e| PriorityFileError::from_io(path, e))?;
            let row_ctx = RowContext {
                path,
                row: &row,
                number: index + 1,
            };

            let lemma = row_ctx.column(file.lemma_index, &self.headers.lemma)?;
            let reading = self.row_reading(&row, &file);

            let (key, priority) = match layout {
                RowLayout::LemmaByRow => (MorphKey::lemma_only(lemma, reading), index as Priority),
                RowLayout::LemmaByColumn(column) => (
                    MorphKey::lemma_only(lemma, reading),
                    row_ctx.priority(column, &self.headers.lemma_priority)?,
                ),
                RowLayout::InflectionByColumn {
                    inflection,
                    priority,
                } => (
                    MorphKey::new(
                        lemma,
                        row_ctx.column(inflection, &self.headers.inflection)?,
                        reading,
                    ),
                    row_ctx.priority(priority, &self.headers.inflection_priority)?,
                ),
                RowLayout::InflectionByRow { inflection } => (
                    MorphKey::new(
                        lemma,
                        row_ctx.column(inflection, &self.headers.inflection)?,
                        reading,
                    ),
                    index as Priority,
                ),
            };

            assign_priority_if_lower(&mut priorities, key, priority);
        }

        Ok(priorities)
    }

    fn row_reading(&self, row: &[String], file: &PriorityFile) -> String {
        file.reading_index
            .and_then(|index| row.get(index))
            .map(|value| self.normalizer.normalize(value))
            .unwrap_or_default()
    }
}

struct RowContext<'a> {
    path: &'a Path,
    row: &'a [String],
    /// 1-based data row number, header excluded
    number: usize,
}

impl<'a> RowContext<'a> {
    fn column(&self, index: usize, header: &str) -> Result<&'a str, PriorityFileError> {
        self.row.get(index).map(String::as_str).ok_or_else(|| {
            PriorityFileError::malformed(
                self.path,
                format!("row {} has no value for the '{}' header", self.number, header),
            )
        })
    }

    fn priority(&self, index: usize, header: &str) -> Result<Priority, PriorityFileError> {
        let value = self.column(index, header)?;
        value.trim().parse::<Priority>().map_err(|_| {
            PriorityFileError::malformed(
                self.path,
                format!(
                    "row {} has a non-integer '{}' value: '{}'",
                    self.number, header, value
                ),
            )
        })
    }
}

/// Stores `priority` unless the key already has a lower or equal one.
pub fn assign_priority_if_lower(priorities: &mut PriorityMap, key: MorphKey, priority: Priority) {
    match priorities.entry(key) {
        Entry::Occupied(mut existing) => {
            if priority < *existing.get() {
                existing.insert(priority);
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(priority);
        }
    }
}
