use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lower values are more important.
pub type Priority = i64;

/// Canonical priority mapping.
pub type PriorityMap = HashMap<MorphKey, Priority>;

/// Cards are penalised this much per unknown morph. Priorities past it are never
/// looked at by the scoring, so it doubles as the priority file row cutoff.
pub const MORPH_UNKNOWN_PENALTY: usize = 1_000_000;

/// (lemma, inflection, reading) key of a priority mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MorphKey {
    pub lemma: String,
    pub inflection: String,
    pub reading: String,
}

impl MorphKey {
    pub fn new(
        lemma: impl Into<String>,
        inflection: impl Into<String>,
        reading: impl Into<String>,
    ) -> Self {
        Self {
            lemma: lemma.into(),
            inflection: inflection.into(),
            reading: reading.into(),
        }
    }

    /// Key used when only lemmas are evaluated: the lemma stands in for the inflection.
    pub fn lemma_only(lemma: impl Into<String>, reading: impl Into<String>) -> Self {
        let lemma = lemma.into();
        Self {
            inflection: lemma.clone(),
            lemma,
            reading: reading.into(),
        }
    }
}

impl fmt::Display for MorphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.lemma, self.inflection, self.reading)
    }
}

/// Which form of a morph is used for priorities and learning status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Evaluation {
    #[default]
    Lemma,
    Inflection,
}

impl Evaluation {
    pub fn only_lemma_priorities(self) -> bool {
        self == Evaluation::Lemma
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStatus {
    Unknown,
    Learning,
    Known,
    Undefined,
}

impl LearningStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LearningStatus::Unknown => "unknown",
            LearningStatus::Learning => "learning",
            LearningStatus::Known => "known",
            LearningStatus::Undefined => "undefined",
        }
    }
}

impl fmt::Display for LearningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A morph occurrence the highlighter can locate and classify.
pub trait Classify {
    fn inflection(&self) -> &str;

    fn learning_status(&self, evaluation: Evaluation, interval_for_known_morphs: u32)
        -> LearningStatus;
}

/// A morph as produced by a morphemizer, annotated with review history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Morpheme {
    pub lemma: String,
    pub inflection: String,
    #[serde(default)]
    pub highest_lemma_learning_interval: Option<u32>,
    #[serde(default)]
    pub highest_inflection_learning_interval: Option<u32>,
}

impl Morpheme {
    pub fn new(lemma: impl Into<String>, inflection: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            inflection: inflection.into(),
            highest_lemma_learning_interval: None,
            highest_inflection_learning_interval: None,
        }
    }

    /// Sets the same interval on both axes.
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.highest_lemma_learning_interval = Some(interval);
        self.highest_inflection_learning_interval = Some(interval);
        self
    }
}

impl Classify for Morpheme {
    fn inflection(&self) -> &str {
        &self.inflection
    }

    fn learning_status(
        &self,
        evaluation: Evaluation,
        interval_for_known_morphs: u32,
    ) -> LearningStatus {
        let interval = match evaluation {
            Evaluation::Lemma => self.highest_lemma_learning_interval,
            Evaluation::Inflection => self.highest_inflection_learning_interval,
        };

        match interval {
            None => LearningStatus::Undefined,
            Some(0) => LearningStatus::Unknown,
            Some(days) if days < interval_for_known_morphs => LearningStatus::Learning,
            Some(_) => LearningStatus::Known,
        }
    }
}
