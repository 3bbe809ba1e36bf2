//! Morph priority merging and learning-status highlighting for flashcard text.
//!
//! Priority files and study plans are CSV files ranking morphs. Any number of
//! them can be merged into one [`PriorityMap`] where the lowest priority a
//! source gave a key wins. Independently, a [`TextHighlighter`] wraps every
//! morph of an expression in markup naming its learning status, keeping any
//! furigana ruby annotations intact.

pub mod cache;
pub mod config;
pub mod error;
pub mod highlighter;
pub mod interval;
pub mod merge;
pub mod morph;
pub mod parallel;
pub mod priority_file;
pub mod reading;
pub mod records;

pub use cache::CachedCollection;
pub use config::SieveConfig;
pub use error::{CacheError, ConfigError, PriorityFileError, SieveError};
pub use highlighter::{HighlightSettings, TextHighlighter};
pub use interval::{Markup, Ruby, RubyStyle, Status};
pub use merge::{
    CollectionPriorities, NoCollection, PriorityMerger, PrioritySelection,
    COLLECTION_FREQUENCY_OPTION, NONE_OPTION,
};
pub use morph::{
    Classify, Evaluation, LearningStatus, MorphKey, Morpheme, Priority, PriorityMap,
    MORPH_UNKNOWN_PENALTY,
};
pub use parallel::ParallelConfig;
pub use priority_file::{HeaderNames, PriorityFile, PriorityFileReader};
pub use reading::{normalize_reading, KanaNormalizer, ReadingNormalizer};
