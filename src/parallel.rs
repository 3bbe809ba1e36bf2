//! Parsing several priority files at once.
//!
//! Files are independent, so they can be split across `std::thread` workers.
//! Results always come back in selection order so the caller can merge and
//! report errors deterministically.

use crate::error::PriorityFileError;
use crate::morph::{Evaluation, PriorityMap};
use crate::priority_file::PriorityFileReader;
use std::path::PathBuf;
use std::thread;

/// Configuration for parallel parsing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use
    pub num_threads: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self { num_threads: cpus }
    }
}

impl ParallelConfig {
    pub fn sequential() -> Self {
        Self { num_threads: 1 }
    }

    /// `0` means one thread per available CPU.
    pub fn with_threads(threads: usize) -> Self {
        if threads == 0 {
            Self::default()
        } else {
            Self {
                num_threads: threads,
            }
        }
    }
}

/// Parses `paths` in order.
///
/// Sequential parsing stops at the first failure, which is then the last
/// element. Threaded parsing reads every file and returns all results.
pub fn load_files(
    reader: &PriorityFileReader,
    paths: &[PathBuf],
    evaluation: Evaluation,
    config: &ParallelConfig,
) -> Vec<Result<PriorityMap, PriorityFileError>> {
    let num_threads = config.num_threads.min(paths.len()).max(1);
    if num_threads == 1 {
        return load_sequential(reader, paths, evaluation);
    }
    load_threaded(reader, paths, evaluation, num_threads)
}

fn load_sequential(
    reader: &PriorityFileReader,
    paths: &[PathBuf],
    evaluation: Evaluation,
) -> Vec<Result<PriorityMap, PriorityFileError>> {
    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let result = reader.load(path, evaluation);
        let failed = result.is_err();
        results.push(result);
        if failed {
            break;
        }
    }
    results
}

fn load_threaded(
    reader: &PriorityFileReader,
    paths: &[PathBuf],
    evaluation: Evaluation,
    num_threads: usize,
) -> Vec<Result<PriorityMap, PriorityFileError>> {
    let chunk_size = paths.len().div_ceil(num_threads);

    thread::scope(|scope| {
        let handles: Vec<_> = paths
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|path| reader.load(path, evaluation))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        // chunks are joined in order, so results stay in selection order
        let mut results = Vec::with_capacity(paths.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk_results) => results.extend(chunk_results),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        results
    })
}
