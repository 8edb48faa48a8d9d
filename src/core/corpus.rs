use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::config::{Config, ConfigError};
use crate::core::fingerprint::Extractor;
use crate::core::matcher::{ImageRecord, Matcher};
use crate::core::normalize::{self, DecodeError};

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionProgress {
    pub current_file: String,
    pub completed_count: usize,
    pub total_count: usize,
    pub error_message: Option<String>,
}

pub type ProgressCallback = Box<dyn Fn(ExtractionProgress) + Send + Sync>;

/// An input that could not be fingerprinted and was left out of the corpus.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionFailure {
    pub path: String,
    pub error: String,
}

/// Decode, normalize and fingerprint a single file.
pub fn fingerprint_file(
    path: &Path,
    config: &Config,
    extractor: &Extractor,
) -> Result<ImageRecord, DecodeError> {
    let raster = normalize::load_normalized(path, config.max_dimension)?;
    let fingerprint = extractor.extract(&raster);
    Ok(ImageRecord::new(
        path.to_string_lossy().into_owned(),
        raster.width(),
        raster.height(),
        fingerprint,
    ))
}

/// The matched collection for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Corpus {
    pub records: Vec<ImageRecord>,
    pub failures: Vec<ExtractionFailure>,
}

impl Corpus {
    pub fn build(paths: Vec<PathBuf>, config: &Config) -> Result<Self, ConfigError> {
        Self::build_with_progress(paths, config, None)
    }

    /// Extraction runs to completion before matching starts, since every
    /// match list reads the whole corpus. A file that fails to decode is
    /// recorded in `failures` and the rest of the run continues.
    pub fn build_with_progress(
        mut paths: Vec<PathBuf>,
        config: &Config,
        progress: Option<&ProgressCallback>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        if let Some(cap) = config.max_images {
            if paths.len() > cap {
                log::warn!("corpus capped at {} of {} images", cap, paths.len());
                paths.truncate(cap);
            }
        }

        let (mut records, failures) = Self::extract_all(&paths, config, progress);
        log::info!(
            "extracted {} fingerprints, {} files skipped",
            records.len(),
            failures.len()
        );

        records.sort_by(|a, b| a.path.cmp(&b.path));
        let records = Matcher::new(config).match_all(records);

        Ok(Self { records, failures })
    }

    fn extract_all(
        paths: &[PathBuf],
        config: &Config,
        progress: Option<&ProgressCallback>,
    ) -> (Vec<ImageRecord>, Vec<ExtractionFailure>) {
        let extractor = Extractor::new(config);
        let total_count = paths.len();
        let completed = AtomicUsize::new(0);

        let results: Vec<Result<ImageRecord, ExtractionFailure>> = paths
            .par_iter()
            .map(|path| {
                let result = fingerprint_file(path, config, &extractor).map_err(|e| {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    ExtractionFailure {
                        path: path.to_string_lossy().into_owned(),
                        error: e.to_string(),
                    }
                });

                let completed_count = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(callback) = progress {
                    callback(ExtractionProgress {
                        current_file: path.to_string_lossy().into_owned(),
                        completed_count,
                        total_count,
                        error_message: result.as_ref().err().map(|f| f.error.clone()),
                    });
                }
                result
            })
            .collect();

        let mut records = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(failure) => failures.push(failure),
            }
        }
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        (records, failures)
    }

    pub fn record(&self, path: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|record| record.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
