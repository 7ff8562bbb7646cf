//! Run configuration
//!
//! `SweepSettings` holds process-level knobs (job directory, CV folds, seeds).
//! `SearchParameters` is the per-job parameter map parsed into typed exclusions.

use crate::error::{Result, SweepError};
use crate::optimizer::SpaceOverrides;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Engine settings shared by every job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Parent directory of per-job working directories
    pub jobs_dir: PathBuf,
    /// Folds used by grid and random search
    pub cv_folds: usize,
    /// Seed for splits, CV shuffling and random search
    pub random_seed: u64,
    /// Share of the training file held out as the test split
    pub test_size: f64,
    /// Parameter sets drawn by random search
    pub random_search_iterations: usize,
    /// Capacity of the bounded progress channel
    pub progress_capacity: usize,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("./jobs"),
            cv_folds: 5,
            random_seed: 42,
            test_size: 0.2,
            random_search_iterations: 10,
            progress_capacity: 64,
        }
    }
}

impl SweepSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `JOBS_DIR`, `CV_FOLDS` and `RANDOM_SEED`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            jobs_dir: std::env::var("JOBS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.jobs_dir),
            cv_folds: std::env::var("CV_FOLDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cv_folds),
            random_seed: std::env::var("RANDOM_SEED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.random_seed),
            ..defaults
        }
    }

    pub fn with_jobs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.jobs_dir = dir.into();
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_search_iterations(mut self, n: usize) -> Self {
        self.random_search_iterations = n;
        self
    }

    pub fn with_progress_capacity(mut self, capacity: usize) -> Self {
        self.progress_capacity = capacity;
        self
    }

    /// Working directory of one job
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(job_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(SweepError::Configuration(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(SweepError::Configuration(format!(
                "test_size must lie in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.random_search_iterations == 0 {
            return Err(SweepError::Configuration(
                "random_search_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Typed view of a job's parameter map
#[derive(Debug, Clone)]
pub struct SearchParameters {
    pub ignore_estimator: BTreeSet<String>,
    pub ignore_feature_selector: BTreeSet<String>,
    pub ignore_scaler: BTreeSet<String>,
    pub ignore_searcher: BTreeSet<String>,
    pub ignore_scorer: BTreeSet<String>,
    /// Shuffle cross-validation folds; any non-empty `ignore_shuffle` turns it off
    pub shuffle: bool,
    pub hyper_parameters: SpaceOverrides,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            ignore_estimator: BTreeSet::new(),
            ignore_feature_selector: BTreeSet::new(),
            ignore_scaler: BTreeSet::new(),
            ignore_searcher: BTreeSet::new(),
            ignore_scorer: BTreeSet::new(),
            shuffle: true,
            hyper_parameters: SpaceOverrides::default(),
        }
    }
}

impl SearchParameters {
    /// Parse the recognized options; unrecognized keys are ignored
    pub fn from_map(params: &BTreeMap<String, String>) -> Result<Self> {
        let list = |key: &str| -> BTreeSet<String> {
            params
                .get(key)
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default()
        };

        let hyper_parameters = match params.get("hyper_parameters").map(|s| s.trim()) {
            Some(raw) if !raw.is_empty() => {
                let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
                    SweepError::Configuration(format!("hyper_parameters is not valid JSON: {}", e))
                })?;
                SpaceOverrides::from_json(&value)?
            }
            _ => SpaceOverrides::default(),
        };

        Ok(Self {
            ignore_estimator: list("ignore_estimator"),
            ignore_feature_selector: list("ignore_feature_selector"),
            ignore_scaler: list("ignore_scaler"),
            ignore_searcher: list("ignore_searcher"),
            ignore_scorer: list("ignore_scorer"),
            shuffle: params
                .get("ignore_shuffle")
                .map_or(true, |v| v.trim().is_empty()),
            hyper_parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_settings_builder() {
        let settings = SweepSettings::new()
            .with_cv_folds(3)
            .with_random_seed(7)
            .with_jobs_dir("/tmp/jobs");
        assert_eq!(settings.cv_folds, 3);
        assert_eq!(settings.random_seed, 7);
        assert_eq!(settings.job_dir("abc"), PathBuf::from("/tmp/jobs/abc"));
        assert!(settings.validate().is_ok());
        assert!(SweepSettings::new().with_cv_folds(1).validate().is_err());
        assert!(SweepSettings::new().with_test_size(1.0).validate().is_err());
    }

    #[test]
    fn test_exclusion_lists_are_trimmed() {
        let params = SearchParameters::from_map(&map(&[
            ("ignore_estimator", " knn, svm ,,"),
            ("ignore_scorer", "roc_auc"),
        ]))
        .unwrap();
        assert_eq!(
            params.ignore_estimator.iter().collect::<Vec<_>>(),
            vec!["knn", "svm"]
        );
        assert!(params.ignore_scorer.contains("roc_auc"));
        assert!(params.ignore_scaler.is_empty());
        assert!(params.shuffle);
    }

    #[test]
    fn test_ignore_shuffle_presence() {
        let params = SearchParameters::from_map(&map(&[("ignore_shuffle", "true")])).unwrap();
        assert!(!params.shuffle);
        let params = SearchParameters::from_map(&map(&[("ignore_shuffle", "")])).unwrap();
        assert!(params.shuffle);
    }

    #[test]
    fn test_hyper_parameters_json() {
        let params = SearchParameters::from_map(&map(&[(
            "hyper_parameters",
            r#"{"grid": {"lr": {"C": [1, 2]}}}"#,
        )]))
        .unwrap();
        assert!(params.hyper_parameters.grid.contains_key("lr"));

        let err = SearchParameters::from_map(&map(&[("hyper_parameters", "{not json")])).unwrap_err();
        assert!(matches!(err, SweepError::Configuration(_)));
    }
}
