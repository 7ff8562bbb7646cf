//! Stratified k-fold cross-validation for binary labels

use crate::error::{Result, SweepError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified k-fold splitter (keeps the class ratio in every fold)
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: None,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Number of folds `split` produces for `y`
    pub fn effective_splits(&self, y: &Array1<f64>) -> usize {
        let classes = Self::class_indices(y);
        if classes.len() < 2 {
            return 0;
        }
        let smallest = classes.values().map(|v| v.len()).min().unwrap_or(0);
        self.n_splits.min(smallest)
    }

    // BTreeMap keeps class iteration order deterministic
    fn class_indices(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }
        class_indices
    }

    /// Generate train/test splits.
    ///
    /// The number of folds is capped by the size of the smallest class so every
    /// fold sees both classes.
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CvSplit>> {
        if self.n_splits < 2 {
            return Err(SweepError::Configuration(
                "cross-validation needs at least 2 folds".to_string(),
            ));
        }

        let mut class_indices = Self::class_indices(y);
        let smallest = class_indices.values().map(|v| v.len()).min().unwrap_or(0);
        if class_indices.len() < 2 || smallest < 2 {
            return Err(SweepError::Fit(format!(
                "cross-validation needs at least 2 samples of each class, smallest class has {}",
                smallest
            )));
        }
        let n_splits = self.n_splits.min(smallest);

        if self.shuffle {
            let mut rng = match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round-robin, continuing where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut offset = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[offset % n_splits].push(idx);
                offset += 1;
            }
        }

        Ok((0..n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CvSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    pub mean_score: f64,
    /// Population standard deviation of the fold scores
    pub std_score: f64,
}

impl CvResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len().max(1) as f64;
        let mean_score = scores.iter().sum::<f64>() / n_folds;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
        }
    }
}
