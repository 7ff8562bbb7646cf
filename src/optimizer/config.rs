//! Tuner configuration

use serde::{Deserialize, Serialize};

/// Configuration for hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Cross-validation folds for evaluation
    pub cv_folds: usize,

    /// Shuffle samples within each class before dealing folds
    pub shuffle: bool,

    /// Random seed for fold shuffling and random search
    pub random_state: u64,

    /// Parameter sets drawn by random search
    pub n_iter: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            shuffle: true,
            random_state: 42,
            n_iter: 10,
        }
    }
}

impl TunerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the number of folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set random search iterations
    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = TunerConfig::new()
            .with_cv_folds(3)
            .with_shuffle(false)
            .with_n_iter(4);
        assert_eq!(config.cv_folds, 3);
        assert!(!config.shuffle);
        assert_eq!(config.n_iter, 4);
        assert_eq!(config.random_state, 42);
    }
}
