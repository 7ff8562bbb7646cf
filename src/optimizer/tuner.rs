//! Grid and random hyperparameter search with stratified cross-validation

use super::config::TunerConfig;
use super::search_space::{HyperParameters, SearchSpace, SearchStrategy};
use crate::error::{Result, SweepError};
use crate::evaluation::{positive_probabilities, ScoringMetric};
use crate::pipeline::PipelineChain;
use crate::training::{CvResults, CvSplit, StratifiedKFold};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cross-validated score of one parameter set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    pub params: HyperParameters,
    /// NaN when a fold failed to fit or score
    pub mean_score: f64,
    pub std_score: f64,
}

/// Result of fitting one configuration for one metric
#[derive(Debug, Clone)]
pub struct TuneOutcome {
    /// Chain refitted on the full training split with the best parameters
    pub chain: PipelineChain,
    /// Empty when nothing was tuned
    pub best_params: HyperParameters,
    /// Parameter sets sorted by mean score, best first; empty when nothing was tuned
    pub cv_results: Vec<SearchRecord>,
    /// Model fits performed, including the final refit
    pub fits: usize,
    pub fit_time: Duration,
}

impl TuneOutcome {
    /// Best cross-validated (mean, std), if a search ran
    pub fn best_score(&self) -> Option<(f64, f64)> {
        self.cv_results.first().map(|r| (r.mean_score, r.std_score))
    }
}

/// Runs the search strategy of a configuration
#[derive(Debug, Clone, Default)]
pub struct Tuner {
    config: TunerConfig,
}

impl Tuner {
    pub fn new(config: TunerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Fits a `tune` call on labels `y` is expected to perform, counted for candidates that fail
    pub fn planned_fits(&self, strategy: SearchStrategy, space: Option<&SearchSpace>, y: &Array1<f64>) -> usize {
        let folds = self.folds().effective_splits(y);
        match (strategy, space) {
            (SearchStrategy::None, _) | (_, None) => 1,
            (SearchStrategy::Grid, Some(space)) => space.grid_points().map_or(0, |points| points.len()) * folds + 1,
            (SearchStrategy::Random, Some(_)) => self.config.n_iter * folds + 1,
        }
    }

    fn folds(&self) -> StratifiedKFold {
        StratifiedKFold::new(self.config.cv_folds)
            .with_shuffle(self.config.shuffle)
            .with_random_state(self.config.random_state)
    }

    /// Fit `base` on the training split.
    ///
    /// Without a strategy or a search space the chain is fitted once with its
    /// defaults. Otherwise every parameter set is cross-validated in parallel,
    /// and the best one is refitted on all of `x`.
    pub fn tune(
        &self,
        base: &PipelineChain,
        strategy: SearchStrategy,
        space: Option<&SearchSpace>,
        metric: ScoringMetric,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<TuneOutcome> {
        let start = Instant::now();

        let space = match (strategy, space) {
            (SearchStrategy::None, _) | (_, None) => {
                let mut chain = base.clone();
                chain.fit(x, y)?;
                return Ok(TuneOutcome {
                    chain,
                    best_params: HyperParameters::new(),
                    cv_results: Vec::new(),
                    fits: 1,
                    fit_time: start.elapsed(),
                });
            }
            (_, Some(space)) => space,
        };

        let candidates = match strategy {
            SearchStrategy::Grid => space.grid_points()?,
            _ => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
                space.sample(self.config.n_iter, &mut rng)?
            }
        };
        if candidates.is_empty() {
            return Err(SweepError::Fit("search space has no parameter sets".to_string()));
        }

        let splits = self.folds().split(y)?;

        let mut cv_results: Vec<SearchRecord> = candidates
            .into_par_iter()
            .map(|params| {
                let (mean_score, std_score) = match Self::cross_validate(base, &params, &splits, metric, x, y) {
                    Ok(cv) => (cv.mean_score, cv.std_score),
                    Err(e) => {
                        debug!(params = ?params, error = %e, "Parameter set failed cross-validation");
                        (f64::NAN, f64::NAN)
                    }
                };
                SearchRecord {
                    params,
                    mean_score,
                    std_score,
                }
            })
            .collect();

        // Stable: ties keep evaluation order, failed sets sink to the end
        cv_results.sort_by(|a, b| descending_nan_last(a.mean_score, b.mean_score));

        let fits = cv_results.len() * splits.len() + 1;
        let best = cv_results
            .first()
            .filter(|r| !r.mean_score.is_nan())
            .ok_or_else(|| SweepError::Fit("every parameter set failed cross-validation".to_string()))?;

        let failed = cv_results.iter().filter(|r| r.mean_score.is_nan()).count();
        if failed > 0 {
            warn!(failed, total = cv_results.len(), "Some parameter sets failed cross-validation");
        }

        let mut chain = base.with_params(&best.params)?;
        chain.fit(x, y)?;

        Ok(TuneOutcome {
            chain,
            best_params: best.params.clone(),
            cv_results,
            fits,
            fit_time: start.elapsed(),
        })
    }

    fn cross_validate(
        base: &PipelineChain,
        params: &HyperParameters,
        splits: &[CvSplit],
        metric: ScoringMetric,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<CvResults> {
        let scores = splits
            .iter()
            .map(|split| {
                let x_train = x.select(Axis(0), &split.train_indices);
                let y_train = y.select(Axis(0), &split.train_indices);
                let x_val = x.select(Axis(0), &split.test_indices);
                let y_val = y.select(Axis(0), &split.test_indices);

                let mut chain = base.with_params(params)?;
                chain.fit(&x_train, &y_train)?;
                let (predictions, output) = chain.predict_with_scores(&x_val)?;
                metric.score(&y_val, &predictions, &positive_probabilities(output))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(CvResults::from_scores(scores))
    }
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
