//! Gaussian Naive Bayes for continuous features

use super::{validate_training_data, ScoreOutput};
use crate::error::{Result, SweepError};
use crate::optimizer::HyperParameters;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Per-class gaussian statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassStats {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

/// Binary Gaussian Naive Bayes classifier.
///
/// Has no tunable hyperparameters; `set_params` only accepts an empty set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Index 0 is the negative class, 1 the positive class
    stats: Option<[ClassStats; 2]>,
    /// Fraction of the largest feature variance added to every variance
    var_smoothing: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            stats: None,
            var_smoothing: 1e-9,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    pub fn set_params(&mut self, params: &HyperParameters) -> Result<()> {
        match params.iter().next() {
            None => Ok(()),
            Some((name, value)) => Err(super::linear_models::unknown_param("naive bayes", name, value)),
        }
    }

    /// Fit the classifier
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        let n_samples = x.nrows() as f64;

        let max_var = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .cloned()
            .fold(0.0f64, f64::max);
        let epsilon = self.var_smoothing * max_var.max(f64::MIN_POSITIVE);

        let class_stats = |positive: bool| -> ClassStats {
            let indices: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &label)| (label > 0.5) == positive)
                .map(|(i, _)| i)
                .collect();
            let rows = x.select(Axis(0), &indices);
            let count = indices.len() as f64;
            // Single-pass Welford's algorithm for mean and variance
            let mut means = vec![0.0; x.ncols()];
            let mut m2 = vec![0.0; x.ncols()];
            for (seen, row) in rows.rows().into_iter().enumerate() {
                let seen = (seen + 1) as f64;
                for (j, &val) in row.iter().enumerate() {
                    let delta = val - means[j];
                    means[j] += delta / seen;
                    m2[j] += delta * (val - means[j]);
                }
            }
            ClassStats {
                log_prior: (count / n_samples).ln(),
                means,
                variances: m2.iter().map(|v| v / count + epsilon).collect(),
            }
        };

        self.stats = Some([class_stats(false), class_stats(true)]);
        Ok(())
    }

    /// Positive-class probabilities via the log-sum-exp trick
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let stats = self.stats.as_ref().ok_or(SweepError::ModelNotFitted)?;
        if x.ncols() != stats[0].means.len() {
            return Err(SweepError::Shape {
                expected: format!("{} columns", stats[0].means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                let neg = stats[0].log_prior + Self::log_likelihood(row, &stats[0]);
                let pos = stats[1].log_prior + Self::log_likelihood(row, &stats[1]);
                let max_val = neg.max(pos);
                let log_sum = ((neg - max_val).exp() + (pos - max_val).exp()).ln();
                (pos - max_val - log_sum).exp()
            })
            .collect())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn score_output(&self, x: &Array2<f64>) -> Result<ScoreOutput> {
        Ok(ScoreOutput::Probability(self.predict_proba(x)?))
    }

    fn log_likelihood(x: ArrayView1<f64>, stats: &ClassStats) -> f64 {
        x.iter()
            .zip(stats.means.iter())
            .zip(stats.variances.iter())
            .map(|((&xi, &mean), &var)| -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln()))
            .sum()
    }
}
