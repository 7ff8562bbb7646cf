//! Linear support vector classifier
//!
//! Minimizes the soft-margin hinge objective by full-batch subgradient descent.
//! Only a decision function is exposed; callers needing probabilities rescale it.

use super::{param_f64, param_usize, validate_training_data, ScoreOutput};
use crate::error::{Result, SweepError};
use crate::optimizer::HyperParameters;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Initial step size, decayed as 1/sqrt(t)
    pub learning_rate: f64,
    /// Tolerance on the subgradient norm
    pub tol: f64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            learning_rate: 0.1,
            tol: 1e-6,
        }
    }
}

/// Binary linear SVM
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearSvm {
    pub config: SvmConfig,
    weights: Option<Array1<f64>>,
    bias: f64,
}

impl LinearSvm {
    pub fn new(config: SvmConfig) -> Self {
        Self {
            config,
            weights: None,
            bias: 0.0,
        }
    }

    /// Apply `C` and `max_iter`
    pub fn set_params(&mut self, params: &HyperParameters) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "C" => self.config.c = param_f64(name, value)?,
                "max_iter" => self.config.max_iter = param_usize(name, value)?,
                _ => return Err(super::linear_models::unknown_param("svm", name, value)),
            }
        }
        if self.config.c <= 0.0 {
            return Err(SweepError::InvalidParameter {
                name: "C".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        let n_samples = x.nrows() as f64;
        let signs = y.mapv(|v| if v > 0.5 { 1.0 } else { -1.0 });
        let lambda = 1.0 / (self.config.c * n_samples);

        let mut w = Array1::<f64>::zeros(x.ncols());
        let mut b = 0.0;

        for t in 1..=self.config.max_iter {
            let margins = (x.dot(&w) + b) * &signs;
            // Only samples inside the margin contribute to the hinge subgradient
            let active = margins.mapv(|m| if m < 1.0 { 1.0 } else { 0.0 }) * &signs;
            let grad_w = lambda * &w - x.t().dot(&active) / n_samples;
            let grad_b = -active.sum() / n_samples;

            let norm = (grad_w.mapv(|v| v * v).sum() + grad_b * grad_b).sqrt();
            if norm < self.config.tol {
                break;
            }

            let step = self.config.learning_rate / (t as f64).sqrt();
            w = w - step * grad_w;
            b -= step * grad_b;
        }

        if w.iter().any(|v| !v.is_finite()) || !b.is_finite() {
            return Err(SweepError::Fit("svm diverged to non-finite weights".to_string()));
        }

        self.weights = Some(w);
        self.bias = b;
        Ok(())
    }

    /// Signed distance to the separating hyperplane
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights.as_ref().ok_or(SweepError::ModelNotFitted)?;
        if x.ncols() != w.len() {
            return Err(SweepError::Shape {
                expected: format!("{} columns", w.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(x.dot(w) + self.bias)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .decision_function(x)?
            .mapv(|d| if d > 0.0 { 1.0 } else { 0.0 }))
    }

    pub fn score_output(&self, x: &Array2<f64>) -> Result<ScoreOutput> {
        Ok(ScoreOutput::Decision(self.decision_function(x)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_svm_separable() {
        let x = array![
            [0.0, 0.0],
            [0.5, 0.2],
            [0.2, 0.5],
            [3.0, 3.0],
            [3.5, 3.2],
            [3.2, 3.5],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut svm = LinearSvm::new(SvmConfig {
            c: 10.0,
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();

        assert_eq!(svm.predict(&x).unwrap(), y);
        let scores = svm.decision_function(&array![[0.0, 0.0], [3.0, 3.0]]).unwrap();
        assert!(scores[0] < scores[1]);
    }

    #[test]
    fn test_decision_output_only() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut svm = LinearSvm::default();
        svm.fit(&x, &y).unwrap();
        assert!(matches!(svm.score_output(&x).unwrap(), ScoreOutput::Decision(_)));
    }

    #[test]
    fn test_unfitted() {
        let svm = LinearSvm::default();
        assert!(matches!(svm.decision_function(&array![[1.0]]), Err(SweepError::ModelNotFitted)));
    }
}
