//! Logistic regression for binary classification

use super::{param_f64, param_usize, validate_training_data, ScoreOutput};
use crate::error::{Result, SweepError};
use crate::optimizer::HyperParameters;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// L2-regularized logistic regression fitted by batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            is_fitted: false,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Apply `C`, `max_iter` and `learning_rate`; unknown names are rejected
    pub fn set_params(&mut self, params: &HyperParameters) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "C" => self.c = param_f64(name, value)?,
                "max_iter" => self.max_iter = param_usize(name, value)?,
                "learning_rate" => self.learning_rate = param_f64(name, value)?,
                _ => return Err(unknown_param("logistic regression", name, value)),
            }
        }
        if self.c <= 0.0 {
            return Err(SweepError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit the model using gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        validate_training_data(x, y)?;
        let n_samples = x.nrows();

        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        let lr = self.learning_rate;
        // Penalty 1/(2C)·|w|² over the summed loss, expressed per sample
        let alpha = 1.0 / (self.c * n_samples as f64);

        for _iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = Self::sigmoid(&linear);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples as f64) + (alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        if weights.iter().any(|w: &f64| !w.is_finite()) || !bias.is_finite() {
            return Err(SweepError::Fit(
                "logistic regression diverged to non-finite weights".to_string(),
            ));
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.is_fitted = true;

        Ok(self)
    }

    /// Predict positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(SweepError::ModelNotFitted),
        };
        let intercept = self.intercept.unwrap_or(0.0);

        let linear = x.dot(coefficients) + intercept;
        Ok(Self::sigmoid(&linear))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn score_output(&self, x: &Array2<f64>) -> Result<ScoreOutput> {
        Ok(ScoreOutput::Probability(self.predict_proba(x)?))
    }
}

pub(crate) fn unknown_param(
    model: &str,
    name: &str,
    value: &crate::optimizer::ParameterValue,
) -> SweepError {
    SweepError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: format!("not a parameter of {}", model),
    }
}
