//! Model types a candidate pipeline can end in
//!
//! Binary classifiers only:
//! - Logistic regression
//! - K-nearest neighbors
//! - Gaussian naive Bayes
//! - Linear support vector machine (decision function only)
//!
//! Plus the stratified k-fold splitter used by the tuner.

pub mod cross_validation;
pub mod knn;
pub mod linear_models;
pub mod naive_bayes;
pub mod svm;

pub use cross_validation::{CvResults, CvSplit, StratifiedKFold};
pub use knn::{KnnClassifier, WeightScheme};
pub use linear_models::LogisticRegression;
pub use naive_bayes::GaussianNaiveBayes;
pub use svm::{LinearSvm, SvmConfig};

use crate::error::{Result, SweepError};
use crate::optimizer::{HyperParameters, ParameterValue};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Trainable model type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LogisticRegression,
    Knn,
    NaiveBayes,
    LinearSvm,
}

/// Raw score a fitted model can produce for the positive class
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutput {
    /// Calibrated positive-class probability in [0, 1]
    Probability(Array1<f64>),
    /// Unbounded decision score (larger is more positive)
    Decision(Array1<f64>),
}

/// Enum to hold model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    Knn(KnnClassifier),
    NaiveBayes(GaussianNaiveBayes),
    LinearSvm(LinearSvm),
}

impl Estimator {
    /// Unfitted estimator with default hyperparameters
    pub fn new(kind: ModelKind) -> Self {
        match kind {
            ModelKind::LogisticRegression => Estimator::LogisticRegression(LogisticRegression::new()),
            ModelKind::Knn => Estimator::Knn(KnnClassifier::default()),
            ModelKind::NaiveBayes => Estimator::NaiveBayes(GaussianNaiveBayes::new()),
            ModelKind::LinearSvm => Estimator::LinearSvm(LinearSvm::default()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Estimator::LogisticRegression(_) => ModelKind::LogisticRegression,
            Estimator::Knn(_) => ModelKind::Knn,
            Estimator::NaiveBayes(_) => ModelKind::NaiveBayes,
            Estimator::LinearSvm(_) => ModelKind::LinearSvm,
        }
    }

    pub fn set_params(&mut self, params: &HyperParameters) -> Result<()> {
        match self {
            Estimator::LogisticRegression(m) => m.set_params(params),
            Estimator::Knn(m) => m.set_params(params),
            Estimator::NaiveBayes(m) => m.set_params(params),
            Estimator::LinearSvm(m) => m.set_params(params),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::LogisticRegression(m) => m.fit(x, y).map(|_| ()),
            Estimator::Knn(m) => m.fit(x, y),
            Estimator::NaiveBayes(m) => m.fit(x, y),
            Estimator::LinearSvm(m) => m.fit(x, y),
        }
    }

    /// Predict 0/1 class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::LogisticRegression(m) => m.predict(x),
            Estimator::Knn(m) => m.predict(x),
            Estimator::NaiveBayes(m) => m.predict(x),
            Estimator::LinearSvm(m) => m.predict(x),
        }
    }

    /// Positive-class probability when the model has one, otherwise its decision score
    pub fn score_output(&self, x: &Array2<f64>) -> Result<ScoreOutput> {
        match self {
            Estimator::LogisticRegression(m) => m.score_output(x),
            Estimator::Knn(m) => m.score_output(x),
            Estimator::NaiveBayes(m) => m.score_output(x),
            Estimator::LinearSvm(m) => m.score_output(x),
        }
    }
}

/// Reject inputs no model can be fitted on.
///
/// Failures are `Fit` errors so the caller skips only the current candidate.
pub(crate) fn validate_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(SweepError::Shape {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(SweepError::Fit(format!(
            "cannot fit on an empty matrix ({} x {})",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SweepError::Fit("training matrix contains non-finite values".to_string()));
    }
    let positives = y.iter().filter(|&&v| v > 0.5).count();
    if positives == 0 || positives == y.len() {
        return Err(SweepError::Fit("training labels contain a single class".to_string()));
    }
    Ok(())
}

pub(crate) fn param_f64(name: &str, value: &ParameterValue) -> Result<f64> {
    value.as_float().ok_or_else(|| SweepError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: "expected a number".to_string(),
    })
}

pub(crate) fn param_usize(name: &str, value: &ParameterValue) -> Result<usize> {
    value.as_usize().ok_or_else(|| SweepError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [2.0, 2.1],
            [2.2, 2.0],
            [2.1, 2.3],
            [2.3, 2.2],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_every_kind_fits_and_predicts() {
        let (x, y) = separable();
        for kind in [
            ModelKind::LogisticRegression,
            ModelKind::Knn,
            ModelKind::NaiveBayes,
            ModelKind::LinearSvm,
        ] {
            let mut model = Estimator::new(kind);
            assert_eq!(model.kind(), kind);
            model.fit(&x, &y).unwrap();
            assert_eq!(model.predict(&x).unwrap().len(), 8);
        }
    }

    #[test]
    fn test_score_output_kind() {
        let (x, y) = separable();
        let mut svm = Estimator::new(ModelKind::LinearSvm);
        svm.fit(&x, &y).unwrap();
        assert!(matches!(svm.score_output(&x).unwrap(), ScoreOutput::Decision(_)));

        let mut nb = Estimator::new(ModelKind::NaiveBayes);
        nb.fit(&x, &y).unwrap();
        assert!(matches!(nb.score_output(&x).unwrap(), ScoreOutput::Probability(_)));
    }

    #[test]
    fn test_degenerate_input_is_fit_error() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let mut model = Estimator::new(ModelKind::LogisticRegression);
        assert!(matches!(model.fit(&x, &y), Err(SweepError::Fit(_))));

        let x = array![[f64::NAN], [2.0]];
        let y = array![0.0, 1.0];
        assert!(matches!(model.fit(&x, &y), Err(SweepError::Fit(_))));
    }
}
