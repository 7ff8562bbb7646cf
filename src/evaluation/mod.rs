//! Candidate evaluation
//!
//! Every computation shares one contract: the evaluation matrix is reduced to the
//! selected columns, transformed through the fitted chain (never refitted) and then
//! scored by the fitted model.
//! - Generalization metrics (accuracy family, confusion counts)
//! - ROC curves for each requested split
//! - Reliability curves and Brier score for each requested split

pub mod metrics;
pub mod probability;
pub mod reliability;
pub mod roc;

pub use metrics::{accuracy, roc_auc, ClassificationMetrics, ConfusionCounts, ScoringMetric};
pub use probability::positive_probabilities;
pub use reliability::{reliability, round4, Reliability};
pub use roc::{roc_curve, RocCurve};

use crate::error::{Result, SweepError};
use crate::pipeline::PipelineChain;
use crate::preprocessing::select_columns;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Held-out split a curve is computed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    /// Held-out part of the training file
    Test,
    /// Separate generalization file
    Generalization,
}

impl Split {
    /// Column prefix used in the report
    pub fn name(&self) -> &'static str {
        match self {
            Split::Test => "test",
            Split::Generalization => "generalization",
        }
    }
}

/// Which splits get ROC and reliability curves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPlan {
    pub roc_splits: Vec<Split>,
    pub reliability_splits: Vec<Split>,
}

impl Default for EvaluationPlan {
    fn default() -> Self {
        Self {
            roc_splits: vec![Split::Test, Split::Generalization],
            reliability_splits: vec![Split::Generalization],
        }
    }
}

/// Borrowed features and labels of one split
#[derive(Debug, Clone, Copy)]
pub struct SplitData<'a> {
    pub x: &'a Array2<f64>,
    pub y: &'a Array1<f64>,
}

/// Everything the evaluator measured for one fitted candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub test_accuracy: f64,
    pub generalization: ClassificationMetrics,
    pub roc: Vec<(Split, RocCurve)>,
    pub reliability: Vec<(Split, Reliability)>,
}

struct Scored {
    predictions: Array1<f64>,
    probabilities: Array1<f64>,
}

/// Evaluates fitted chains against the test and generalization splits
pub struct Evaluator<'a> {
    test: SplitData<'a>,
    generalization: SplitData<'a>,
    plan: &'a EvaluationPlan,
}

impl<'a> Evaluator<'a> {
    pub fn new(test: SplitData<'a>, generalization: SplitData<'a>, plan: &'a EvaluationPlan) -> Self {
        Self {
            test,
            generalization,
            plan,
        }
    }

    /// Evaluate a fitted chain trained on the `selected` columns
    pub fn evaluate(&self, chain: &PipelineChain, selected: &[usize]) -> Result<Evaluation> {
        let test = Self::score_split(chain, selected, self.test)
            .map_err(|e| as_evaluation_error("test", e))?;
        let generalization = Self::score_split(chain, selected, self.generalization)
            .map_err(|e| as_evaluation_error("generalization", e))?;

        let test_accuracy = accuracy(self.test.y, &test.predictions)?;
        let metrics = ClassificationMetrics::compute(
            self.generalization.y,
            &generalization.predictions,
            &generalization.probabilities,
        )?;

        let pick = |split: Split| match split {
            Split::Test => (&test, self.test.y),
            Split::Generalization => (&generalization, self.generalization.y),
        };

        let roc = self
            .plan
            .roc_splits
            .iter()
            .map(|&split| {
                let (scored, y) = pick(split);
                Ok((split, roc_curve(y, &scored.probabilities)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let reliability = self
            .plan
            .reliability_splits
            .iter()
            .map(|&split| {
                let (scored, y) = pick(split);
                Ok((split, reliability(&scored.probabilities, y)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Evaluation {
            test_accuracy,
            generalization: metrics,
            roc,
            reliability,
        })
    }

    fn score_split(chain: &PipelineChain, selected: &[usize], split: SplitData<'_>) -> Result<Scored> {
        let x = select_columns(split.x, selected);
        let (predictions, output) = chain.predict_with_scores(&x)?;
        Ok(Scored {
            predictions,
            probabilities: positive_probabilities(output),
        })
    }
}

fn as_evaluation_error(split: &str, err: SweepError) -> SweepError {
    match err {
        SweepError::Evaluation { .. } => err,
        other => SweepError::evaluation(format!("{} predictions", split), other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::PipelineConfiguration;
    use crate::optimizer::HyperParameters;
    use crate::registry::Registry;
    use ndarray::array;

    fn fitted(model: &str) -> PipelineChain {
        let x = array![[0.0, 5.0], [0.2, 5.0], [0.4, 5.0], [1.6, 5.0], [1.8, 5.0], [2.0, 5.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut chain = PipelineChain::build(
            Registry::standard(),
            &PipelineConfiguration::new("std", "none", model, "none"),
            &HyperParameters::new(),
            0,
        )
        .unwrap();
        chain.fit(&x.select(ndarray::Axis(1), &[0]), &y).unwrap();
        chain
    }

    #[test]
    fn test_evaluate_default_plan() {
        let x_test = array![[0.1, 1.0], [1.9, 1.0], [0.3, 1.0], [1.7, 1.0]];
        let y_test = array![0.0, 1.0, 0.0, 1.0];
        let x_gen = array![[0.0, 2.0], [2.0, 2.0], [0.5, 2.0], [1.5, 2.0], [1.2, 2.0]];
        let y_gen = array![0.0, 1.0, 0.0, 1.0, 1.0];
        let plan = EvaluationPlan::default();

        let evaluator = Evaluator::new(
            SplitData { x: &x_test, y: &y_test },
            SplitData { x: &x_gen, y: &y_gen },
            &plan,
        );
        for model in ["lr", "nb", "svm", "knn"] {
            let result = evaluator.evaluate(&fitted(model), &[0]).unwrap();
            assert_eq!(result.roc.len(), 2);
            assert_eq!(result.roc[0].0, Split::Test);
            assert_eq!(result.reliability.len(), 1);
            assert_eq!(result.reliability[0].0, Split::Generalization);
            assert_eq!(result.generalization.counts.total(), 5);
            for (_, curve) in &result.roc {
                assert!(curve.tpr.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }

    #[test]
    fn test_single_class_split_fails_only_evaluation() {
        let x = array![[0.1, 0.0], [0.2, 0.0]];
        let y = array![0.0, 0.0];
        let plan = EvaluationPlan::default();
        let evaluator = Evaluator::new(SplitData { x: &x, y: &y }, SplitData { x: &x, y: &y }, &plan);
        let err = evaluator.evaluate(&fitted("lr"), &[0]).unwrap_err();
        assert!(matches!(err, SweepError::Evaluation { .. }));
        assert!(!err.is_fatal());
    }
}
