//! Binary classification metrics

use super::roc::roc_curve;
use crate::error::{Result, SweepError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Scoring metric used to rank hyperparameter candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoringMetric {
    Accuracy,
    RocAuc,
    /// Unweighted mean of the per-class F1 scores
    F1Macro,
}

impl ScoringMetric {
    /// Score predictions; `y_score` is the positive-class probability or decision value
    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
        match self {
            ScoringMetric::Accuracy => accuracy(y_true, y_pred),
            ScoringMetric::RocAuc => roc_auc(y_true, y_score),
            ScoringMetric::F1Macro => {
                let counts = ConfusionCounts::from_predictions(y_true, y_pred)?;
                Ok((counts.f1_positive() + counts.f1_negative()) / 2.0)
            }
        }
    }
}

/// Confusion matrix of a binary classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tn: usize,
    pub tp: usize,
    pub fn_: usize,
    pub fp: usize,
}

impl ConfusionCounts {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths("confusion", y_true, y_pred)?;
        let mut counts = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (true, false) => counts.fn_ += 1,
            }
        }
        Ok(counts)
    }

    pub fn total(&self) -> usize {
        self.tn + self.tp + self.fn_ + self.fp
    }

    fn f1_positive(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }

    fn f1_negative(&self) -> f64 {
        ratio(2 * self.tn, 2 * self.tn + self.fn_ + self.fp)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Generalization metric block written for every candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Half-width of the normal-approximation 95% confidence interval on accuracy
    pub acc_95_ci: f64,
    /// Matthews correlation coefficient
    pub mcc: f64,
    pub auc: f64,
    pub avg_sn_sp: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub ppv: f64,
    pub npv: f64,
    pub f1: f64,
    pub counts: ConfusionCounts,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, y_score: &Array1<f64>) -> Result<Self> {
        let counts = ConfusionCounts::from_predictions(y_true, y_pred)?;
        let n = counts.total();
        if n == 0 {
            return Err(SweepError::evaluation("generalization", "empty split"));
        }

        let accuracy = ratio(counts.tp + counts.tn, n);
        let sensitivity = ratio(counts.tp, counts.tp + counts.fn_);
        let specificity = ratio(counts.tn, counts.tn + counts.fp);

        let (tp, tn, fp, fn_) = (
            counts.tp as f64,
            counts.tn as f64,
            counts.fp as f64,
            counts.fn_ as f64,
        );
        let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        let mcc = if denom > 0.0 { (tp * tn - fp * fn_) / denom } else { 0.0 };

        Ok(Self {
            accuracy,
            acc_95_ci: 1.96 * (accuracy * (1.0 - accuracy) / n as f64).sqrt(),
            mcc,
            auc: roc_auc(y_true, y_score)?,
            avg_sn_sp: (sensitivity + specificity) / 2.0,
            sensitivity,
            specificity,
            ppv: ratio(counts.tp, counts.tp + counts.fp),
            npv: ratio(counts.tn, counts.tn + counts.fn_),
            f1: counts.f1_positive(),
            counts,
        })
    }

    /// Ordered `(column, value)` pairs, same keys for every model type
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        vec![
            ("accuracy", self.accuracy.to_string()),
            ("acc_95_ci", self.acc_95_ci.to_string()),
            ("mcc", self.mcc.to_string()),
            ("auc", self.auc.to_string()),
            ("avg_sn_sp", self.avg_sn_sp.to_string()),
            ("sensitivity", self.sensitivity.to_string()),
            ("specificity", self.specificity.to_string()),
            ("ppv", self.ppv.to_string()),
            ("npv", self.npv.to_string()),
            ("f1", self.f1.to_string()),
            ("tn", self.counts.tn.to_string()),
            ("tp", self.counts.tp.to_string()),
            ("fn", self.counts.fn_.to_string()),
            ("fp", self.counts.fp.to_string()),
        ]
    }
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths("accuracy", y_true, y_pred)?;
    if y_true.is_empty() {
        return Err(SweepError::evaluation("accuracy", "empty split"));
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t > &0.5) == (*p > &0.5))
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Area under the ROC curve by the trapezoidal rule
pub fn roc_auc(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
    let curve = roc_curve(y_true, y_score)?;
    Ok(curve
        .fpr
        .windows(2)
        .zip(curve.tpr.windows(2))
        .map(|(f, t)| (f[1] - f[0]) * (t[1] + t[0]) / 2.0)
        .sum())
}

fn check_lengths(metric: &str, a: &Array1<f64>, b: &Array1<f64>) -> Result<()> {
    if a.len() != b.len() {
        return Err(SweepError::evaluation(
            metric,
            format!("length mismatch: {} labels vs {} predictions", a.len(), b.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let y_score = array![0.9, 0.1, 0.8, 0.4, 0.2, 0.7, 0.6, 0.3];

        let m = ClassificationMetrics::compute(&y_true, &y_pred, &y_score).unwrap();
        assert_eq!(m.counts, ConfusionCounts { tn: 3, tp: 3, fn_: 1, fp: 1 });
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        assert!((m.sensitivity - 0.75).abs() < 1e-12);
        assert!((m.specificity - 0.75).abs() < 1e-12);
        assert!((m.mcc - 0.5).abs() < 1e-12);
        assert!((m.f1 - 0.75).abs() < 1e-12);
        assert!(m.auc > 0.9);
    }

    #[test]
    fn test_columns_are_stable() {
        let y = array![0.0, 1.0];
        let a = ClassificationMetrics::compute(&y, &y, &y).unwrap();
        let b = ClassificationMetrics::compute(&y, &array![1.0, 1.0], &array![0.5, 0.5]).unwrap();
        let keys_a: Vec<_> = a.columns().into_iter().map(|(k, _)| k).collect();
        let keys_b: Vec<_> = b.columns().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys_a, keys_b);
        assert_eq!(keys_a.len(), 14);
    }

    #[test]
    fn test_roc_auc_perfect_and_random() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert!((roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]).unwrap() - 1.0).abs() < 1e-12);
        assert!((roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_f1_macro() {
        let y_true = array![1.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 0.0, 0.0];
        let s = ScoringMetric::F1Macro.score(&y_true, &y_pred, &y_pred).unwrap();
        // positive F1 = 2/3, negative F1 = 0.8
        assert!((s - (2.0 / 3.0 + 0.8) / 2.0).abs() < 1e-12);
    }
}
