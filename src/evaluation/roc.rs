//! Receiver operating characteristic

use crate::error::{Result, SweepError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// False/true positive rate sequences, one point per distinct score threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Compute the ROC curve of positive-class scores.
///
/// Thresholds run from the highest score down; the curve starts at (0, 0) and
/// ends at (1, 1), so both rates are non-decreasing.
pub fn roc_curve(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<RocCurve> {
    if y_true.len() != y_score.len() {
        return Err(SweepError::evaluation(
            "roc",
            format!("{} labels vs {} scores", y_true.len(), y_score.len()),
        ));
    }
    if y_score.iter().any(|s| !s.is_finite()) {
        return Err(SweepError::evaluation("roc", "non-finite score"));
    }

    let positives = y_true.iter().filter(|&&y| y > 0.5).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(SweepError::evaluation("roc", "split must contain both classes"));
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| {
        y_score[b]
            .partial_cmp(&y_score[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    let (mut tp, mut fp) = (0usize, 0usize);

    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] > 0.5 {
            tp += 1;
        } else {
            fp += 1;
        }
        // Emit a point only after the last sample sharing this score
        let last_of_run = order
            .get(pos + 1)
            .map_or(true, |&next| y_score[next] != y_score[i]);
        if last_of_run {
            fpr.push(fp as f64 / negatives as f64);
            tpr.push(tp as f64 / positives as f64);
            thresholds.push(y_score[i]);
        }
    }

    Ok(RocCurve { fpr, tpr, thresholds })
}
