//! Reliability curve and Brier score

use crate::error::{Result, SweepError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Number of uniform-width probability bins
pub const N_BINS: usize = 10;

/// Reliability diagram data for one split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reliability {
    /// Fraction of positives in each non-empty bin
    pub fop: Vec<f64>,
    /// Mean predicted probability in each non-empty bin
    pub mpv: Vec<f64>,
    pub brier_score: f64,
}

/// Round to 4 decimal places
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Compute the reliability curve with [`N_BINS`] uniform bins over [0, 1].
///
/// A probability falls in bin `i` when it lies in `(i/10, (i+1)/10]`, the first bin
/// also taking 0. Empty bins are omitted. Every value is rounded to 4 decimals.
pub fn reliability(probs: &Array1<f64>, labels: &Array1<f64>) -> Result<Reliability> {
    if probs.len() != labels.len() {
        return Err(SweepError::evaluation(
            "reliability",
            "probabilities and labels must have same length",
        ));
    }
    if probs.is_empty() {
        return Err(SweepError::evaluation("reliability", "empty split"));
    }
    if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(SweepError::evaluation(
            "reliability",
            "probabilities must lie in [0, 1]",
        ));
    }

    let inner_edges: Vec<f64> = (1..N_BINS).map(|i| i as f64 / N_BINS as f64).collect();

    let mut bin_sums = [0.0; N_BINS];
    let mut bin_positives = [0.0; N_BINS];
    let mut bin_counts = [0usize; N_BINS];

    for (&p, &y) in probs.iter().zip(labels.iter()) {
        let bin_idx = inner_edges.iter().filter(|&&edge| edge < p).count();
        bin_sums[bin_idx] += p;
        bin_positives[bin_idx] += if y > 0.5 { 1.0 } else { 0.0 };
        bin_counts[bin_idx] += 1;
    }

    let mut fop = Vec::new();
    let mut mpv = Vec::new();
    for i in 0..N_BINS {
        if bin_counts[i] > 0 {
            let count = bin_counts[i] as f64;
            fop.push(round4(bin_positives[i] / count));
            mpv.push(round4(bin_sums[i] / count));
        }
    }

    Ok(Reliability {
        fop,
        mpv,
        brier_score: round4(brier_score(probs, labels)),
    })
}

/// Brier = (1/n) * sum_i (p_i - y_i)^2
pub fn brier_score(probs: &Array1<f64>, labels: &Array1<f64>) -> f64 {
    let n = probs.len().max(1) as f64;
    probs
        .iter()
        .zip(labels.iter())
        .map(|(&p, &y)| (p - if y > 0.5 { 1.0 } else { 0.0 }).powi(2))
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn has_at_most_4_decimals(v: f64) -> bool {
        ((v * 10_000.0).round() - v * 10_000.0).abs() < 1e-6
    }

    #[test]
    fn test_reliability_bins() {
        let probs = array![0.05, 0.1, 0.15, 0.95, 0.92];
        let labels = array![0.0, 0.0, 1.0, 1.0, 0.0];
        let r = reliability(&probs, &labels).unwrap();

        // 0.05 and 0.1 share the first bin, 0.15 the second, both 0.9x the last
        assert_eq!(r.mpv, vec![0.075, 0.15, 0.935]);
        assert_eq!(r.fop, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_rounding_to_four_decimals() {
        let probs = array![0.123456, 0.234567, 0.765432, 0.876543, 0.333333];
        let labels = array![0.0, 1.0, 1.0, 0.0, 1.0];
        let r = reliability(&probs, &labels).unwrap();

        assert!(has_at_most_4_decimals(r.brier_score));
        for v in r.fop.iter().chain(r.mpv.iter()) {
            assert!(has_at_most_4_decimals(*v), "{} not rounded", v);
        }
        assert_eq!(round4(0.123456), 0.1235);
    }

    #[test]
    fn test_brier_score() {
        let probs = array![1.0, 0.0, 0.5];
        let labels = array![1.0, 0.0, 1.0];
        assert!((brier_score(&probs, &labels) - 0.25 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_probability() {
        assert!(reliability(&array![1.5], &array![1.0]).is_err());
    }
}
