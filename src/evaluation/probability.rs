//! Positive-class probability derivation shared by ROC and reliability

use crate::training::ScoreOutput;
use ndarray::Array1;

/// Positive-class probabilities from a model's score output.
///
/// Probability output is used as is. A decision score is min-max rescaled to [0, 1];
/// when every score is equal the result is all zeros.
pub fn positive_probabilities(output: ScoreOutput) -> Array1<f64> {
    match output {
        ScoreOutput::Probability(p) => p,
        ScoreOutput::Decision(scores) => rescale(&scores),
    }
}

fn rescale(scores: &Array1<f64>) -> Array1<f64> {
    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if scores.is_empty() || range == 0.0 || !range.is_finite() {
        return Array1::zeros(scores.len());
    }
    scores.mapv(|s| (s - min) / range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_probability_passes_through() {
        let p = array![0.2, 0.9];
        assert_eq!(positive_probabilities(ScoreOutput::Probability(p.clone())), p);
    }

    #[test]
    fn test_decision_is_rescaled() {
        let out = positive_probabilities(ScoreOutput::Decision(array![-2.0, 0.0, 2.0]));
        assert_eq!(out, array![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_constant_decision_maps_to_zeros() {
        let out = positive_probabilities(ScoreOutput::Decision(array![3.5, 3.5, 3.5]));
        assert_eq!(out, array![0.0, 0.0, 0.0]);
    }
}
