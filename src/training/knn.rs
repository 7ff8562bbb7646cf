//! K-nearest neighbors classifier

use super::{param_usize, validate_training_data, ScoreOutput};
use crate::error::{Result, SweepError};
use crate::optimizer::HyperParameters;
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// Binary KNN classifier with euclidean distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KnnClassifier {
    fn default() -> Self {
        Self::with_k(5)
    }
}

impl KnnClassifier {
    pub fn with_k(k: usize) -> Self {
        Self {
            n_neighbors: k,
            weights: WeightScheme::Uniform,
            x_train: None,
            y_train: None,
        }
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    /// Apply `n_neighbors` and `weights` (`uniform` or `distance`)
    pub fn set_params(&mut self, params: &HyperParameters) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "n_neighbors" => {
                    let k = param_usize(name, value)?;
                    if k == 0 {
                        return Err(SweepError::InvalidParameter {
                            name: name.clone(),
                            value: value.to_string(),
                            reason: "must be at least 1".to_string(),
                        });
                    }
                    self.n_neighbors = k;
                }
                "weights" => {
                    self.weights = match value.as_str() {
                        Some("uniform") => WeightScheme::Uniform,
                        Some("distance") => WeightScheme::Distance,
                        _ => {
                            return Err(SweepError::InvalidParameter {
                                name: name.clone(),
                                value: value.to_string(),
                                reason: "expected 'uniform' or 'distance'".to_string(),
                            })
                        }
                    }
                }
                _ => return Err(super::linear_models::unknown_param("knn", name, value)),
            }
        }
        Ok(())
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Weighted share of positive neighbors for each row (parallelized over rows)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(SweepError::ModelNotFitted),
        };
        if x.ncols() != x_train.ncols() {
            return Err(SweepError::Shape {
                expected: format!("{} columns", x_train.ncols()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        // k larger than the training set degrades to using every sample
        let k = self.n_neighbors.min(x_train.nrows());
        let weights = self.weights;

        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k);
                positive_share(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(probs))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn score_output(&self, x: &Array2<f64>) -> Result<ScoreOutput> {
        Ok(ScoreOutput::Probability(self.predict_proba(x)?))
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &label) in x_train.rows().into_iter().zip(y_train.iter()) {
        let dist = point
            .iter()
            .zip(row.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        if heap.len() < k {
            heap.push(DistLabel(dist, label));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, label));
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn positive_share(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let mut positive = 0.0;
    let mut total = 0.0;
    for &(dist, label) in neighbors {
        let weight = match weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => 1.0 / (dist + 1e-10),
        };
        if label > 0.5 {
            positive += weight;
        }
        total += weight;
    }
    if total > 0.0 {
        positive / total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;
    use ndarray::array;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 1.0],
            [1.5, 1.2],
            [1.2, 1.5],
            [5.0, 5.0],
            [5.5, 5.2],
            [5.2, 5.5],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_knn_classifier() {
        let (x, y) = create_classification_data();
        let mut knn = KnnClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();

        let pred = knn.predict(&array![[1.1, 1.1], [5.1, 5.1]]).unwrap();
        assert_eq!(pred, array![0.0, 1.0]);
    }

    #[test]
    fn test_weighted_knn_probabilities() {
        let (x, y) = create_classification_data();
        let mut knn = KnnClassifier::with_k(6).with_weights(WeightScheme::Distance);
        knn.fit(&x, &y).unwrap();

        let proba = knn.predict_proba(&array![[5.0, 5.0]]).unwrap();
        assert!(proba[0] > 0.9);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let (x, y) = create_classification_data();
        let mut knn = KnnClassifier::with_k(30);
        knn.fit(&x, &y).unwrap();
        let proba = knn.predict_proba(&array![[0.0, 0.0]]).unwrap();
        assert!((proba[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_set_params() {
        let mut knn = KnnClassifier::default();
        let mut params = HyperParameters::new();
        params.insert("n_neighbors".into(), ParameterValue::Int(7));
        params.insert("weights".into(), ParameterValue::String("distance".into()));
        knn.set_params(&params).unwrap();
        assert_eq!(knn.n_neighbors, 7);
        assert_eq!(knn.weights, WeightScheme::Distance);

        let mut bad = HyperParameters::new();
        bad.insert("weights".into(), ParameterValue::String("gaussian".into()));
        assert!(knn.set_params(&bad).is_err());
    }
}
