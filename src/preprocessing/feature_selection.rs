//! Subset-selection feature reduction
//!
//! Two families are provided:
//! - Univariate percentile selection on ANOVA F-values, exposing a boolean support mask
//! - Mutual information ranking, exposing the top features as explicit rankings
//!
//! Both drop columns before fitting, so they never appear as a pipeline step.

use crate::error::{Result, SweepError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Feature selection method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SelectionMethod {
    /// Keep the given percentile of features ranked by ANOVA F-value
    Percentile { percentile: f64 },
    /// Keep the given percentile of features ranked by mutual information
    MutualInformation { percentile: f64 },
}

/// Feature selector fitted on the training split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    method: SelectionMethod,
    feature_scores: Option<Vec<f64>>,
    /// Selected indices, best first
    ranking: Option<Vec<usize>>,
    n_features_in: Option<usize>,
}

impl FeatureSelector {
    /// Create a new feature selector with the given method
    pub fn new(method: SelectionMethod) -> Self {
        Self {
            method,
            feature_scores: None,
            ranking: None,
            n_features_in: None,
        }
    }

    /// Create percentile selector
    pub fn percentile(percentile: f64) -> Self {
        Self::new(SelectionMethod::Percentile {
            percentile: percentile.clamp(0.0, 100.0),
        })
    }

    /// Create mutual information selector
    pub fn mutual_information(percentile: f64) -> Self {
        Self::new(SelectionMethod::MutualInformation {
            percentile: percentile.clamp(0.0, 100.0),
        })
    }

    /// Fit the selector to data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_features = x.ncols();
        if n_features == 0 {
            return Err(SweepError::Fit("no features to select from".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(SweepError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let (scores, percentile) = match self.method {
            SelectionMethod::Percentile { percentile } => (Self::f_scores(x, y), percentile),
            SelectionMethod::MutualInformation { percentile } => {
                let scores = x
                    .axis_iter(Axis(1))
                    .map(|col| Self::compute_mutual_information(col, y.view()))
                    .collect();
                (scores, percentile)
            }
        };

        let k = ((n_features as f64 * percentile / 100.0).round() as usize).clamp(1, n_features);

        // Stable sort keeps declaration order among tied scores
        let mut indexed: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        self.ranking = Some(indexed.into_iter().take(k).map(|(i, _)| i).collect());
        self.feature_scores = Some(scores);
        self.n_features_in = Some(n_features);
        Ok(())
    }

    /// Boolean support mask over the input features
    pub fn support_mask(&self) -> Option<Vec<bool>> {
        let ranking = self.ranking.as_ref()?;
        let mut mask = vec![false; self.n_features_in?];
        for &i in ranking {
            mask[i] = true;
        }
        Some(mask)
    }

    /// Selected feature indices ordered from most to least important
    pub fn top_features(&self) -> Option<&[usize]> {
        self.ranking.as_deref()
    }

    /// Get feature scores
    pub fn scores(&self) -> Option<&[f64]> {
        self.feature_scores.as_deref()
    }

    /// ANOVA F-value of each feature against the class label
    fn f_scores(x: &Array2<f64>, y: &Array1<f64>) -> Vec<f64> {
        let mut groups: HashMap<i64, Vec<usize>> = HashMap::new();
        for (i, &label) in y.iter().enumerate() {
            groups.entry(label.round() as i64).or_default().push(i);
        }
        let n = y.len() as f64;
        let k = groups.len() as f64;

        x.axis_iter(Axis(1))
            .map(|col| {
                if k < 2.0 || n <= k {
                    return 0.0;
                }
                let grand_mean = col.sum() / n;
                let mut ss_between = 0.0;
                let mut ss_within = 0.0;
                for indices in groups.values() {
                    let m = indices.len() as f64;
                    let mean = indices.iter().map(|&i| col[i]).sum::<f64>() / m;
                    ss_between += m * (mean - grand_mean).powi(2);
                    ss_within += indices.iter().map(|&i| (col[i] - mean).powi(2)).sum::<f64>();
                }
                let ms_between = ss_between / (k - 1.0);
                let ms_within = ss_within / (n - k);
                if ms_within > 0.0 {
                    ms_between / ms_within
                } else if ms_between > 0.0 {
                    f64::MAX
                } else {
                    0.0
                }
            })
            .collect()
    }

    // Compute mutual information between two variables (accepts views, no allocation)
    fn compute_mutual_information(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        let n = x.len() as f64;
        if n < 2.0 {
            return 0.0;
        }

        // Discretize continuous variables into bins
        let n_bins = (n.sqrt() as usize).clamp(2, 20);

        let x_bins = Self::discretize(x, n_bins);
        let y_bins = Self::discretize(y, n_bins);

        let mut joint_counts: HashMap<(usize, usize), usize> = HashMap::new();
        let mut x_counts: HashMap<usize, usize> = HashMap::new();
        let mut y_counts: HashMap<usize, usize> = HashMap::new();

        for (&xb, &yb) in x_bins.iter().zip(y_bins.iter()) {
            *joint_counts.entry((xb, yb)).or_insert(0) += 1;
            *x_counts.entry(xb).or_insert(0) += 1;
            *y_counts.entry(yb).or_insert(0) += 1;
        }

        let mut mi = 0.0;
        for (&(xb, yb), &count) in &joint_counts {
            let p_xy = count as f64 / n;
            let p_x = x_counts.get(&xb).copied().unwrap_or(0) as f64 / n;
            let p_y = y_counts.get(&yb).copied().unwrap_or(0) as f64 / n;

            if p_xy > 0.0 && p_x > 0.0 && p_y > 0.0 {
                mi += p_xy * (p_xy / (p_x * p_y)).ln();
            }
        }

        mi.max(0.0)
    }

    fn discretize(x: ArrayView1<f64>, n_bins: usize) -> Vec<usize> {
        let min_val = x.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_val = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let range = max_val - min_val;
        if range <= 0.0 {
            return vec![0; x.len()];
        }

        let bin_width = range / n_bins as f64;
        x.iter()
            .map(|&v| (((v - min_val) / bin_width) as usize).min(n_bins - 1))
            .collect()
    }
}

/// Copy the given columns of `x` into a new matrix, in the given order
pub fn select_columns(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(1), indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn informative_data() -> (Array2<f64>, Array1<f64>) {
        // Column 1 separates the classes, columns 0 and 2 are noise
        let x = array![
            [0.3, 0.0, 5.0],
            [0.1, 0.2, 4.0],
            [0.4, 0.1, 5.5],
            [0.2, 0.3, 4.5],
            [0.3, 5.0, 5.0],
            [0.1, 5.2, 4.0],
            [0.4, 5.1, 5.5],
            [0.2, 5.3, 4.5],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_percentile_support_mask() {
        let (x, y) = informative_data();
        let mut selector = FeatureSelector::percentile(34.0);
        selector.fit(&x, &y).unwrap();

        let mask = selector.support_mask().unwrap();
        assert_eq!(mask, vec![false, true, false]);
    }

    #[test]
    fn test_mutual_information_ranking() {
        let (x, y) = informative_data();
        let mut selector = FeatureSelector::mutual_information(34.0);
        selector.fit(&x, &y).unwrap();

        assert_eq!(selector.top_features().unwrap()[0], 1);
        assert_eq!(selector.scores().unwrap().len(), 3);
    }

    #[test]
    fn test_keeps_at_least_one_feature() {
        let (x, y) = informative_data();
        let mut selector = FeatureSelector::percentile(0.0);
        selector.fit(&x, &y).unwrap();
        assert_eq!(selector.top_features().unwrap().len(), 1);
    }

    #[test]
    fn test_select_columns() {
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let out = select_columns(&x, &[2, 0]);
        assert_eq!(out, array![[3.0, 1.0], [6.0, 4.0]]);
    }
}
