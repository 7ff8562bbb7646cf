//! Feature scaling (normalizer step of a pipeline chain)

use crate::error::{Result, SweepError};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
}

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean, min, or median
    scale: f64,  // std, range, or IQR
}

/// Column-wise feature scaler over dense matrices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fit the scaler to every column of `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(SweepError::Fit("cannot fit scaler on an empty matrix".to_string()));
        }

        self.params = x
            .axis_iter(Axis(1))
            .map(|column| self.compute_params(column))
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(SweepError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(SweepError::Shape {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut result = x.clone();
        for (mut column, params) in result.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            column.mapv_inplace(|v| (v - params.center) / params.scale);
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn compute_params(&self, column: ArrayView1<f64>) -> ScalerParams {
        match self.scaler_type {
            ScalerType::Standard => {
                let n = column.len() as f64;
                let mean = column.sum() / n;
                // Population std, matching the usual standardization convention
                let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                }
            }
            ScalerType::MinMax => {
                let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                }
            }
            ScalerType::Robust => {
                let mut sorted: Vec<f64> = column.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let median = quantile(&sorted, 0.5);
                let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
                ScalerParams {
                    center: median,
                    scale: if iqr == 0.0 { 1.0 } else { iqr },
                }
            }
            ScalerType::MaxAbs => {
                let max_abs = column.iter().map(|x| x.abs()).fold(0.0f64, f64::max);
                ScalerParams {
                    center: 0.0,
                    scale: if max_abs == 0.0 { 1.0 } else { max_abs },
                }
            }
        }
    }
}

/// Linear-interpolated quantile of pre-sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0], [5.0, 10.0]];

        let mut scaler = Scaler::new(ScalerType::Standard);
        let result = scaler.fit_transform(&x).unwrap();

        let mean = result.column(0).mean().unwrap();
        assert!(mean.abs() < 1e-10); // Mean should be ~0
        // Constant column keeps unit scale instead of dividing by zero
        assert!(result.column(1).iter().all(|v| v.abs() < 1e-10));
    }

    #[test]
    fn test_minmax_scaler() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];

        let mut scaler = Scaler::new(ScalerType::MinMax);
        let result = scaler.fit_transform(&x).unwrap();

        assert!((result[[0, 0]] - 0.0).abs() < 1e-10);
        assert!((result[[4, 0]] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_robust_and_maxabs() {
        let x = array![[-4.0], [1.0], [2.0], [3.0], [100.0]];

        let mut robust = Scaler::new(ScalerType::Robust);
        let r = robust.fit_transform(&x).unwrap();
        assert!(r[[2, 0]].abs() < 1e-10); // median maps to 0

        let mut maxabs = Scaler::new(ScalerType::MaxAbs);
        let m = maxabs.fit_transform(&x).unwrap();
        assert!((m[[4, 0]] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_uses_training_params() {
        let train = array![[0.0], [10.0]];
        let test = array![[20.0]];

        let mut scaler = Scaler::new(ScalerType::MinMax);
        scaler.fit(&train).unwrap();
        let out = scaler.transform(&test).unwrap();
        assert!((out[[0, 0]] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_unfitted_and_shape_errors() {
        let scaler = Scaler::new(ScalerType::Standard);
        assert!(matches!(scaler.transform(&array![[1.0]]), Err(SweepError::ModelNotFitted)));

        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }
}
