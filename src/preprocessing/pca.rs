//! PCA projection step
//!
//! Keeps the smallest number of principal components whose cumulative explained
//! variance reaches the configured ratio. Eigenvectors of the covariance matrix are
//! found by power iteration with deflation.

use crate::error::{Result, SweepError};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const MAX_ITER: usize = 300;
const TOL: f64 = 1e-10;

/// Fitted principal component projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    variance_ratio: f64,
    random_state: u64,
    means: Option<Array1<f64>>,
    /// n_components x n_features
    components: Option<Array2<f64>>,
    explained_variance_ratio: Vec<f64>,
}

impl Pca {
    /// Create a projection keeping `variance_ratio` (0, 1] of the total variance
    pub fn new(variance_ratio: f64) -> Self {
        Self {
            variance_ratio: variance_ratio.clamp(f64::EPSILON, 1.0),
            random_state: 42,
            means: None,
            components: None,
            explained_variance_ratio: Vec::new(),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_components(&self) -> usize {
        self.components.as_ref().map(|c| c.nrows()).unwrap_or(0)
    }

    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }

    /// Fit the projection on training data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let (n, d) = x.dim();
        if n < 2 {
            return Err(SweepError::Fit("PCA requires at least 2 samples".to_string()));
        }
        if d < 1 {
            return Err(SweepError::Fit("PCA requires at least 1 feature".to_string()));
        }

        let means = x.mean_axis(Axis(0)).ok_or(SweepError::ModelNotFitted)?;
        let centered = x - &means;
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        let total_variance: f64 = cov.diag().sum();

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut work = cov;
        let mut components: Vec<Array1<f64>> = Vec::new();
        let mut ratios = Vec::new();
        let mut cumulative = 0.0;

        for _ in 0..d {
            let (eigenvalue, v) = Self::leading_eigenpair(&work, &mut rng);
            let ratio = if total_variance > 0.0 {
                eigenvalue / total_variance
            } else {
                0.0
            };

            // Deflate: A = A - lambda * v * v^T
            for i in 0..d {
                for j in 0..d {
                    work[[i, j]] -= eigenvalue * v[i] * v[j];
                }
            }

            components.push(v);
            ratios.push(ratio);
            cumulative += ratio;

            if cumulative >= self.variance_ratio - 1e-12 || total_variance <= 0.0 {
                break;
            }
        }

        let k = components.len();
        let mut matrix = Array2::zeros((k, d));
        for (i, component) in components.iter().enumerate() {
            matrix.row_mut(i).assign(component);
        }

        self.means = Some(means);
        self.components = Some(matrix);
        self.explained_variance_ratio = ratios;
        Ok(self)
    }

    /// Project data onto the fitted components
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, components) = match (&self.means, &self.components) {
            (Some(m), Some(c)) => (m, c),
            _ => return Err(SweepError::ModelNotFitted),
        };
        if x.ncols() != means.len() {
            return Err(SweepError::Shape {
                expected: format!("{} columns", means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok((x - means).dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn leading_eigenpair(a: &Array2<f64>, rng: &mut ChaCha8Rng) -> (f64, Array1<f64>) {
        let d = a.nrows();
        let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let norm = v.dot(&v).sqrt().max(1e-12);
        v /= norm;

        let mut eigenvalue = 0.0f64;
        for _ in 0..MAX_ITER {
            let w = a.dot(&v);
            let new_eigenvalue = v.dot(&w);
            let w_norm = w.dot(&w).sqrt();
            if w_norm < 1e-12 {
                eigenvalue = 0.0;
                break;
            }
            let new_v = w / w_norm;
            let diff = (&new_v - &v).mapv(|x| x * x).sum().sqrt();

            v = new_v;
            eigenvalue = new_eigenvalue;
            if diff < TOL {
                break;
            }
        }

        (eigenvalue.max(0.0), v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pca_linear_data_needs_one_component() {
        // Perfectly linear data: the first component explains all variance
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];

        let mut pca = Pca::new(0.9);
        let projected = pca.fit_transform(&x).unwrap();

        assert_eq!(pca.n_components(), 1);
        assert_eq!(projected.dim(), (5, 1));
        assert!(pca.explained_variance_ratio()[0] > 0.95);
    }

    #[test]
    fn test_pca_full_variance_keeps_all_components() {
        let x = array![
            [1.0, 0.0, 0.5],
            [0.0, 1.0, 0.3],
            [1.0, 1.0, 0.8],
            [0.5, 0.5, 0.4],
            [0.2, 0.8, 0.6],
            [0.9, 0.1, 0.2],
        ];
        let mut pca = Pca::new(1.0);
        pca.fit(&x).unwrap();
        assert!(pca.n_components() >= 2);
        let total: f64 = pca.explained_variance_ratio().iter().sum();
        assert!(total > 0.0 && total <= 1.001);
    }

    #[test]
    fn test_pca_too_few_samples() {
        let mut pca = Pca::new(0.8);
        assert!(pca.fit(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_pca_transform_requires_fit() {
        let pca = Pca::new(0.8);
        assert!(matches!(pca.transform(&array![[1.0]]), Err(SweepError::ModelNotFitted)));
    }
}
