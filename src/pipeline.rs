//! Pipeline builder
//!
//! A chain is an optional normalizer, an optional projection and a required model.
//! Subset-selection reductions are never chain steps: the caller drops the
//! unselected columns before fitting or transforming.

use crate::enumerator::PipelineConfiguration;
use crate::error::{Result, SweepError};
use crate::optimizer::HyperParameters;
use crate::preprocessing::{Pca, Scaler};
use crate::registry::{ReductionKind, Registry};
use crate::training::{Estimator, ScoreOutput};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Executable fit/transform/predict chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineChain {
    normalizer: Option<Scaler>,
    projection: Option<Pca>,
    estimator: Estimator,
    is_fitted: bool,
}

impl PipelineChain {
    /// Build an unfitted chain for one configuration.
    ///
    /// Unknown ids fail with a configuration error naming the id.
    pub fn build(
        registry: &Registry,
        configuration: &PipelineConfiguration,
        params: &HyperParameters,
        random_state: u64,
    ) -> Result<Self> {
        let normalizer = registry.normalizer(&configuration.normalizer)?;
        let reduction = registry.reduction(&configuration.reduction)?;
        let model = registry.model(&configuration.model)?;
        // Searcher ids are validated here even though the chain does not use them
        registry.searcher(&configuration.searcher)?;

        let projection = match reduction.kind {
            ReductionKind::Projection { variance_ratio } => {
                Some(Pca::new(variance_ratio).with_random_state(random_state))
            }
            ReductionKind::None | ReductionKind::Subset(_) => None,
        };

        let mut estimator = Estimator::new(model.kind);
        estimator.set_params(params)?;

        Ok(Self {
            normalizer: normalizer.scaler.map(Scaler::new),
            projection,
            estimator,
            is_fitted: false,
        })
    }

    /// Unfitted copy with different model hyperparameters
    pub fn with_params(&self, params: &HyperParameters) -> Result<Self> {
        let mut chain = Self {
            normalizer: self.normalizer.as_ref().map(|s| Scaler::new(s.scaler_type())),
            projection: self.projection.clone(),
            estimator: Estimator::new(self.estimator.kind()),
            is_fitted: false,
        };
        chain.estimator.set_params(params)?;
        Ok(chain)
    }

    /// Names of the steps in order
    pub fn step_names(&self) -> Vec<&'static str> {
        let mut steps = Vec::with_capacity(3);
        if self.normalizer.is_some() {
            steps.push("normalizer");
        }
        if self.projection.is_some() {
            steps.push("projection");
        }
        steps.push("estimator");
        steps
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit every step in order on the training matrix
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let mut current = Cow::Borrowed(x);
        if let Some(scaler) = self.normalizer.as_mut() {
            current = Cow::Owned(scaler.fit_transform(&current)?);
        }
        if let Some(pca) = self.projection.as_mut() {
            current = Cow::Owned(pca.fit_transform(&current)?);
        }
        self.estimator.fit(&current, y)?;
        self.is_fitted = true;
        Ok(self)
    }

    /// Run the preprocessing steps with their fitted parameters (never refits)
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(SweepError::ModelNotFitted);
        }
        let mut current = x.clone();
        if let Some(scaler) = &self.normalizer {
            current = scaler.transform(&current)?;
        }
        if let Some(pca) = &self.projection {
            current = pca.transform(&current)?;
        }
        Ok(current)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.estimator.predict(&self.transform(x)?)
    }

    pub fn score_output(&self, x: &Array2<f64>) -> Result<ScoreOutput> {
        self.estimator.score_output(&self.transform(x)?)
    }

    /// Class predictions and raw scores from a single transform pass
    pub fn predict_with_scores(&self, x: &Array2<f64>) -> Result<(Array1<f64>, ScoreOutput)> {
        let transformed = self.transform(x)?;
        Ok((
            self.estimator.predict(&transformed)?,
            self.estimator.score_output(&transformed)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 10.0, 1.0],
            [0.2, 11.0, 0.9],
            [0.1, 10.5, 1.1],
            [0.3, 10.2, 1.0],
            [2.0, 20.0, 1.0],
            [2.2, 21.0, 0.8],
            [2.1, 20.5, 1.2],
            [2.3, 20.2, 1.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_chain_steps() {
        let registry = Registry::standard();
        let params = HyperParameters::new();

        let chain = PipelineChain::build(
            registry,
            &PipelineConfiguration::new("std", "pca-80", "lr", "grid"),
            &params,
            0,
        )
        .unwrap();
        assert_eq!(chain.step_names(), vec!["normalizer", "projection", "estimator"]);

        // Subset selection never becomes a step
        let chain = PipelineChain::build(
            registry,
            &PipelineConfiguration::new("none", "select-50", "nb", "none"),
            &params,
            0,
        )
        .unwrap();
        assert_eq!(chain.step_names(), vec!["estimator"]);
    }

    #[test]
    fn test_unknown_id_is_named() {
        let err = PipelineChain::build(
            Registry::standard(),
            &PipelineConfiguration::new("zscore", "none", "lr", "none"),
            &HyperParameters::new(),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, SweepError::Configuration(ref m) if m.contains("zscore")));
    }

    #[test]
    fn test_fit_predict_through_chain() {
        let (x, y) = data();
        let mut chain = PipelineChain::build(
            Registry::standard(),
            &PipelineConfiguration::new("std", "pca-90", "knn", "none"),
            &HyperParameters::new(),
            1,
        )
        .unwrap();

        assert!(matches!(chain.predict(&x), Err(SweepError::ModelNotFitted)));
        chain.fit(&x, &y).unwrap();
        assert_eq!(chain.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_with_params() {
        let chain = PipelineChain::build(
            Registry::standard(),
            &PipelineConfiguration::new("none", "none", "knn", "grid"),
            &HyperParameters::new(),
            0,
        )
        .unwrap();
        let mut params = HyperParameters::new();
        params.insert("n_neighbors".into(), ParameterValue::Int(3));
        let tuned = chain.with_params(&params).unwrap();
        match tuned.estimator() {
            Estimator::Knn(knn) => assert_eq!(knn.n_neighbors, 3),
            other => panic!("unexpected estimator {:?}", other),
        }
    }
}
