//! Hyperparameter search spaces
//!
//! A search space is a list of sub-grids (each a set of named parameters); grid
//! search walks the cartesian product of every sub-grid in declaration order, random
//! search samples a sub-grid and then each of its parameters.

use crate::error::{Result, SweepError};
use crate::training::ModelKind;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hyperparameter-search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// Fit once with the model's defaults
    None,
    /// Exhaustive grid search
    Grid,
    /// Randomized search over distributions
    Random,
}

impl SearchStrategy {
    /// Key used for this strategy in `hyper_parameters` overrides
    pub fn key(&self) -> &'static str {
        match self {
            SearchStrategy::None => "none",
            SearchStrategy::Grid => "grid",
            SearchStrategy::Random => "random",
        }
    }
}

/// A concrete hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float (integers are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as a non-negative integer (integral floats are accepted)
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParameterValue::Int(v) if *v >= 0 => Some(*v as usize),
            ParameterValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// A resolved set of hyperparameters, ordered by name
pub type HyperParameters = BTreeMap<String, ParameterValue>;

/// Domain of a single parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Explicit list of values
    Choice(Vec<ParameterValue>),
    /// Continuous float range
    Float { low: f64, high: f64, log_scale: bool },
    /// Inclusive integer range
    Int { low: i64, high: i64 },
}

/// A single named hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a parameter from an explicit list of values
    pub fn choice(name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Choice(values),
        }
    }

    pub fn floats(name: impl Into<String>, values: &[f64]) -> Self {
        Self::choice(name, values.iter().map(|v| ParameterValue::Float(*v)).collect())
    }

    pub fn ints(name: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::choice(name, values.into_iter().map(ParameterValue::Int).collect())
    }

    pub fn strings(name: impl Into<String>, values: &[&str]) -> Self {
        Self::choice(
            name,
            values.iter().map(|v| ParameterValue::String(v.to_string())).collect(),
        )
    }

    /// Create a float range parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high, log_scale: false },
        }
    }

    /// Create a log-scale float range parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high, log_scale: true },
        }
    }

    /// Create an integer range parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Choice(values) => values[rng.gen_range(0..values.len())].clone(),
            ParameterType::Float { low, high, log_scale } => {
                let val = if *log_scale {
                    let log_low = low.ln();
                    let log_high = high.ln();
                    (rng.gen::<f64>() * (log_high - log_low) + log_low).exp()
                } else {
                    rng.gen::<f64>() * (high - low) + low
                };
                ParameterValue::Float(val)
            }
            ParameterType::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| SweepError::InvalidParameter {
            name: self.name.clone(),
            value: format!("{:?}", self.param_type),
            reason: reason.to_string(),
        };
        match &self.param_type {
            ParameterType::Choice(values) if values.is_empty() => Err(invalid("no values")),
            ParameterType::Float { low, high, log_scale } => {
                if !(low <= high) {
                    Err(invalid("low must not exceed high"))
                } else if *log_scale && *low <= 0.0 {
                    Err(invalid("log scale requires a positive range"))
                } else {
                    Ok(())
                }
            }
            ParameterType::Int { low, high } if low > high => Err(invalid("low must not exceed high")),
            _ => Ok(()),
        }
    }
}

/// Union of parameter sub-grids for one model type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    pub grids: Vec<Vec<Parameter>>,
}

impl SearchSpace {
    /// Space made of a single sub-grid
    pub fn single(params: Vec<Parameter>) -> Self {
        Self { grids: vec![params] }
    }

    pub fn is_empty(&self) -> bool {
        self.grids.iter().all(|g| g.is_empty())
    }

    /// Every point of every sub-grid, in declaration order.
    ///
    /// Only explicit value lists can be enumerated; ranges are rejected.
    pub fn grid_points(&self) -> Result<Vec<HyperParameters>> {
        let mut points = Vec::new();
        for grid in &self.grids {
            let mut partial: Vec<HyperParameters> = vec![HyperParameters::new()];
            for param in grid {
                param.validate()?;
                let values = match &param.param_type {
                    ParameterType::Choice(values) => values,
                    _ => {
                        return Err(SweepError::InvalidParameter {
                            name: param.name.clone(),
                            value: format!("{:?}", param.param_type),
                            reason: "grid search needs an explicit list of values".to_string(),
                        })
                    }
                };
                partial = partial
                    .into_iter()
                    .flat_map(|point| {
                        values.iter().map(move |v| {
                            let mut next = point.clone();
                            next.insert(param.name.clone(), v.clone());
                            next
                        })
                    })
                    .collect();
            }
            points.extend(partial);
        }
        Ok(points)
    }

    /// Draw `n_iter` parameter sets.
    ///
    /// A space made only of value lists with no more than `n_iter` points is returned
    /// in full instead, so small spaces are never sampled with repeats.
    pub fn sample(&self, n_iter: usize, rng: &mut impl Rng) -> Result<Vec<HyperParameters>> {
        for param in self.grids.iter().flatten() {
            param.validate()?;
        }
        let all_choices = self
            .grids
            .iter()
            .flatten()
            .all(|p| matches!(p.param_type, ParameterType::Choice(_)));
        if all_choices {
            let points = self.grid_points()?;
            if points.len() <= n_iter {
                return Ok(points);
            }
        }

        let grids: Vec<&Vec<Parameter>> = self.grids.iter().filter(|g| !g.is_empty()).collect();
        if grids.is_empty() {
            return Ok(vec![HyperParameters::new()]);
        }

        Ok((0..n_iter)
            .map(|_| {
                let grid = grids[rng.gen_range(0..grids.len())];
                grid.iter().map(|p| (p.name.clone(), p.sample(rng))).collect()
            })
            .collect())
    }

    /// Parse a user override.
    ///
    /// Accepts either one object or a list of objects (sub-grids). Each parameter is
    /// a list of values, or an object `{"min": .., "max": .., "log": bool}` describing
    /// a range (integer range when both bounds are integers).
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let objects: Vec<&serde_json::Map<String, serde_json::Value>> = match value {
            serde_json::Value::Object(map) => vec![map],
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_object().ok_or_else(|| {
                        SweepError::Configuration(format!(
                            "hyper_parameters sub-grid must be an object, got {}",
                            item
                        ))
                    })
                })
                .collect::<Result<_>>()?,
            other => {
                return Err(SweepError::Configuration(format!(
                    "hyper_parameters must be an object or a list, got {}",
                    other
                )))
            }
        };

        let grids = objects
            .into_iter()
            .map(|map| {
                map.iter()
                    .map(|(name, spec)| Self::parse_parameter(name, spec))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { grids })
    }

    fn parse_parameter(name: &str, spec: &serde_json::Value) -> Result<Parameter> {
        match spec {
            serde_json::Value::Array(values) => {
                let values = values
                    .iter()
                    .map(|v| serde_json::from_value::<ParameterValue>(v.clone()))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Parameter::choice(name, values))
            }
            serde_json::Value::Object(range) => {
                let low = range.get("min").ok_or_else(|| missing_bound(name, "min"))?;
                let high = range.get("max").ok_or_else(|| missing_bound(name, "max"))?;
                let log_scale = range.get("log").and_then(|v| v.as_bool()).unwrap_or(false);
                match (low.as_i64(), high.as_i64()) {
                    (Some(low), Some(high)) if !log_scale => Ok(Parameter::int(name, low, high)),
                    _ => {
                        let low = low.as_f64().ok_or_else(|| missing_bound(name, "min"))?;
                        let high = high.as_f64().ok_or_else(|| missing_bound(name, "max"))?;
                        Ok(if log_scale {
                            Parameter::log_float(name, low, high)
                        } else {
                            Parameter::float(name, low, high)
                        })
                    }
                }
            }
            scalar => {
                let value = serde_json::from_value::<ParameterValue>(scalar.clone())?;
                Ok(Parameter::choice(name, vec![value]))
            }
        }
    }
}

/// User-supplied search ranges, keyed by strategy then model id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceOverrides {
    pub grid: BTreeMap<String, SearchSpace>,
    pub random: BTreeMap<String, SearchSpace>,
}

impl SpaceOverrides {
    /// Parse `{"grid": {"<model>": {..}}, "random": {"<model>": {..}}}`; both keys optional
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            SweepError::Configuration("hyper_parameters must be a JSON object".to_string())
        })?;

        let mut overrides = Self::default();
        for (strategy, models) in map {
            let target = match strategy.as_str() {
                "grid" => &mut overrides.grid,
                "random" => &mut overrides.random,
                other => {
                    return Err(SweepError::Configuration(format!(
                        "hyper_parameters has unknown search strategy '{}'",
                        other
                    )))
                }
            };
            let models = models.as_object().ok_or_else(|| {
                SweepError::Configuration(format!(
                    "hyper_parameters.{} must map model ids to ranges",
                    strategy
                ))
            })?;
            for (model, space) in models {
                let space = SearchSpace::from_json(space)?;
                if !space.is_empty() {
                    target.insert(model.clone(), space);
                }
            }
        }
        Ok(overrides)
    }

    /// `(strategy, model id)` of every override
    pub fn model_ids(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.grid
            .keys()
            .map(|m| ("grid", m.as_str()))
            .chain(self.random.keys().map(|m| ("random", m.as_str())))
    }

    pub fn get(&self, strategy: SearchStrategy, model_id: &str) -> Option<&SearchSpace> {
        match strategy {
            SearchStrategy::Grid => self.grid.get(model_id),
            SearchStrategy::Random => self.random.get(model_id),
            SearchStrategy::None => None,
        }
    }
}

fn missing_bound(name: &str, bound: &str) -> SweepError {
    SweepError::Configuration(format!(
        "hyper_parameters range for '{}' needs a numeric '{}'",
        name, bound
    ))
}

/// Built-in search ranges for a model under a strategy.
///
/// `None` means the model has nothing to tune under that strategy.
pub fn default_space(strategy: SearchStrategy, model: ModelKind) -> Option<SearchSpace> {
    match (strategy, model) {
        (SearchStrategy::None, _) | (_, ModelKind::NaiveBayes) => None,

        (SearchStrategy::Grid, ModelKind::LogisticRegression) => Some(SearchSpace::single(vec![
            Parameter::floats("C", &[0.01, 0.1, 1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 100.0]),
            Parameter::ints("max_iter", [100, 200, 500]),
        ])),
        (SearchStrategy::Grid, ModelKind::Knn) => Some(SearchSpace {
            grids: vec![
                vec![
                    Parameter::ints("n_neighbors", 1..=30),
                    Parameter::strings("weights", &["uniform"]),
                ],
                vec![
                    Parameter::ints("n_neighbors", 1..=30),
                    Parameter::strings("weights", &["distance"]),
                ],
            ],
        }),
        (SearchStrategy::Grid, ModelKind::LinearSvm) => Some(SearchSpace::single(vec![
            Parameter::floats("C", &[0.1, 1.0, 10.0, 100.0, 1000.0]),
            Parameter::ints("max_iter", [500, 1000]),
        ])),

        (SearchStrategy::Random, ModelKind::LogisticRegression) => Some(SearchSpace::single(vec![
            Parameter::log_float("C", 0.01, 100.0),
            Parameter::ints("max_iter", [100, 200, 500]),
        ])),
        (SearchStrategy::Random, ModelKind::Knn) => Some(SearchSpace::single(vec![
            Parameter::int("n_neighbors", 1, 30),
            Parameter::strings("weights", &["uniform", "distance"]),
        ])),
        (SearchStrategy::Random, ModelKind::LinearSvm) => Some(SearchSpace::single(vec![
            Parameter::int("C", 1, 20),
            Parameter::ints("max_iter", [500, 1000]),
        ])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_grid_points_cartesian_order() {
        let space = SearchSpace::single(vec![
            Parameter::floats("C", &[0.1, 1.0]),
            Parameter::ints("max_iter", [100, 200]),
        ]);
        let points = space.grid_points().unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0]["C"], ParameterValue::Float(0.1));
        assert_eq!(points[0]["max_iter"], ParameterValue::Int(100));
        assert_eq!(points[1]["max_iter"], ParameterValue::Int(200));
        assert_eq!(points[3]["C"], ParameterValue::Float(1.0));
    }

    #[test]
    fn test_default_knn_grid_has_both_weightings() {
        let space = default_space(SearchStrategy::Grid, ModelKind::Knn).unwrap();
        assert_eq!(space.grid_points().unwrap().len(), 60);
        assert!(default_space(SearchStrategy::Grid, ModelKind::NaiveBayes).is_none());
        assert!(default_space(SearchStrategy::None, ModelKind::Knn).is_none());
    }

    #[test]
    fn test_grid_rejects_ranges() {
        let space = SearchSpace::single(vec![Parameter::float("C", 0.1, 10.0)]);
        assert!(space.grid_points().is_err());
    }

    #[test]
    fn test_random_sampling_within_bounds() {
        let space = default_space(SearchStrategy::Random, ModelKind::Knn).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let samples = space.sample(10, &mut rng).unwrap();
        assert_eq!(samples.len(), 10);
        for s in samples {
            let k = s["n_neighbors"].as_usize().unwrap();
            assert!((1..=30).contains(&k));
        }
    }

    #[test]
    fn test_small_choice_space_is_not_resampled() {
        let space = SearchSpace::single(vec![Parameter::strings("weights", &["uniform", "distance"])]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(space.sample(10, &mut rng).unwrap().len(), 2);
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({
            "C": [0.5, 1, 2],
            "n_neighbors": {"min": 1, "max": 5},
            "alpha": {"min": 0.001, "max": 1.0, "log": true}
        });
        let space = SearchSpace::from_json(&json).unwrap();
        assert_eq!(space.grids.len(), 1);
        let grid = &space.grids[0];
        let c = grid.iter().find(|p| p.name == "C").unwrap();
        assert_eq!(
            c.param_type,
            ParameterType::Choice(vec![
                ParameterValue::Float(0.5),
                ParameterValue::Int(1),
                ParameterValue::Int(2)
            ])
        );
        let k = grid.iter().find(|p| p.name == "n_neighbors").unwrap();
        assert_eq!(k.param_type, ParameterType::Int { low: 1, high: 5 });

        assert!(SearchSpace::from_json(&serde_json::json!("nope")).is_err());
    }

    #[test]
    fn test_space_overrides() {
        let json = serde_json::json!({
            "grid": {"lr": {"C": [1, 10]}},
            "random": {"knn": {"n_neighbors": {"min": 1, "max": 3}}, "svm": {}}
        });
        let overrides = SpaceOverrides::from_json(&json).unwrap();
        assert!(overrides.get(SearchStrategy::Grid, "lr").is_some());
        assert!(overrides.get(SearchStrategy::Grid, "knn").is_none());
        assert!(overrides.get(SearchStrategy::Random, "knn").is_some());
        // empty objects fall back to the defaults
        assert!(overrides.get(SearchStrategy::Random, "svm").is_none());

        assert!(SpaceOverrides::from_json(&serde_json::json!({"bayes": {}})).is_err());
    }
}
