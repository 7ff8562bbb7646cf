//! Configuration space enumeration
//!
//! Crosses the registry's normalizers, feature reductions, model types and search
//! strategies (minus the job's exclusions) and then crosses every configuration with
//! the remaining scoring metrics.

use crate::config::SearchParameters;
use crate::error::{Result, SweepError};
use crate::optimizer::{SearchStrategy, SpaceOverrides};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Separator joining the parts of a candidate key
pub const KEY_SEPARATOR: &str = "__";

/// One pipeline configuration, by registry id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    pub normalizer: String,
    pub reduction: String,
    pub model: String,
    pub searcher: String,
}

impl PipelineConfiguration {
    pub fn new(
        normalizer: impl Into<String>,
        reduction: impl Into<String>,
        model: impl Into<String>,
        searcher: impl Into<String>,
    ) -> Self {
        Self {
            normalizer: normalizer.into(),
            reduction: reduction.into(),
            model: model.into(),
            searcher: searcher.into(),
        }
    }

    /// Candidate key of this configuration scored with `metric`
    pub fn candidate(&self, metric: &str) -> CandidateKey {
        CandidateKey {
            configuration: self.clone(),
            metric: metric.to_string(),
        }
    }
}

impl fmt::Display for PipelineConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.normalizer,
            self.reduction,
            self.model,
            self.searcher,
            sep = KEY_SEPARATOR
        )
    }
}

/// Report row identity: a configuration plus the metric it was tuned for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateKey {
    pub configuration: PipelineConfiguration,
    pub metric: String,
}

impl CandidateKey {
    /// Parse `normalizer__reduction__model__searcher__metric`
    pub fn parse(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [normalizer, reduction, model, searcher, metric] => Ok(Self {
                configuration: PipelineConfiguration::new(*normalizer, *reduction, *model, *searcher),
                metric: metric.to_string(),
            }),
            _ => Err(SweepError::Configuration(format!(
                "malformed candidate key '{}'",
                key
            ))),
        }
    }

    /// Human-readable description.
    ///
    /// The search phrase is left out when nothing was tuned, i.e. the searcher is
    /// `none` or the model type has no tunable hyperparameters.
    pub fn display_name(&self, registry: &Registry) -> Result<String> {
        let c = &self.configuration;
        let normalizer = registry.normalizer(&c.normalizer)?;
        let reduction = registry.reduction(&c.reduction)?;
        let model = registry.model(&c.model)?;
        let searcher = registry.searcher(&c.searcher)?;
        let metric = registry.metric(&self.metric)?;

        let search_phrase = if model.supports_tuning && searcher.strategy != SearchStrategy::None {
            format!(" using {} scored {}", metric.name, searcher.name)
        } else {
            String::new()
        };

        Ok(format!(
            "{} model{} with {} and with {}",
            capitalize(model.name),
            search_phrase,
            normalizer.name,
            reduction.name
        ))
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.configuration, KEY_SEPARATOR, self.metric)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Ordered configurations and the metrics each one is evaluated with
#[derive(Debug, Clone)]
pub struct CandidateSpace {
    pub configurations: Vec<PipelineConfiguration>,
    pub metrics: Vec<String>,
}

impl CandidateSpace {
    /// |configurations| x |metrics|
    pub fn total_candidates(&self) -> usize {
        self.configurations.len() * self.metrics.len()
    }

    /// Every candidate key, in report order
    pub fn candidates(&self) -> impl Iterator<Item = CandidateKey> + '_ {
        self.configurations
            .iter()
            .flat_map(move |c| self.metrics.iter().map(move |m| c.candidate(m)))
    }
}

/// Keep registry declaration order, dropping excluded ids
fn filter_axis<'a>(
    axis: &str,
    ids: impl Iterator<Item = &'a str>,
    excluded: &BTreeSet<String>,
) -> Vec<&'a str> {
    let ids: Vec<&str> = ids.collect();
    for unknown in excluded.iter().filter(|e| !ids.contains(&e.as_str())) {
        warn!(axis = axis, id = %unknown, "Ignoring exclusion of unknown id");
    }
    ids.into_iter()
        .filter(|id| !excluded.contains(*id))
        .collect()
}

/// Custom ranges must name a registered model
fn check_overrides(registry: &Registry, overrides: &SpaceOverrides) -> Result<()> {
    for (strategy, model_id) in overrides.model_ids() {
        match registry.models.iter().find(|d| d.id == model_id) {
            None => {
                return Err(SweepError::Configuration(format!(
                    "hyper_parameters.{} names unknown model '{}'",
                    strategy, model_id
                )))
            }
            Some(model) if !model.supports_tuning => {
                warn!(model = model_id, "Ignoring hyper_parameters for a model with nothing to tune");
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Enumerate the candidate space.
///
/// Order is model type (outermost), normalizer, reduction, searcher (innermost).
/// An empty product, an empty metric list or custom ranges for an unknown model
/// are configuration errors.
pub fn enumerate(registry: &Registry, params: &SearchParameters) -> Result<CandidateSpace> {
    check_overrides(registry, &params.hyper_parameters)?;
    let models = filter_axis("model", registry.models.iter().map(|d| d.id), &params.ignore_estimator);
    let normalizers = filter_axis(
        "normalizer",
        registry.normalizers.iter().map(|d| d.id),
        &params.ignore_scaler,
    );
    let reductions = filter_axis(
        "reduction",
        registry.reductions.iter().map(|d| d.id),
        &params.ignore_feature_selector,
    );
    let searchers = filter_axis(
        "searcher",
        registry.searchers.iter().map(|d| d.id),
        &params.ignore_searcher,
    );
    let metrics = filter_axis("metric", registry.metrics.iter().map(|d| d.id), &params.ignore_scorer);

    let mut configurations =
        Vec::with_capacity(models.len() * normalizers.len() * reductions.len() * searchers.len());
    for model in &models {
        for normalizer in &normalizers {
            for reduction in &reductions {
                for searcher in &searchers {
                    configurations.push(PipelineConfiguration::new(*normalizer, *reduction, *model, *searcher));
                }
            }
        }
    }

    if configurations.is_empty() {
        return Err(SweepError::Configuration(
            "no pipelines to run with the current exclusions".to_string(),
        ));
    }
    if metrics.is_empty() {
        return Err(SweepError::Configuration(
            "every scoring metric is excluded".to_string(),
        ));
    }

    Ok(CandidateSpace {
        configurations,
        metrics: metrics.into_iter().map(String::from).collect(),
    })
}

/// `(key, name)` of every candidate a job with these parameters would run
pub fn list_pipelines(registry: &Registry, params: &SearchParameters) -> Result<Vec<(String, String)>> {
    enumerate(registry, params)?
        .candidates()
        .map(|key| Ok((key.to_string(), key.display_name(registry)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn exclude(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_product_count() {
        let registry = Registry::standard();
        let space = enumerate(registry, &SearchParameters::default()).unwrap();
        let expected = registry.models.len()
            * registry.normalizers.len()
            * registry.reductions.len()
            * registry.searchers.len();
        assert_eq!(space.configurations.len(), expected);
        assert_eq!(space.total_candidates(), expected * registry.metrics.len());
    }

    #[test]
    fn test_overrides_for_unknown_model_rejected() {
        let registry = Registry::standard();
        let params = SearchParameters {
            hyper_parameters: SpaceOverrides::from_json(&serde_json::json!({"grid": {"xgb": {"depth": [2, 4]}}}))
                .unwrap(),
            ..Default::default()
        };
        let err = enumerate(registry, &params).unwrap_err();
        assert!(matches!(err, SweepError::Configuration(ref msg) if msg.contains("xgb")));

        let params = SearchParameters {
            hyper_parameters: SpaceOverrides::from_json(&serde_json::json!({
                "random": {"knn": {"n_neighbors": {"min": 1, "max": 5}}},
                "grid": {"nb": {"var_smoothing": [1e-9]}}
            }))
            .unwrap(),
            ..Default::default()
        };
        assert!(enumerate(registry, &params).is_ok());
    }

    #[test]
    fn test_keys_are_unique() {
        let space = enumerate(Registry::standard(), &SearchParameters::default()).unwrap();
        let keys: Vec<String> = space.candidates().map(|k| k.to_string()).collect();
        let unique: HashSet<&String> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_order_model_outermost() {
        let params = SearchParameters {
            ignore_estimator: exclude(&["knn", "svm"]),
            ignore_scaler: exclude(&["minmax", "maxabs", "robust"]),
            ignore_feature_selector: exclude(&[
                "select-75", "select-50", "select-25", "mi-75", "mi-50", "mi-25", "pca-80", "pca-90",
            ]),
            ignore_searcher: exclude(&["random"]),
            ..Default::default()
        };
        let space = enumerate(Registry::standard(), &params).unwrap();
        let keys: Vec<String> = space.configurations.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "none__none__lr__none",
                "none__none__lr__grid",
                "std__none__lr__none",
                "std__none__lr__grid",
                "none__none__nb__none",
                "none__none__nb__grid",
                "std__none__nb__none",
                "std__none__nb__grid",
            ]
        );
    }

    #[test]
    fn test_empty_product_is_configuration_error() {
        let params = SearchParameters {
            ignore_estimator: exclude(&["lr", "knn", "nb", "svm"]),
            ..Default::default()
        };
        let err = enumerate(Registry::standard(), &params).unwrap_err();
        assert!(matches!(err, SweepError::Configuration(_)));

        let params = SearchParameters {
            ignore_scorer: exclude(&["accuracy", "roc_auc", "f1_macro"]),
            ..Default::default()
        };
        assert!(enumerate(Registry::standard(), &params).is_err());
    }

    #[test]
    fn test_key_round_trip_and_names() {
        let registry = Registry::standard();
        let key = PipelineConfiguration::new("std", "pca-80", "lr", "grid").candidate("accuracy");
        assert_eq!(key.to_string(), "std__pca-80__lr__grid__accuracy");
        assert_eq!(CandidateKey::parse(&key.to_string()).unwrap(), key);

        let name = key.display_name(registry).unwrap();
        assert!(name.starts_with("Logistic regression model using accuracy scored grid search"));

        let nb = PipelineConfiguration::new("none", "none", "nb", "grid").candidate("accuracy");
        let name = nb.display_name(registry).unwrap();
        assert_eq!(name, "Naive Bayes model with no scaling and with all features");
    }

    #[test]
    fn test_list_pipelines() {
        let params = SearchParameters {
            ignore_estimator: exclude(&["knn", "svm", "nb"]),
            ignore_scaler: exclude(&["minmax", "maxabs", "robust", "std"]),
            ignore_searcher: exclude(&["grid", "random"]),
            ignore_scorer: exclude(&["roc_auc", "f1_macro"]),
            ..Default::default()
        };
        let listing = list_pipelines(Registry::standard(), &params).unwrap();
        assert_eq!(listing.len(), Registry::standard().reductions.len());
        assert_eq!(listing[0].0, "none__none__lr__none__accuracy");
    }
}
