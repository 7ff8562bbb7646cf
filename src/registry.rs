//! Capability registry
//!
//! Every normalizer, feature-reduction strategy, model type, search strategy and
//! scoring metric a sweep can use is declared here once, with the capabilities the
//! sweep needs to know about. Declaration order is the default enumeration order.

use crate::error::{Result, SweepError};
use crate::evaluation::ScoringMetric;
use crate::optimizer::SearchStrategy;
use crate::preprocessing::{ScalerType, SelectionMethod};
use crate::training::ModelKind;
use serde::Serialize;
use std::sync::OnceLock;

/// How a reduction strategy reports which input features it kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportanceKind {
    /// Boolean support mask over the input features
    Mask,
    /// Explicit top-k ranking of feature indices
    Ranked,
    /// Every input feature is reported as selected
    None,
}

/// What a reduction strategy does to the feature matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ReductionKind {
    /// Pass-through
    None,
    /// Drop columns before fitting; never part of the pipeline chain
    Subset(SelectionMethod),
    /// Project inside the chain, keeping this share of variance
    Projection { variance_ratio: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizerDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub scaler: Option<ScalerType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReductionDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: ReductionKind,
    pub importance_kind: ImportanceKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: ModelKind,
    pub supports_tuning: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearcherDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub strategy: SearchStrategy,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub metric: ScoringMetric,
}

/// Lookup tables for every capability
#[derive(Debug, Clone, Serialize)]
pub struct Registry {
    pub normalizers: Vec<NormalizerDescriptor>,
    pub reductions: Vec<ReductionDescriptor>,
    pub models: Vec<ModelDescriptor>,
    pub searchers: Vec<SearcherDescriptor>,
    pub metrics: Vec<MetricDescriptor>,
}

static STANDARD: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Built-in registry, resolved once per process
    pub fn standard() -> &'static Registry {
        STANDARD.get_or_init(Self::build_standard)
    }

    fn build_standard() -> Registry {
        let normalizer = |id, name, scaler| NormalizerDescriptor { id, name, scaler };
        let subset = |id, name, method: SelectionMethod| ReductionDescriptor {
            id,
            name,
            kind: ReductionKind::Subset(method),
            importance_kind: match method {
                SelectionMethod::Percentile { .. } => ImportanceKind::Mask,
                SelectionMethod::MutualInformation { .. } => ImportanceKind::Ranked,
            },
        };
        let projection = |id, name, variance_ratio| ReductionDescriptor {
            id,
            name,
            kind: ReductionKind::Projection { variance_ratio },
            importance_kind: ImportanceKind::None,
        };
        let model = |id, name, kind, supports_tuning| ModelDescriptor {
            id,
            name,
            kind,
            supports_tuning,
        };

        Registry {
            normalizers: vec![
                normalizer("none", "no scaling", None),
                normalizer("std", "standard scaler", Some(ScalerType::Standard)),
                normalizer("minmax", "min max scaler", Some(ScalerType::MinMax)),
                normalizer("maxabs", "max abs scaler", Some(ScalerType::MaxAbs)),
                normalizer("robust", "robust scaler", Some(ScalerType::Robust)),
            ],
            reductions: vec![
                ReductionDescriptor {
                    id: "none",
                    name: "all features",
                    kind: ReductionKind::None,
                    importance_kind: ImportanceKind::None,
                },
                subset("select-75", "select 75% (ANOVA F-value)", SelectionMethod::Percentile { percentile: 75.0 }),
                subset("select-50", "select 50% (ANOVA F-value)", SelectionMethod::Percentile { percentile: 50.0 }),
                subset("select-25", "select 25% (ANOVA F-value)", SelectionMethod::Percentile { percentile: 25.0 }),
                subset(
                    "mi-75",
                    "top 75% by mutual information",
                    SelectionMethod::MutualInformation { percentile: 75.0 },
                ),
                subset(
                    "mi-50",
                    "top 50% by mutual information",
                    SelectionMethod::MutualInformation { percentile: 50.0 },
                ),
                subset(
                    "mi-25",
                    "top 25% by mutual information",
                    SelectionMethod::MutualInformation { percentile: 25.0 },
                ),
                projection("pca-80", "PCA (80% variance)", 0.8),
                projection("pca-90", "PCA (90% variance)", 0.9),
            ],
            models: vec![
                model("lr", "logistic regression", ModelKind::LogisticRegression, true),
                model("knn", "K-nearest neighbors", ModelKind::Knn, true),
                model("nb", "naive Bayes", ModelKind::NaiveBayes, false),
                model("svm", "support vector machine", ModelKind::LinearSvm, true),
            ],
            searchers: vec![
                SearcherDescriptor {
                    id: "none",
                    name: "no search",
                    strategy: SearchStrategy::None,
                },
                SearcherDescriptor {
                    id: "grid",
                    name: "grid search",
                    strategy: SearchStrategy::Grid,
                },
                SearcherDescriptor {
                    id: "random",
                    name: "random search",
                    strategy: SearchStrategy::Random,
                },
            ],
            metrics: vec![
                MetricDescriptor {
                    id: "accuracy",
                    name: "accuracy",
                    metric: ScoringMetric::Accuracy,
                },
                MetricDescriptor {
                    id: "roc_auc",
                    name: "ROC AUC",
                    metric: ScoringMetric::RocAuc,
                },
                MetricDescriptor {
                    id: "f1_macro",
                    name: "F1 macro",
                    metric: ScoringMetric::F1Macro,
                },
            ],
        }
    }

    pub fn normalizer(&self, id: &str) -> Result<&NormalizerDescriptor> {
        self.normalizers
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| unknown("normalizer", id))
    }

    pub fn reduction(&self, id: &str) -> Result<&ReductionDescriptor> {
        self.reductions
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| unknown("feature reduction", id))
    }

    pub fn model(&self, id: &str) -> Result<&ModelDescriptor> {
        self.models
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| unknown("model type", id))
    }

    pub fn searcher(&self, id: &str) -> Result<&SearcherDescriptor> {
        self.searchers
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| unknown("search strategy", id))
    }

    pub fn metric(&self, id: &str) -> Result<&MetricDescriptor> {
        self.metrics
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| unknown("metric", id))
    }
}

fn unknown(what: &str, id: &str) -> SweepError {
    SweepError::Configuration(format!("unknown {} '{}'", what, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_per_axis() {
        let r = Registry::standard();
        fn assert_unique(ids: Vec<&str>) {
            let mut sorted = ids.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), ids.len(), "duplicate id in {:?}", ids);
        }
        assert_unique(r.normalizers.iter().map(|d| d.id).collect());
        assert_unique(r.reductions.iter().map(|d| d.id).collect());
        assert_unique(r.models.iter().map(|d| d.id).collect());
        assert_unique(r.searchers.iter().map(|d| d.id).collect());
        assert_unique(r.metrics.iter().map(|d| d.id).collect());
    }

    #[test]
    fn test_ids_never_contain_key_separator() {
        let r = Registry::standard();
        let all = r
            .normalizers
            .iter()
            .map(|d| d.id)
            .chain(r.reductions.iter().map(|d| d.id))
            .chain(r.models.iter().map(|d| d.id))
            .chain(r.searchers.iter().map(|d| d.id))
            .chain(r.metrics.iter().map(|d| d.id));
        for id in all {
            assert!(!id.contains("__"), "{}", id);
        }
    }

    #[test]
    fn test_capabilities() {
        let r = Registry::standard();
        assert!(!r.model("nb").unwrap().supports_tuning);
        assert!(r.model("lr").unwrap().supports_tuning);
        assert_eq!(r.reduction("select-50").unwrap().importance_kind, ImportanceKind::Mask);
        assert_eq!(r.reduction("mi-25").unwrap().importance_kind, ImportanceKind::Ranked);
        assert_eq!(r.reduction("pca-80").unwrap().importance_kind, ImportanceKind::None);
    }

    #[test]
    fn test_unknown_id_names_it() {
        let err = Registry::standard().model("xgb").unwrap_err();
        assert!(matches!(err, SweepError::Configuration(_)));
        assert!(err.to_string().contains("xgb"));
    }
}
