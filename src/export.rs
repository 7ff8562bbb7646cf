//! Model export
//!
//! Refits one report candidate on the training split, evaluates it on the held-out
//! splits and persists the fitted chain next to its metrics. An exported model can
//! later be assessed on new labelled data.

use crate::data::{load_labeled, Dataset};
use crate::enumerator::CandidateKey;
use crate::error::{Result, SweepError};
use crate::evaluation::{
    positive_probabilities, reliability, roc_curve, ClassificationMetrics, EvaluationPlan, Evaluator, Reliability,
    RocCurve, SplitData,
};
use crate::optimizer::HyperParameters;
use crate::pipeline::PipelineChain;
use crate::preprocessing::select_columns;
use crate::registry::{ReductionKind, Registry};
use crate::tracking::completion_stamp;
use chrono::Utc;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Fitted chain of an exported model
pub const MODEL_FILE: &str = "model.json";
/// Held-out metrics of an exported model
pub const MODEL_METRICS_FILE: &str = "pipeline.json";

/// Candidate to export, as listed in a report row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub key: String,
    pub best_params: HyperParameters,
    pub selected_features: Vec<String>,
}

impl ModelRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            best_params: HyperParameters::new(),
            selected_features: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: HyperParameters) -> Self {
        self.best_params = params;
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.selected_features = features;
        self
    }

    /// Read the best parameters and selected features of `key` from a report
    pub fn from_report(path: impl AsRef<Path>, key: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SweepError::Data(format!("report {} has no '{}' column", path.display(), name)))
        };
        let (key_col, params_col, features_col) =
            (position("key")?, position("best_params")?, position("selected_features")?);

        for record in reader.records() {
            let record = record?;
            if record.len() != headers.len() || record.get(key_col) != Some(key) {
                continue;
            }
            let cell = |i: usize| record.get(i).unwrap_or_default();
            return Ok(Self {
                key: key.to_string(),
                best_params: serde_json::from_str(cell(params_col))?,
                selected_features: serde_json::from_str(cell(features_col))?,
            });
        }
        Err(SweepError::Configuration(format!(
            "report {} has no row for '{}'",
            path.display(),
            key
        )))
    }
}

/// A fitted candidate that can score new data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedModel {
    pub key: CandidateKey,
    pub name: String,
    pub label: String,
    /// `["No <label>", "<label>"]`
    pub labels: [String; 2],
    /// Raw label values of the negative and positive class
    pub class_values: [f64; 2],
    /// Input columns, in the order the chain expects them
    pub features: Vec<String>,
    pub best_params: HyperParameters,
    pub chain: PipelineChain,
    pub created_at: String,
}

/// Held-out evaluation written next to an exported model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub key: String,
    pub features: Vec<String>,
    pub best_params: HyperParameters,
    pub test_accuracy: f64,
    pub generalization: ClassificationMetrics,
    /// Keyed by split name
    pub roc: BTreeMap<String, RocCurve>,
    pub reliability: BTreeMap<String, Reliability>,
}

/// Performance of an exported model on extra labelled data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub rows: usize,
    pub metrics: ClassificationMetrics,
    pub roc: RocCurve,
    pub reliability: Reliability,
}

/// Refit the candidate of `request` on the training split and write
/// `model.json` and `pipeline.json` to `output_dir`.
///
/// Subset reductions use the listed features in the listed order. Projection and
/// pass-through candidates always use every input feature.
pub fn create_model(
    request: &ModelRequest,
    dataset: &Dataset,
    output_dir: &Path,
    random_state: u64,
) -> Result<(ExportedModel, ModelReport)> {
    let registry = Registry::standard();
    let key = CandidateKey::parse(&request.key)?;
    let name = key.display_name(registry)?;
    let selected = feature_indices(registry, &key, &request.selected_features, &dataset.feature_names)?;

    let mut chain = PipelineChain::build(registry, &key.configuration, &request.best_params, random_state)?;
    chain.fit(&select_columns(&dataset.x_train, &selected), &dataset.y_train)?;

    let plan = EvaluationPlan::default();
    let evaluation = Evaluator::new(
        SplitData {
            x: &dataset.x_test,
            y: &dataset.y_test,
        },
        SplitData {
            x: &dataset.x_gen,
            y: &dataset.y_gen,
        },
        &plan,
    )
    .evaluate(&chain, &selected)?;

    let features: Vec<String> = selected.iter().map(|&i| dataset.feature_names[i].clone()).collect();
    let report = ModelReport {
        key: key.to_string(),
        features: features.clone(),
        best_params: request.best_params.clone(),
        test_accuracy: evaluation.test_accuracy,
        generalization: evaluation.generalization,
        roc: evaluation
            .roc
            .into_iter()
            .map(|(split, curve)| (split.name().to_string(), curve))
            .collect(),
        reliability: evaluation
            .reliability
            .into_iter()
            .map(|(split, rel)| (split.name().to_string(), rel))
            .collect(),
    };
    let model = ExportedModel {
        key,
        name,
        label: dataset.metadata.label.clone(),
        labels: dataset.labels.clone(),
        class_values: dataset.class_values,
        features,
        best_params: request.best_params.clone(),
        chain,
        created_at: completion_stamp(Utc::now()),
    };

    fs::create_dir_all(output_dir)?;
    model.save(output_dir.join(MODEL_FILE))?;
    fs::write(output_dir.join(MODEL_METRICS_FILE), serde_json::to_string_pretty(&report)?)?;

    info!(
        key = %model.key,
        features = model.features.len(),
        auc = report.generalization.auc,
        accuracy = report.generalization.accuracy,
        "Model exported"
    );
    Ok((model, report))
}

/// Column indices of the features a candidate is trained on
fn feature_indices(
    registry: &Registry,
    key: &CandidateKey,
    selected: &[String],
    feature_names: &[String],
) -> Result<Vec<usize>> {
    let reduction = registry.reduction(&key.configuration.reduction)?;
    if !matches!(reduction.kind, ReductionKind::Subset(_)) {
        return Ok((0..feature_names.len()).collect());
    }
    if selected.is_empty() {
        return Err(SweepError::Configuration(format!(
            "'{}' needs the selected features of its report row",
            key
        )));
    }

    let mut indices = Vec::with_capacity(selected.len());
    for feature in selected {
        let index = feature_names
            .iter()
            .position(|name| name == feature)
            .ok_or_else(|| SweepError::Configuration(format!("unknown feature '{}'", feature)))?;
        if indices.contains(&index) {
            return Err(SweepError::Configuration(format!("feature '{}' listed twice", feature)));
        }
        indices.push(index);
    }
    Ok(indices)
}

impl ExportedModel {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        Ok(model)
    }

    /// Positive-class probabilities for rows with the model's feature columns
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.features.len() {
            return Err(SweepError::Shape {
                expected: format!("{} feature columns", self.features.len()),
                actual: format!("{} feature columns", x.ncols()),
            });
        }
        let (_, output) = self.chain.predict_with_scores(x)?;
        Ok(positive_probabilities(output))
    }

    /// Metrics, ROC and reliability on labelled rows
    pub fn assess(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Assessment> {
        if x.ncols() != self.features.len() {
            return Err(SweepError::Shape {
                expected: format!("{} feature columns", self.features.len()),
                actual: format!("{} feature columns", x.ncols()),
            });
        }
        let (predictions, output) = self.chain.predict_with_scores(x)?;
        let probabilities = positive_probabilities(output);
        Ok(Assessment {
            rows: y.len(),
            metrics: ClassificationMetrics::compute(y, &predictions, &probabilities)?,
            roc: roc_curve(y, &probabilities)?,
            reliability: reliability(&probabilities, y)?,
        })
    }

    /// Assess on a CSV file that has the model's feature columns and label column
    pub fn assess_file(&self, path: impl AsRef<Path>) -> Result<Assessment> {
        let path = path.as_ref();
        let (x, y) = load_labeled(path, &self.label, &self.features, self.class_values)?;
        debug!(path = %path.display(), rows = y.len(), "Assessing exported model");
        self.assess(&x, &y)
    }
}
