//! Streaming candidate report
//!
//! One CSV row per evaluated candidate, written and flushed as soon as the
//! candidate finishes so a partially completed run still leaves a usable file.

mod summary;
mod writer;

pub use summary::{summarize_report, ReportSummary, SummaryEntry};
pub use writer::ReportWriter;

use crate::enumerator::CandidateKey;
use crate::error::Result;
use crate::evaluation::Evaluation;
use crate::optimizer::HyperParameters;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ordered `(column, text)` pairs of one report row
pub type ReportRow = Vec<(String, String)>;

/// Human-readable names of the parts of a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateNames {
    pub scaler: String,
    pub feature_selector: String,
    pub estimator: String,
    pub searcher: String,
    pub scorer: String,
}

impl CandidateNames {
    pub fn resolve(registry: &Registry, key: &CandidateKey) -> Result<Self> {
        let c = &key.configuration;
        Ok(Self {
            scaler: registry.normalizer(&c.normalizer)?.name.to_string(),
            feature_selector: registry.reduction(&c.reduction)?.name.to_string(),
            estimator: registry.model(&c.model)?.name.to_string(),
            searcher: registry.searcher(&c.searcher)?.name.to_string(),
            scorer: registry.metric(&key.metric)?.name.to_string(),
        })
    }
}

/// Everything recorded for one fitted and evaluated candidate
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub key: CandidateKey,
    pub names: CandidateNames,
    /// Names of the columns the model was trained on
    pub selected_features: Vec<String>,
    pub best_params: HyperParameters,
    /// Best cross-validated (mean, std); absent when nothing was tuned
    pub train_score: Option<(f64, f64)>,
    pub evaluation: Evaluation,
    pub fit_time: Duration,
}

impl CandidateResult {
    /// Row with a key set that depends only on the evaluation plan
    pub fn to_row(&self) -> Result<ReportRow> {
        let mut row: ReportRow = vec![
            ("key".into(), self.key.to_string()),
            ("scaler".into(), self.names.scaler.clone()),
            ("feature_selector".into(), self.names.feature_selector.clone()),
            ("estimator".into(), self.names.estimator.clone()),
            ("searcher".into(), self.names.searcher.clone()),
            ("scorer".into(), self.names.scorer.clone()),
        ];

        row.extend(
            self.evaluation
                .generalization
                .columns()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );

        let (train_score, train_score_std) = match self.train_score {
            Some((mean, std)) => (mean.to_string(), std.to_string()),
            None => (String::new(), String::new()),
        };
        row.push(("test_accuracy".into(), self.evaluation.test_accuracy.to_string()));
        row.push(("train_score".into(), train_score));
        row.push(("train_score_std".into(), train_score_std));
        row.push((
            "selected_features".into(),
            serde_json::to_string(&self.selected_features)?,
        ));
        row.push(("best_params".into(), serde_json::to_string(&self.best_params)?));
        row.push(("fit_time".into(), self.fit_time.as_secs_f64().to_string()));

        for (split, curve) in &self.evaluation.roc {
            row.push((format!("{}_fpr", split.name()), serde_json::to_string(&curve.fpr)?));
            row.push((format!("{}_tpr", split.name()), serde_json::to_string(&curve.tpr)?));
        }
        for (split, rel) in &self.evaluation.reliability {
            row.push((format!("{}_brier_score", split.name()), rel.brier_score.to_string()));
            row.push((format!("{}_fop", split.name()), serde_json::to_string(&rel.fop)?));
            row.push((format!("{}_mpv", split.name()), serde_json::to_string(&rel.mpv)?));
        }

        Ok(row)
    }
}
