//! Sweep loop
//!
//! Drives every enumerated configuration through feature selection, tuning and
//! evaluation, streaming one report row per (configuration, metric) candidate.
//! Per-candidate fit and evaluation failures are logged and skipped; any other
//! error aborts the run with the partial report left intact.

use crate::config::{SearchParameters, SweepSettings};
use crate::data::Dataset;
use crate::enumerator::{enumerate, CandidateKey, PipelineConfiguration};
use crate::error::{Result, SweepError};
use crate::evaluation::{EvaluationPlan, Evaluator, SplitData};
use crate::job::{CancellationToken, ProgressObserver};
use crate::optimizer::{default_space, HyperParameters, SearchSpace, Tuner, TunerConfig};
use crate::pipeline::PipelineChain;
use crate::preprocessing::{select_columns, FeatureSelector};
use crate::registry::{ImportanceKind, ReductionKind, Registry};
use crate::report::{summarize_report, CandidateNames, CandidateResult, ReportSummary, ReportWriter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A candidate that was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub key: String,
    pub error: String,
}

/// What a sweep did
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub rows_written: usize,
    pub total_candidates: usize,
    pub completed_configurations: usize,
    pub total_configurations: usize,
    /// Model fits per model id, failed candidates included
    pub fits: BTreeMap<String, usize>,
    pub failures: Vec<CandidateFailure>,
    pub cancelled: bool,
    pub summary: ReportSummary,
}

impl SweepOutcome {
    pub fn total_fits(&self) -> usize {
        self.fits.values().sum()
    }
}

/// One run over the candidate space of a job
pub struct Sweep<'a> {
    registry: &'a Registry,
    params: &'a SearchParameters,
    tuner: Tuner,
    plan: EvaluationPlan,
    random_state: u64,
}

impl<'a> Sweep<'a> {
    pub fn new(registry: &'a Registry, settings: &SweepSettings, params: &'a SearchParameters) -> Self {
        let tuner = Tuner::new(
            TunerConfig::new()
                .with_cv_folds(settings.cv_folds)
                .with_shuffle(params.shuffle)
                .with_random_state(settings.random_seed)
                .with_n_iter(settings.random_search_iterations),
        );
        Self {
            registry,
            params,
            tuner,
            plan: EvaluationPlan::default(),
            random_state: settings.random_seed,
        }
    }

    /// Splits that get ROC and reliability columns
    pub fn with_plan(mut self, plan: EvaluationPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Evaluate every candidate, writing the report to `report_path`.
    ///
    /// Progress is reported after each configuration. Cancellation is checked
    /// before each candidate; a cancelled run returns normally with `cancelled` set.
    pub fn run(
        &self,
        dataset: &Dataset,
        report_path: &Path,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<SweepOutcome> {
        let space = enumerate(self.registry, self.params)?;
        let mut outcome = SweepOutcome {
            total_candidates: space.total_candidates(),
            total_configurations: space.configurations.len(),
            ..Default::default()
        };
        info!(
            configurations = outcome.total_configurations,
            candidates = outcome.total_candidates,
            "Starting sweep"
        );

        let mut writer = ReportWriter::create(report_path)?;
        let result = self.run_configurations(
            dataset,
            &space.configurations,
            &space.metrics,
            &mut writer,
            observer,
            cancel,
            &mut outcome,
        );
        let rows = writer.finish();
        result?;
        outcome.rows_written = rows?;

        if outcome.rows_written > 0 {
            outcome.summary = summarize_report(report_path)?;
            outcome.summary.log();
        }
        info!(
            total_fits = outcome.total_fits(),
            rows = outcome.rows_written,
            failures = outcome.failures.len(),
            cancelled = outcome.cancelled,
            "Sweep finished"
        );
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_configurations(
        &self,
        dataset: &Dataset,
        configurations: &[PipelineConfiguration],
        metrics: &[String],
        writer: &mut ReportWriter,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
        outcome: &mut SweepOutcome,
    ) -> Result<()> {
        let evaluator = Evaluator::new(
            SplitData {
                x: &dataset.x_test,
                y: &dataset.y_test,
            },
            SplitData {
                x: &dataset.x_gen,
                y: &dataset.y_gen,
            },
            &self.plan,
        );

        for (index, configuration) in configurations.iter().enumerate() {
            let model = self.registry.model(&configuration.model)?;
            let searcher = self.registry.searcher(&configuration.searcher)?;
            let search_space = self.search_space(configuration)?;
            let base = PipelineChain::build(self.registry, configuration, &HyperParameters::new(), self.random_state)?;

            let prepared = self.select_features(dataset, configuration).map(|selected| {
                let x = select_columns(&dataset.x_train, &selected);
                (selected, x)
            });

            for metric_id in metrics {
                if cancel.is_cancelled() {
                    info!(completed = index, total = configurations.len(), "Sweep cancelled");
                    outcome.cancelled = true;
                    return Ok(());
                }

                let key = configuration.candidate(metric_id);
                let planned = self.tuner
                    .planned_fits(searcher.strategy, search_space.as_ref(), &dataset.y_train);
                let attempt = match &prepared {
                    Ok((selected, x)) => self.run_candidate(
                        dataset,
                        &evaluator,
                        &base,
                        &key,
                        selected,
                        x,
                        search_space.as_ref(),
                    ),
                    Err(e) => Err(SweepError::Fit(format!("feature selection: {}", e))),
                };

                match attempt {
                    Ok((result, fits)) => {
                        *outcome.fits.entry(model.id.to_string()).or_default() += fits;
                        writer.append(&result.to_row()?)?;
                        debug!(key = %key, fit_time = ?result.fit_time, "Candidate written");
                    }
                    Err(e) if !e.is_fatal() => {
                        *outcome.fits.entry(model.id.to_string()).or_default() += planned;
                        warn!(key = %key, error = %e, "Skipping candidate");
                        outcome.failures.push(CandidateFailure {
                            key: key.to_string(),
                            error: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            outcome.completed_configurations = index + 1;
            observer.on_progress(index + 1, configurations.len());
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_candidate(
        &self,
        dataset: &Dataset,
        evaluator: &Evaluator<'_>,
        base: &PipelineChain,
        key: &CandidateKey,
        selected: &[usize],
        x_train: &ndarray::Array2<f64>,
        search_space: Option<&SearchSpace>,
    ) -> Result<(CandidateResult, usize)> {
        let searcher = self.registry.searcher(&key.configuration.searcher)?;
        let metric = self.registry.metric(&key.metric)?;

        let start = Instant::now();
        let tuned = self.tuner.tune(
            base,
            searcher.strategy,
            search_space,
            metric.metric,
            x_train,
            &dataset.y_train,
        )?;
        let evaluation = evaluator.evaluate(&tuned.chain, selected)?;

        let result = CandidateResult {
            names: CandidateNames::resolve(self.registry, key)?,
            key: key.clone(),
            selected_features: selected
                .iter()
                .filter_map(|&i| dataset.feature_names.get(i).cloned())
                .collect(),
            train_score: tuned.best_score(),
            best_params: tuned.best_params,
            evaluation,
            fit_time: start.elapsed(),
        };
        Ok((result, tuned.fits))
    }

    /// Search space of a configuration, `None` when nothing is tuned
    fn search_space(&self, configuration: &PipelineConfiguration) -> Result<Option<SearchSpace>> {
        let model = self.registry.model(&configuration.model)?;
        let searcher = self.registry.searcher(&configuration.searcher)?;
        if !model.supports_tuning {
            return Ok(None);
        }
        Ok(self
            .params
            .hyper_parameters
            .get(searcher.strategy, model.id)
            .cloned()
            .or_else(|| default_space(searcher.strategy, model.kind)))
    }

    /// Column indices the model is trained on, fitted once per configuration.
    ///
    /// Mask selectors keep input order, ranked selectors list the best feature first.
    fn select_features(&self, dataset: &Dataset, configuration: &PipelineConfiguration) -> Result<Vec<usize>> {
        let reduction = self.registry.reduction(&configuration.reduction)?;
        let all = || -> Vec<usize> { (0..dataset.feature_names.len()).collect() };
        let method = match reduction.kind {
            ReductionKind::Subset(method) => method,
            ReductionKind::None | ReductionKind::Projection { .. } => return Ok(all()),
        };

        let mut selector = FeatureSelector::new(method);
        selector.fit(&dataset.x_train, &dataset.y_train)?;
        let selected = match reduction.importance_kind {
            ImportanceKind::Mask => selector.support_mask().map(|mask| {
                mask.iter()
                    .enumerate()
                    .filter(|&(_, &keep)| keep)
                    .map(|(i, _)| i)
                    .collect()
            }),
            ImportanceKind::Ranked => selector.top_features().map(<[usize]>::to_vec),
            ImportanceKind::None => Some(all()),
        };
        selected
            .filter(|indices| !indices.is_empty())
            .ok_or_else(|| SweepError::Fit("feature selector selected nothing".to_string()))
    }
}
