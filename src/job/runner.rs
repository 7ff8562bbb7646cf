//! One job from pickup to completion

use super::progress::{CancellationToken, ProgressObserver};
use crate::config::{SearchParameters, SweepSettings};
use crate::data::DataLoader;
use crate::error::Result;
use crate::registry::Registry;
use crate::sweep::{Sweep, SweepOutcome};
use crate::tracking::{completion_stamp, JobMetadata, COMPLETION_KEY};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};
use uuid::Uuid;

/// Report file name inside the job directory
pub const REPORT_FILE: &str = "report.csv";

/// Metadata file name inside the job directory
pub const METADATA_FILE: &str = "metadata.json";

/// Inputs of a search job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub label_column: String,
    /// Raw parameter map (`ignore_*`, `hyper_parameters`)
    pub parameters: BTreeMap<String, String>,
}

impl JobRequest {
    /// Request with a freshly generated job id
    pub fn new(train_path: impl Into<PathBuf>, test_path: impl Into<PathBuf>, label_column: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            train_path: train_path.into(),
            test_path: test_path.into(),
            label_column: label_column.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters.extend(parameters);
        self
    }
}

/// How a job ended without error
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed(SweepOutcome),
    Cancelled(SweepOutcome),
    /// The job had already completed; nothing was done
    AlreadyCompleted,
    /// Another delivery of the job is still running; nothing was done
    AlreadyRunning,
}

/// Run a job synchronously.
///
/// A job whose metadata already carries the completion marker is not rerun.
#[instrument(skip_all, fields(job_id = %request.job_id))]
pub fn run_job(
    request: &JobRequest,
    settings: &SweepSettings,
    observer: &dyn ProgressObserver,
    cancel: &CancellationToken,
) -> Result<JobOutcome> {
    settings.validate()?;
    let job_dir = settings.job_dir(&request.job_id);
    fs::create_dir_all(&job_dir)?;
    let metadata_path = job_dir.join(METADATA_FILE);

    if JobMetadata::load(&metadata_path)?.is_complete() {
        info!("Job already completed, skipping");
        return Ok(JobOutcome::AlreadyCompleted);
    }

    let params = SearchParameters::from_map(&request.parameters)?;
    let dataset = DataLoader::new()
        .with_test_size(settings.test_size)
        .with_random_state(settings.random_seed)
        .load(&request.train_path, &request.test_path, &request.label_column)?;

    JobMetadata::update(
        &metadata_path,
        object(json!({
            "dataset": &dataset.metadata,
            "labels": &dataset.labels,
            "parameters": &request.parameters,
        })),
    )?;

    let outcome = Sweep::new(Registry::standard(), settings, &params).run(
        &dataset,
        &job_dir.join(REPORT_FILE),
        observer,
        cancel,
    )?;

    let mut update = object(json!({
        "fits": &outcome.fits,
        "failures": &outcome.failures,
    }));
    if outcome.cancelled {
        JobMetadata::update(&metadata_path, update)?;
        info!(rows = outcome.rows_written, "Job cancelled");
        return Ok(JobOutcome::Cancelled(outcome));
    }

    update.insert(COMPLETION_KEY.to_string(), Value::String(completion_stamp(Utc::now())));
    JobMetadata::update(&metadata_path, update)?;
    info!(rows = outcome.rows_written, total_fits = outcome.total_fits(), "Job completed");
    Ok(JobOutcome::Completed(outcome))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
