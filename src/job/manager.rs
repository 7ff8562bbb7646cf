//! Background job execution

use super::progress::{CancellationToken, ChannelObserver, Observers, ProgressEvent, StatusObserver};
use super::runner::{run_job, JobOutcome, JobRequest};
use super::state::{StatusStore, TaskState, TaskStatus};
use crate::config::{SearchParameters, SweepSettings};
use crate::enumerator::list_pipelines;
use crate::error::{Result, SweepError};
use crate::registry::Registry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handle returned for an accepted job
pub struct JobSubmission {
    pub job_id: String,
    /// `(key, name)` of every candidate the job will evaluate
    pub pipelines: Vec<(String, String)>,
    pub handle: JoinHandle<Result<JobOutcome>>,
}

/// Runs jobs on the blocking pool and tracks their status
#[derive(Clone)]
pub struct JobManager {
    settings: Arc<SweepSettings>,
    store: StatusStore,
    tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
    progress: Option<mpsc::Sender<ProgressEvent>>,
}

impl JobManager {
    pub fn new(settings: SweepSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            store: StatusStore::new(),
            tokens: Arc::new(RwLock::new(HashMap::new())),
            progress: None,
        }
    }

    /// Also publish progress events on a bounded channel
    pub fn with_progress_channel(settings: SweepSettings) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(settings.progress_capacity.max(1));
        let mut manager = Self::new(settings);
        manager.progress = Some(tx);
        (manager, rx)
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Validate a request and start it on the blocking pool.
    ///
    /// Must be called from within a tokio runtime. Invalid parameters and an
    /// empty candidate space are rejected before the job is accepted. A job id
    /// that is still pending or running is not started again; its handle resolves
    /// to `JobOutcome::AlreadyRunning`.
    pub fn submit(&self, request: JobRequest) -> Result<JobSubmission> {
        if request.job_id.trim().is_empty() {
            return Err(SweepError::Configuration("job id must not be empty".to_string()));
        }
        self.settings.validate()?;
        let params = SearchParameters::from_map(&request.parameters)?;
        let pipelines = list_pipelines(Registry::standard(), &params)?;

        let job_id = request.job_id.clone();
        let cancel = CancellationToken::new();
        {
            let mut tokens = self.tokens.write();
            if tokens.contains_key(&job_id) {
                info!(job_id = %job_id, "Job already running, ignoring duplicate delivery");
                return Ok(JobSubmission {
                    job_id,
                    pipelines,
                    handle: tokio::spawn(async { Ok(JobOutcome::AlreadyRunning) }),
                });
            }
            tokens.insert(job_id.clone(), cancel.clone());
            self.store.insert_pending(&job_id);
        }
        info!(job_id = %job_id, candidates = pipelines.len(), "Job submitted");

        let settings = Arc::clone(&self.settings);
        let store = self.store.clone();
        let tokens = Arc::clone(&self.tokens);
        let progress = self.progress.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let job_id = request.job_id.clone();
            if cancel.is_cancelled() {
                store.transition(&job_id, TaskState::Cancelled, "Cancelled before start");
                tokens.write().remove(&job_id);
                return Ok(JobOutcome::Cancelled(Default::default()));
            }
            store.transition(&job_id, TaskState::Running, "Running");

            let mut observers = Observers::new().with(StatusObserver::new(job_id.clone(), store.clone()));
            if let Some(tx) = progress {
                observers = observers.with(ChannelObserver::new(job_id.clone(), tx));
            }

            let result = run_job(&request, &settings, &observers, &cancel);
            match &result {
                Ok(JobOutcome::Completed(outcome)) => {
                    store.progress(&job_id, outcome.total_configurations, outcome.total_configurations);
                    store.transition(&job_id, TaskState::Succeeded, "Completed");
                }
                Ok(JobOutcome::AlreadyCompleted) | Ok(JobOutcome::AlreadyRunning) => {
                    store.transition(&job_id, TaskState::Succeeded, "Already completed");
                }
                Ok(JobOutcome::Cancelled(_)) => {
                    store.transition(&job_id, TaskState::Cancelled, "Cancelled");
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Job failed");
                    store.transition(&job_id, TaskState::Failed, e.to_string());
                }
            }
            tokens.write().remove(&job_id);
            result
        });

        Ok(JobSubmission {
            job_id,
            pipelines,
            handle,
        })
    }

    /// Status of a job; unknown ids read as pending
    pub fn status(&self, job_id: &str) -> TaskStatus {
        self.store.get(job_id)
    }

    /// Request cooperative cancellation.
    ///
    /// Returns false, doing nothing, for unknown or finished jobs.
    pub fn cancel(&self, job_id: &str) -> bool {
        if self.store.get(job_id).is_terminal() {
            return false;
        }
        match self.tokens.read().get(job_id) {
            Some(token) => {
                token.cancel();
                info!(job_id = %job_id, "Cancellation requested");
                true
            }
            None => false,
        }
    }
}
