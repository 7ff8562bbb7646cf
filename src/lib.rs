//! Kolosal Sweep - exhaustive pipeline search for binary classification
//!
//! Crosses normalizers, feature reductions, model types, hyperparameter search
//! strategies and scoring metrics, fits and evaluates every combination, and
//! streams one report row per candidate.
//!
//! # Modules
//!
//! ## Search space
//! - [`registry`] - Capability descriptors for every component
//! - [`enumerator`] - Candidate space enumeration and candidate keys
//! - [`config`] - Engine settings and per-job parameters
//!
//! ## Core ML Modules
//! - [`data`] - Dataset import and splitting
//! - [`preprocessing`] - Scaling, feature selection, PCA
//! - [`training`] - Model types and stratified cross-validation
//! - [`pipeline`] - Executable fit/transform/predict chains
//! - [`optimizer`] - Grid and random hyperparameter search
//! - [`evaluation`] - Generalization metrics, ROC and reliability curves
//!
//! ## Runs
//! - [`sweep`] - The per-candidate fit and evaluate loop
//! - [`report`] - Streaming CSV report and its summary
//! - [`tracking`] - Job metadata persistence
//! - [`job`] - Asynchronous jobs with progress and cancellation
//! - [`export`] - Refit one candidate and save it with its metrics
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Search space
pub mod registry;
pub mod enumerator;

// Core ML modules
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod pipeline;
pub mod optimizer;
pub mod evaluation;

// Runs
pub mod sweep;
pub mod report;
pub mod tracking;
pub mod job;
pub mod export;

// Services
pub mod cli;

pub use error::{Result, SweepError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, SweepError};

    // Configuration
    pub use crate::config::{SearchParameters, SweepSettings};

    // Search space
    pub use crate::registry::Registry;
    pub use crate::enumerator::{enumerate, list_pipelines, CandidateKey, CandidateSpace, PipelineConfiguration};

    // Data and models
    pub use crate::data::{DataLoader, Dataset};
    pub use crate::pipeline::PipelineChain;
    pub use crate::training::{Estimator, ModelKind};
    pub use crate::optimizer::{SearchSpace, SearchStrategy, Tuner, TunerConfig};
    pub use crate::evaluation::{EvaluationPlan, Evaluator, ScoringMetric, Split};

    // Runs
    pub use crate::sweep::{Sweep, SweepOutcome};
    pub use crate::report::{summarize_report, CandidateResult, ReportWriter};
    pub use crate::tracking::JobMetadata;
    pub use crate::export::{create_model, ExportedModel, ModelReport, ModelRequest};
    pub use crate::job::{
        run_job, CancellationToken, JobManager, JobOutcome, JobRequest, ProgressObserver, TaskState, TaskStatus,
    };
}
