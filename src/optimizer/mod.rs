//! Hyperparameter search
//!
//! Provides the fitting stage of a candidate:
//! - Search spaces with built-in defaults per model and user overrides
//! - Grid search over explicit value lists
//! - Seeded random search over lists and ranges
//! - Stratified k-fold scoring with a parallel candidate loop

mod config;
mod search_space;
mod tuner;

pub use config::TunerConfig;
pub use search_space::{
    default_space, HyperParameters, Parameter, ParameterType, ParameterValue, SearchSpace,
    SearchStrategy, SpaceOverrides,
};
pub use tuner::{SearchRecord, TuneOutcome, Tuner};
