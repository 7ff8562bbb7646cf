//! Data preprocessing module
//!
//! Provides the transforms a candidate pipeline can be composed from:
//! - Feature scaling (StandardScaler, MinMaxScaler, MaxAbsScaler, RobustScaler)
//! - Subset-selection feature reduction (ANOVA percentile, mutual information ranking)
//! - Projection feature reduction (PCA)

mod scaler;
pub mod feature_selection;
pub mod pca;

pub use scaler::{Scaler, ScalerType};
pub use feature_selection::{FeatureSelector, SelectionMethod, select_columns};
pub use pca::Pca;
