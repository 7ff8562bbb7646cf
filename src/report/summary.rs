//! Ranking of a finished (or partial) report

use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

/// Ranking fields of one report row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub key: String,
    pub auc: f64,
    pub accuracy: f64,
    pub f1: f64,
}

/// Report rows ranked best first by (ROC AUC, accuracy, F1)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub ranked: Vec<SummaryEntry>,
}

impl ReportSummary {
    pub fn best(&self) -> Option<&SummaryEntry> {
        self.ranked.first()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Log the best candidate
    pub fn log(&self) {
        match self.best() {
            Some(best) => info!(
                key = %best.key,
                auc = best.auc,
                accuracy = best.accuracy,
                f1 = best.f1,
                candidates = self.ranked.len(),
                "Best model"
            ),
            None => info!("Report has no complete rows"),
        }
    }
}

/// Read a report and rank its rows.
///
/// A trailing row that is incomplete (a write in progress) is ignored.
pub fn summarize_report(path: impl AsRef<Path>) -> Result<ReportSummary> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SweepError::Data(format!("report {} has no '{}' column", path.display(), name)))
    };
    let (key_col, auc_col, acc_col, f1_col) =
        (position("key")?, position("auc")?, position("accuracy")?, position("f1")?);

    let mut ranked = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "Stopping at unreadable report row");
                break;
            }
        };
        if record.len() != headers.len() {
            debug!(fields = record.len(), "Skipping incomplete report row");
            continue;
        }
        let number = |i: usize| record.get(i).and_then(|v| v.parse::<f64>().ok());
        if let (Some(key), Some(auc), Some(accuracy), Some(f1)) =
            (record.get(key_col), number(auc_col), number(acc_col), number(f1_col))
        {
            ranked.push(SummaryEntry {
                key: key.to_string(),
                auc,
                accuracy,
                f1,
            });
        }
    }

    ranked.sort_by(|a, b| {
        desc(a.auc, b.auc)
            .then_with(|| desc(a.accuracy, b.accuracy))
            .then_with(|| desc(a.f1, b.f1))
    });
    Ok(ReportSummary { ranked })
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
