//! Job metadata file
//!
//! A flat JSON object next to the report. Updates are additive merges written
//! through a temporary file and renamed into place, so readers never observe a
//! half-written document. The `date` key marks a completed job.

use crate::error::{Result, SweepError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key whose presence marks a completed job
pub const COMPLETION_KEY: &str = "date";

/// Timestamp format of the completion marker
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// In-memory view of a job's `metadata.json`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobMetadata {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JobMetadata {
    /// Load the file, or start empty when it does not exist yet
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => {
                    return Err(SweepError::Serialization(format!(
                        "{} is not a JSON object",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Overwrite top-level keys with those of `other`; other keys are kept
    pub fn merge(&mut self, other: Map<String, Value>) {
        self.values.extend(other);
    }

    /// Insert one serializable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.values.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Write to a sibling temporary file, then rename over the target
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.values)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), keys = self.values.len(), "Metadata saved");
        Ok(())
    }

    /// Load, merge and save in one step
    pub fn update(path: impl AsRef<Path>, values: Map<String, Value>) -> Result<Self> {
        let mut metadata = Self::load(path)?;
        metadata.merge(values);
        metadata.save()?;
        Ok(metadata)
    }

    pub fn is_complete(&self) -> bool {
        self.values.contains_key(COMPLETION_KEY)
    }

    /// Completion timestamp, if the job finished
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.values.get(COMPLETION_KEY)?.as_str()?;
        chrono::NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Completion marker for `now`
pub fn completion_stamp(now: DateTime<Utc>) -> String {
    now.format(DATE_FORMAT).to_string()
}
