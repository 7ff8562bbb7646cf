//! Job state machine and status store

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Lifecycle of a job: Pending, then Running, then one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled)
    }
}

/// Snapshot answered by a progress query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub current: usize,
    pub total: usize,
    pub status: String,
}

impl TaskStatus {
    pub fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            current: 0,
            total: 1,
            status: "Pending".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::pending()
    }
}

/// Shared job id to status map
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    inner: Arc<RwLock<HashMap<String, TaskStatus>>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status; unknown jobs read as pending with 0 of 1 done
    pub fn get(&self, job_id: &str) -> TaskStatus {
        self.inner
            .read()
            .get(job_id)
            .cloned()
            .unwrap_or_else(TaskStatus::pending)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.inner.read().contains_key(job_id)
    }

    /// Register a new delivery of a job.
    ///
    /// A job that is still pending or running keeps its status; returns whether
    /// the status was reset.
    pub fn insert_pending(&self, job_id: &str) -> bool {
        let mut map = self.inner.write();
        match map.get(job_id) {
            Some(status) if !status.is_terminal() => false,
            _ => {
                map.insert(job_id.to_string(), TaskStatus::pending());
                true
            }
        }
    }

    /// Move to `state` unless the job already reached a terminal state.
    ///
    /// Returns whether the transition was applied.
    pub fn transition(&self, job_id: &str, state: TaskState, status: impl Into<String>) -> bool {
        let mut map = self.inner.write();
        let entry = map.entry(job_id.to_string()).or_default();
        if entry.state.is_terminal() {
            return false;
        }
        entry.state = state;
        entry.status = status.into();
        true
    }

    /// Record `current` of `total` done for a running job
    pub fn progress(&self, job_id: &str, current: usize, total: usize) {
        let mut map = self.inner.write();
        if let Some(entry) = map.get_mut(job_id) {
            if entry.state == TaskState::Running {
                entry.current = current;
                entry.total = total.max(1);
                entry.status = format!("Evaluated {} of {} pipelines", current, total);
            }
        }
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }
}
