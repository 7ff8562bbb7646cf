//! Progress reporting and cooperative cancellation

use super::state::StatusStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// `completed` of `total` configurations evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub completed: usize,
    pub total: usize,
}

/// Receives progress from the sweep loop.
///
/// Implementations must not block; they cannot fail the run.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Forwards events into a bounded channel, dropping them when it is full
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    job_id: String,
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new(job_id: impl Into<String>, tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            job_id: job_id.into(),
            tx,
        }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, completed: usize, total: usize) {
        let event = ProgressEvent {
            job_id: self.job_id.clone(),
            completed,
            total,
        };
        if let Err(e) = self.tx.try_send(event) {
            trace!(job_id = %self.job_id, error = %e, "Progress event dropped");
        }
    }
}

/// Writes progress into the status store
#[derive(Debug, Clone)]
pub struct StatusObserver {
    job_id: String,
    store: StatusStore,
}

impl StatusObserver {
    pub fn new(job_id: impl Into<String>, store: StatusStore) -> Self {
        Self {
            job_id: job_id.into(),
            store,
        }
    }
}

impl ProgressObserver for StatusObserver {
    fn on_progress(&self, completed: usize, total: usize) {
        self.store.progress(&self.job_id, completed, total);
    }
}

/// Fans one event out to several observers
#[derive(Default)]
pub struct Observers {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }
}

impl ProgressObserver for Observers {
    fn on_progress(&self, completed: usize, total: usize) {
        for observer in &self.observers {
            observer.on_progress(completed, total);
        }
    }
}

/// Shared flag checked between candidates
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
