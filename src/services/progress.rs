use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::models::scoring_events::{ProgressPhase, ProgressUpdate};

/// Receives progress of settlement runs.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, update: ProgressUpdate);
}

const HISTORY_LIMIT: usize = 256;

#[derive(Debug)]
struct TrackerState {
    latest: ProgressUpdate,
    history: VecDeque<ProgressUpdate>,
}

/// Keeps the latest progress snapshot for the admin progress view.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    state: Arc<RwLock<TrackerState>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState {
                latest: ProgressUpdate::idle(),
                history: VecDeque::with_capacity(HISTORY_LIMIT),
            })),
        }
    }

    pub fn snapshot(&self) -> ProgressUpdate {
        self.state
            .read()
            .map(|state| state.latest.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().latest.clone())
    }

    /// Updates received since the last run started, oldest first.
    pub fn history(&self) -> Vec<ProgressUpdate> {
        self.state
            .read()
            .map(|state| state.history.iter().cloned().collect())
            .unwrap_or_else(|poisoned| poisoned.into_inner().history.iter().cloned().collect())
    }

    fn record(&self, update: ProgressUpdate) {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if update.phase == ProgressPhase::Starting {
            state.history.clear();
        }
        if state.history.len() == HISTORY_LIMIT {
            state.history.pop_front();
        }
        state.history.push_back(update.clone());
        state.latest = update;
    }
}

#[async_trait]
impl ProgressReporter for ProgressTracker {
    async fn report(&self, update: ProgressUpdate) {
        match update.phase {
            ProgressPhase::Failed => tracing::error!("📊 [PROGRESS] {}", update.message),
            ProgressPhase::CompletedWithErrors | ProgressPhase::Cancelled => {
                tracing::warn!("📊 [PROGRESS] {}", update.message)
            }
            _ => tracing::info!("📊 [PROGRESS] {}/{} {}", update.current, update.total, update.message),
        }
        self.record(update);
    }
}

/// Forwards every update to each inner reporter in order.
#[derive(Clone, Default)]
pub struct ProgressFanout {
    reporters: Vec<Arc<dyn ProgressReporter>>,
}

impl ProgressFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

#[async_trait]
impl ProgressReporter for ProgressFanout {
    async fn report(&self, update: ProgressUpdate) {
        for reporter in &self.reporters {
            reporter.report(update.clone()).await;
        }
    }
}

/// Stop request for a batch run, honoured between matches.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
