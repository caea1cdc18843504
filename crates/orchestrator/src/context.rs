use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cycle::CycleOutcome;

/// Run state owned by the orchestrator and shared with whoever reports status.
#[derive(Debug, Default)]
pub struct RunContext {
    running: AtomicBool,
    vote_count: AtomicU64,
    cycles: AtomicU64,
    last_outcome: Mutex<Option<CycleOutcome>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub vote_count: u64,
    pub cycles: u64,
    pub last_outcome: Option<CycleOutcome>,
    pub started_at: Option<DateTime<Utc>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn vote_count(&self) -> u64 {
        self.vote_count.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_started(&self) {
        self.running.store(true, Ordering::SeqCst);
        *self.started_at.lock() = Some(Utc::now());
    }

    pub(crate) fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
        *self.started_at.lock() = None;
    }

    pub(crate) fn count_vote(&self) -> u64 {
        self.vote_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record(&self, outcome: CycleOutcome) {
        if outcome.ran() {
            self.cycles.fetch_add(1, Ordering::SeqCst);
        }
        *self.last_outcome.lock() = Some(outcome);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.is_running(),
            vote_count: self.vote_count(),
            cycles: self.cycles.load(Ordering::SeqCst),
            last_outcome: *self.last_outcome.lock(),
            started_at: *self.started_at.lock(),
        }
    }
}
