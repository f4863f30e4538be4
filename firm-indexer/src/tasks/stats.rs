//! Counters for the pipeline, logged periodically by the orchestrator.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    geocode_succeeded: AtomicU64,
    geocode_failed: AtomicU64,
    documents_stored: AtomicU64,
    documents_deleted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_retried: AtomicU64,
    tasks_abandoned: AtomicU64,
}

/// A point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub geocode_succeeded: u64,
    /// Lookups that ended without coordinates: no match, no address or a
    /// provider error.
    pub geocode_failed: u64,
    pub documents_stored: u64,
    pub documents_deleted: u64,
    pub tasks_completed: u64,
    pub tasks_retried: u64,
    pub tasks_abandoned: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_geocode_success(&self) {
        self.geocode_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_geocode_failure(&self) {
        self.geocode_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document_stored(&self) {
        self.documents_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document_deleted(&self) {
        self.documents_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_retried(&self) {
        self.tasks_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_abandoned(&self) {
        self.tasks_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            geocode_succeeded: self.geocode_succeeded.load(Ordering::Relaxed),
            geocode_failed: self.geocode_failed.load(Ordering::Relaxed),
            documents_stored: self.documents_stored.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_retried: self.tasks_retried.load(Ordering::Relaxed),
            tasks_abandoned: self.tasks_abandoned.load(Ordering::Relaxed),
        }
    }
}
