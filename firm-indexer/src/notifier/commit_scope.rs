//! Per-transaction outbox of pending tasks.

use std::future::Future;

use firm_indexer_shared::EntityChange;
use tracing::{debug, error, info, warn};

use crate::notifier::ChangeNotifier;
use crate::queue::Task;

/// Lifecycle of a [`CommitScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// Nothing recorded yet.
    Unchanged,
    /// Changes recorded, transaction still open.
    Dirty,
    /// The transaction committed; tasks are being handed to the queue.
    Committed,
    /// Every pending task was handed to the queue (or reported as failed).
    Flushed,
    /// The transaction was abandoned; nothing was scheduled.
    RolledBack,
}

/// What a flush handed to the queue.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommitReport {
    pub scheduled: Vec<Task>,
    /// Tasks the queue refused, with the reason. The commit itself stands.
    pub failed: Vec<(Task, String)>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Collects the tasks caused by one transaction and releases them only once
/// the transaction commits.
///
/// Tasks are deduplicated by kind and target: recording two changes to the
/// same firm yields one `index_firm`. Dropping the scope without committing
/// schedules nothing.
///
/// # Example
///
/// ```ignore
/// let mut scope = notifier.begin();
/// scope.record(&EntityChange::office_saved(before.as_ref(), &office, main_before, main_after));
/// let report = scope.commit(transaction.commit()).await?;
/// ```
pub struct CommitScope {
    notifier: ChangeNotifier,
    pending: Vec<Task>,
    state: CommitState,
}

impl CommitScope {
    pub(crate) fn new(notifier: ChangeNotifier) -> Self {
        Self {
            notifier,
            pending: Vec::new(),
            state: CommitState::Unchanged,
        }
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    /// Tasks that will be scheduled on commit.
    pub fn pending(&self) -> &[Task] {
        &self.pending
    }

    pub fn record(&mut self, change: &EntityChange) {
        if !matches!(self.state, CommitState::Unchanged | CommitState::Dirty) {
            warn!(state = ?self.state, change = ?change, "Ignoring change recorded after the scope closed");
            return;
        }

        for task in self.notifier.tasks_for(change) {
            match self.pending.iter_mut().find(|t| t.key() == task.key()) {
                Some(existing) => {
                    existing.merge(&task);
                }
                None => self.pending.push(task),
            }
        }
        self.state = CommitState::Dirty;
    }

    /// Await the caller's commit and schedule the pending tasks if it
    /// succeeds. A failed commit discards them and returns its error.
    pub async fn commit<F, E>(&mut self, commit: F) -> Result<CommitReport, E>
    where
        F: Future<Output = Result<(), E>>,
    {
        match commit.await {
            Ok(()) => Ok(self.mark_committed()),
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    /// Schedule the pending tasks for a transaction committed elsewhere.
    ///
    /// Only the first call schedules anything.
    pub fn mark_committed(&mut self) -> CommitReport {
        match self.state {
            CommitState::Unchanged | CommitState::Dirty => self.flush(),
            state => {
                debug!(state = ?state, "Scope already closed, nothing to schedule");
                CommitReport::default()
            }
        }
    }

    /// Discard the pending tasks.
    pub fn rollback(&mut self) {
        if self.state == CommitState::Flushed {
            warn!("Rollback after flush ignored, tasks were already scheduled");
            return;
        }
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "Discarding pending tasks");
        }
        self.pending.clear();
        self.state = CommitState::RolledBack;
    }

    fn flush(&mut self) -> CommitReport {
        self.state = CommitState::Committed;

        let mut report = CommitReport::default();
        for task in self.pending.drain(..) {
            match self.notifier.queue().enqueue(task) {
                Ok(()) => report.scheduled.push(task),
                Err(e) => {
                    error!(task = %task, error = %e, "Failed to schedule task after commit");
                    report.failed.push((task, e.to_string()));
                }
            }
        }

        self.state = CommitState::Flushed;
        if !report.scheduled.is_empty() || !report.failed.is_empty() {
            info!(
                scheduled = report.scheduled.len(),
                failed = report.failed.len(),
                "Scheduled tasks after commit"
            );
        }
        report
    }
}

impl Drop for CommitScope {
    fn drop(&mut self) {
        if self.state == CommitState::Dirty && !self.pending.is_empty() {
            debug!(
                count = self.pending.len(),
                "Scope dropped without commit, discarding pending tasks"
            );
        }
    }
}
