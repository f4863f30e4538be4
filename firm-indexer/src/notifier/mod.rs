//! Change notifier: turns committed entity changes into queued tasks.
//!
//! Writers open a [`CommitScope`] per transaction, record every change they
//! make, and hand the scope their commit. Tasks reach the queue only after
//! the commit succeeds, deduplicated per target for the whole transaction.

mod commit_scope;

pub use commit_scope::{CommitReport, CommitScope, CommitState};

use std::sync::Arc;

use firm_indexer_shared::{Affect, CoordinateTarget, EntityChange};

use crate::config::IndexPolicy;
use crate::queue::{Task, TaskQueue};

/// Entry point for writers of firms, offices and advisers.
#[derive(Clone)]
pub struct ChangeNotifier {
    queue: Arc<dyn TaskQueue>,
    policy: IndexPolicy,
}

impl ChangeNotifier {
    pub fn new(queue: Arc<dyn TaskQueue>, policy: IndexPolicy) -> Self {
        Self { queue, policy }
    }

    pub fn policy(&self) -> IndexPolicy {
        self.policy
    }

    /// Open a scope for one transaction.
    pub fn begin(&self) -> CommitScope {
        CommitScope::new(self.clone())
    }

    /// The tasks a committed change schedules under the configured policy.
    pub fn tasks_for(&self, change: &EntityChange) -> Vec<Task> {
        let mut tasks: Vec<Task> = change
            .affects()
            .into_iter()
            .map(|affect| match affect {
                Affect::Geocode(CoordinateTarget::Firm(id), changed) => {
                    Task::geocode_firm(id, changed)
                }
                Affect::Geocode(CoordinateTarget::Adviser(id), changed) => {
                    Task::geocode_adviser(id, changed)
                }
                Affect::Reindex(id) => Task::index_firm(id),
            })
            .collect();

        if self.policy.indexes_on_commit() || change.always_reindexes() {
            let index = Task::index_firm(change.firm_id());
            if !tasks.contains(&index) {
                tasks.push(index);
            }
        }

        tasks
    }

    pub(crate) fn queue(&self) -> &dyn TaskQueue {
        self.queue.as_ref()
    }
}
