//! Task payloads carried by the queue.

use chrono::{DateTime, TimeDelta, Utc};
use firm_indexer_shared::{AdviserId, FirmId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// A unit of background work.
///
/// Tasks carry ids, never entity data: every task reloads current state when
/// it runs, so tasks for the same firm converge regardless of the order they
/// run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    GeocodeFirm {
        firm_id: FirmId,
        address_changed: bool,
    },
    GeocodeAdviser {
        adviser_id: AdviserId,
        address_changed: bool,
    },
    IndexFirm {
        firm_id: FirmId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    GeocodeFirm,
    GeocodeAdviser,
    IndexFirm,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeocodeFirm => "geocode_firm",
            Self::GeocodeAdviser => "geocode_adviser",
            Self::IndexFirm => "index_firm",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Task {
    pub fn geocode_firm(firm_id: FirmId, address_changed: bool) -> Self {
        Self::GeocodeFirm {
            firm_id,
            address_changed,
        }
    }

    pub fn geocode_adviser(adviser_id: AdviserId, address_changed: bool) -> Self {
        Self::GeocodeAdviser {
            adviser_id,
            address_changed,
        }
    }

    pub fn index_firm(firm_id: FirmId) -> Self {
        Self::IndexFirm { firm_id }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::GeocodeFirm { .. } => TaskKind::GeocodeFirm,
            Self::GeocodeAdviser { .. } => TaskKind::GeocodeAdviser,
            Self::IndexFirm { .. } => TaskKind::IndexFirm,
        }
    }

    /// Deduplication key: the task kind and the id of its target.
    pub fn key(&self) -> (TaskKind, i64) {
        let id = match self {
            Self::GeocodeFirm { firm_id, .. } | Self::IndexFirm { firm_id } => firm_id.get(),
            Self::GeocodeAdviser { adviser_id, .. } => adviser_id.get(),
        };
        (self.kind(), id)
    }

    /// Fold a duplicate request into this one. An address change recorded by
    /// either request is kept.
    ///
    /// Returns `false`, leaving `self` untouched, when the keys differ.
    pub fn merge(&mut self, other: &Task) -> bool {
        if self.key() != other.key() {
            return false;
        }
        match (self, other) {
            (
                Self::GeocodeFirm {
                    address_changed, ..
                },
                Self::GeocodeFirm {
                    address_changed: other_changed,
                    ..
                },
            )
            | (
                Self::GeocodeAdviser {
                    address_changed, ..
                },
                Self::GeocodeAdviser {
                    address_changed: other_changed,
                    ..
                },
            ) => *address_changed |= *other_changed,
            _ => {}
        }
        true
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, id) = self.key();
        write!(f, "{}:{}", kind, id)
    }
}

/// A task as it travels on the queue.
///
/// Redeliveries keep the envelope id, so every attempt at the same task can
/// be correlated in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub task: Task,
    /// 1 for the first delivery.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time the task may run. Set on retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
}

impl TaskEnvelope {
    pub fn new(task: Task) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            attempt: 1,
            enqueued_at: Utc::now(),
            not_before: None,
        }
    }

    /// The envelope for the next attempt at the same task, held back by
    /// `delay`.
    pub fn next_attempt(&self, delay: Duration) -> Self {
        let now = Utc::now();
        let delay = TimeDelta::from_std(delay).unwrap_or_else(|_| TimeDelta::zero());
        Self {
            id: self.id,
            task: self.task,
            attempt: self.attempt + 1,
            enqueued_at: now,
            not_before: Some(now + delay),
        }
    }

    /// Time left before the task may run, if any.
    pub fn remaining_delay(&self) -> Option<Duration> {
        let not_before = self.not_before?;
        (not_before - Utc::now())
            .to_std()
            .ok()
            .filter(|delay| !delay.is_zero())
    }
}
