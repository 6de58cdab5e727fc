use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// Whether a lease permits other tasks of the same group to hold it
/// concurrently, or demands sole ownership of the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    #[serde(rename = "SHARED")]
    Shared,
    #[serde(rename = "EXCLUSIVE")]
    Exclusive,
}

/// The granularity a lease covers: a whole time-chunk bucket, or a single
/// partition slice within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockGranularity {
    #[serde(rename = "TIME_CHUNK")]
    TimeChunk,
    #[serde(rename = "SEGMENT")]
    Segment,
}

/// A time-bounded, priority-ordered grant entitling one or more tasks of a
/// group to publish segments into an interval of a data source.
///
/// `version` orders acquisitions of the same interval; `revoked` is sticky
/// (set by preemption, never cleared); `upgraded` only ever applies to an
/// `Exclusive` lease and renders it non-revocable while set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLock {
    pub kind: LockKind,
    pub granularity: LockGranularity,
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "dataSource")]
    pub data_source: String,
    pub interval: Interval,
    pub version: String,
    pub priority: i32,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub upgraded: bool,
}

impl TaskLock {
    /// A lease can be revoked by a requester of the given priority only if
    /// it is not itself upgraded, and the requester outranks it (§4.1 step 4,
    /// §8 property 7 "upgrade immunity").
    pub fn is_revocable_by(&self, requester_priority: i32) -> bool {
        !self.upgraded && self.priority < requester_priority
    }
}

/// The in-memory record binding a lease to its current holder tasks.
///
/// A posse is garbage-collected once its task set becomes empty; adding a
/// task to an existing posse requires its `groupId` and `priority` to match
/// the posse's lease.
#[derive(Debug, Clone)]
pub struct LockPosse {
    pub lease: TaskLock,
    pub tasks: BTreeSet<String>,
}

impl LockPosse {
    pub fn new(lease: TaskLock, first_task: String) -> Self {
        let mut tasks = BTreeSet::new();
        tasks.insert(first_task);
        Self { lease, tasks }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// The durable record a lock journal stores: which task requested the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournaledLease {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub lease: TaskLock,
}

#[cfg(test)]
mod test {
    use super::*;

    fn lease(priority: i32, upgraded: bool) -> TaskLock {
        TaskLock {
            kind: LockKind::Exclusive,
            granularity: LockGranularity::TimeChunk,
            group_id: "group".into(),
            data_source: "ds".into(),
            interval: Interval::new(0, 1000).unwrap(),
            version: "v1".into(),
            priority,
            revoked: false,
            upgraded,
        }
    }

    #[test]
    fn revocable_only_when_lower_priority_and_not_upgraded() {
        assert!(lease(1, false).is_revocable_by(5));
        assert!(!lease(5, false).is_revocable_by(1));
        assert!(!lease(1, true).is_revocable_by(5), "upgraded leases are immune");
    }
}
