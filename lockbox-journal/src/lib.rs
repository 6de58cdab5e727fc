//! External-collaborator traits for the lock-and-allocation core (§6).
//!
//! The Lockbox never talks to a database, a task-status service, or a
//! segment index directly — it talks to these three traits. Production
//! implementations live outside this crate (and outside this repository's
//! scope, per §1); [`memory`] ships fakes good enough to drive the §8
//! scenario tests without standing up anything external.

use lockbox_types::{Interval, JournaledLease, LockboxResult, ShardSpec, TaskLock};

pub mod memory;

/// Append-only log of lease records (§6 "Lock journal").
///
/// Ordering within one task id is by `version`; durability is the
/// implementor's contract, not the core's.
pub trait LockJournal: Send + Sync {
    fn append(&self, task_id: &str, lease: &TaskLock) -> LockboxResult<()>;
    fn replace(&self, task_id: &str, old: &TaskLock, new: &TaskLock) -> LockboxResult<()>;
    fn remove(&self, task_id: &str, lease: &TaskLock) -> LockboxResult<()>;
    fn list_by_task(&self, task_id: &str) -> Vec<JournaledLease>;
    fn list_active_tasks(&self) -> Vec<String>;
}

/// A task's static metadata, as known to the external task catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub task_id: String,
    pub group_id: String,
    pub data_source: String,
    pub priority: i32,
}

/// Lookup of task metadata by id, and enumeration of active tasks at
/// startup (§6 "Task catalog").
pub trait TaskCatalog: Send + Sync {
    fn task_by_id(&self, id: &str) -> Option<TaskDescriptor>;
    fn active_tasks(&self) -> Vec<TaskDescriptor>;
}

/// A previously-published segment, as reported by the historical index.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub interval: Interval,
    pub version: String,
    pub shard_spec: ShardSpec,
}

/// Read-only (from the core's perspective) index of already-published
/// segments (§6 "Historical segment index").
pub trait HistoricalSegmentIndex: Send + Sync {
    fn max_partition_spec(&self, data_source: &str, interval: &Interval) -> Option<ShardSpec>;
    fn segments_overlapping(&self, data_source: &str, interval: &Interval) -> Vec<DataSegment>;
}
