//! In-memory reference implementations of the §6 external collaborators.
//!
//! These are test/demo scaffolding, not a production journal: there is no
//! persistence across process restarts beyond what the owning process keeps
//! alive. They exist so the Lockbox and allocators are independently
//! testable (§2a).

use std::collections::HashMap;
use std::sync::Mutex;

use lockbox_types::{Interval, JournaledLease, LockboxError, LockboxResult, ShardSpec, TaskLock};

use crate::{DataSegment, HistoricalSegmentIndex, LockJournal, TaskCatalog, TaskDescriptor};

/// An in-memory `LockJournal` keyed by task id.
#[derive(Default)]
pub struct InMemoryLockJournal {
    by_task: Mutex<HashMap<String, Vec<TaskLock>>>,
}

impl InMemoryLockJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockJournal for InMemoryLockJournal {
    fn append(&self, task_id: &str, lease: &TaskLock) -> LockboxResult<()> {
        let mut by_task = self.by_task.lock().unwrap();
        by_task
            .entry(task_id.to_string())
            .or_default()
            .push(lease.clone());
        Ok(())
    }

    fn replace(&self, task_id: &str, old: &TaskLock, new: &TaskLock) -> LockboxResult<()> {
        let mut by_task = self.by_task.lock().unwrap();
        let leases = by_task.entry(task_id.to_string()).or_default();
        match leases.iter_mut().find(|l| *l == old) {
            Some(slot) => {
                *slot = new.clone();
                Ok(())
            }
            None => Err(LockboxError::JournalFailure(format!(
                "no journaled lease for task {task_id:?} matches the expected previous value"
            ))),
        }
    }

    fn remove(&self, task_id: &str, lease: &TaskLock) -> LockboxResult<()> {
        let mut by_task = self.by_task.lock().unwrap();
        if let Some(leases) = by_task.get_mut(task_id) {
            leases.retain(|l| l != lease);
        }
        Ok(())
    }

    fn list_by_task(&self, task_id: &str) -> Vec<JournaledLease> {
        let by_task = self.by_task.lock().unwrap();
        by_task
            .get(task_id)
            .into_iter()
            .flatten()
            .map(|lease| JournaledLease {
                task_id: task_id.to_string(),
                lease: lease.clone(),
            })
            .collect()
    }

    fn list_active_tasks(&self) -> Vec<String> {
        let by_task = self.by_task.lock().unwrap();
        by_task
            .iter()
            .filter(|(_, leases)| !leases.is_empty())
            .map(|(task_id, _)| task_id.clone())
            .collect()
    }
}

/// An in-memory `TaskCatalog` the test harness populates directly.
#[derive(Default)]
pub struct InMemoryTaskCatalog {
    tasks: Mutex<HashMap<String, TaskDescriptor>>,
}

impl InMemoryTaskCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: TaskDescriptor) {
        self.tasks.lock().unwrap().insert(task.task_id.clone(), task);
    }

    pub fn remove(&self, task_id: &str) {
        self.tasks.lock().unwrap().remove(task_id);
    }
}

impl TaskCatalog for InMemoryTaskCatalog {
    fn task_by_id(&self, id: &str) -> Option<TaskDescriptor> {
        self.tasks.lock().unwrap().get(id).cloned()
    }

    fn active_tasks(&self) -> Vec<TaskDescriptor> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }
}

/// An in-memory `HistoricalSegmentIndex` the test harness populates with
/// pre-announced segments.
#[derive(Default)]
pub struct InMemoryHistoricalIndex {
    by_source: Mutex<HashMap<String, Vec<DataSegment>>>,
}

impl InMemoryHistoricalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announce(&self, data_source: &str, segment: DataSegment) {
        self.by_source
            .lock()
            .unwrap()
            .entry(data_source.to_string())
            .or_default()
            .push(segment);
    }
}

impl HistoricalSegmentIndex for InMemoryHistoricalIndex {
    fn max_partition_spec(&self, data_source: &str, interval: &Interval) -> Option<ShardSpec> {
        let by_source = self.by_source.lock().unwrap();
        by_source
            .get(data_source)?
            .iter()
            .filter(|s| s.interval == *interval)
            .map(|s| s.shard_spec.clone())
            .max_by_key(|s| s.partition_num())
    }

    fn segments_overlapping(&self, data_source: &str, interval: &Interval) -> Vec<DataSegment> {
        let by_source = self.by_source.lock().unwrap();
        by_source
            .get(data_source)
            .into_iter()
            .flatten()
            .filter(|s| s.interval.overlaps(interval))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lockbox_types::{LockGranularity, LockKind};

    fn lease() -> TaskLock {
        TaskLock {
            kind: LockKind::Exclusive,
            granularity: LockGranularity::TimeChunk,
            group_id: "group".into(),
            data_source: "ds".into(),
            interval: Interval::new(0, 1000).unwrap(),
            version: "v1".into(),
            priority: 0,
            revoked: false,
            upgraded: false,
        }
    }

    #[test]
    fn append_then_list_by_task() {
        let journal = InMemoryLockJournal::new();
        journal.append("task-a", &lease()).unwrap();
        let listed = journal.list_by_task("task-a");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].lease, lease());
    }

    #[test]
    fn replace_requires_matching_previous_value() {
        let journal = InMemoryLockJournal::new();
        journal.append("task-a", &lease()).unwrap();
        let mut revoked = lease();
        revoked.revoked = true;
        journal.replace("task-a", &lease(), &revoked).unwrap();
        assert_eq!(journal.list_by_task("task-a")[0].lease.revoked, true);

        let err = journal.replace("task-a", &lease(), &revoked);
        assert!(err.is_err(), "stale previous value must be rejected");
    }

    #[test]
    fn historical_index_reports_highest_partition() {
        let index = InMemoryHistoricalIndex::new();
        let interval = Interval::new(0, 1000).unwrap();
        index.announce(
            "ds",
            DataSegment {
                interval,
                version: "v1".into(),
                shard_spec: ShardSpec::Numbered {
                    partition_num: 0,
                    num_core_partitions: 2,
                },
            },
        );
        index.announce(
            "ds",
            DataSegment {
                interval,
                version: "v1".into(),
                shard_spec: ShardSpec::Numbered {
                    partition_num: 1,
                    num_core_partitions: 2,
                },
            },
        );
        let max = index.max_partition_spec("ds", &interval).unwrap();
        assert_eq!(max.partition_num(), 1);
    }
}
