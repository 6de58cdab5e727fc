use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use lockbox_journal::{HistoricalSegmentIndex, LockJournal, TaskCatalog, TaskDescriptor};
use lockbox_types::{
    Interval, LockGranularity, LockKind, LockPosse, LockboxConfig, LockboxError, LockboxResult,
    PartialShardSpec, ShardSpec, TaskLock,
};

use crate::clock::Versioner;

/// Outcome of a non-blocking grant attempt (§4.1 `try_lock`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttempt {
    Granted(TaskLock),
    Failed { revoked: bool },
}

type PosseMap = BTreeMap<Interval, Vec<LockPosse>>;

struct LockboxState {
    active: HashMap<String, TaskDescriptor>,
    posses: HashMap<String, PosseMap>,
    high_water: HashMap<(String, Interval), ShardSpec>,
}

impl LockboxState {
    fn new() -> Self {
        Self {
            active: HashMap::new(),
            posses: HashMap::new(),
            high_water: HashMap::new(),
        }
    }
}

/// The concurrent critical section maintaining the authoritative in-memory
/// picture of leases (§4.1).
///
/// All public operations besides [`Lockbox::lock`] complete without
/// blocking; `lock` waits on an internal condition variable that every
/// release signals.
pub struct Lockbox {
    config: LockboxConfig,
    journal: Arc<dyn LockJournal>,
    catalog: Arc<dyn TaskCatalog>,
    historical: Arc<dyn HistoricalSegmentIndex>,
    versioner: Versioner,
    state: Mutex<LockboxState>,
    released: Condvar,
}

impl Lockbox {
    pub fn new(
        config: LockboxConfig,
        journal: Arc<dyn LockJournal>,
        catalog: Arc<dyn TaskCatalog>,
        historical: Arc<dyn HistoricalSegmentIndex>,
    ) -> LockboxResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            journal,
            catalog,
            historical,
            versioner: Versioner::new(),
            state: Mutex::new(LockboxState::new()),
            released: Condvar::new(),
        })
    }

    pub fn config(&self) -> &LockboxConfig {
        &self.config
    }

    pub fn historical_index(&self) -> &Arc<dyn HistoricalSegmentIndex> {
        &self.historical
    }

    /// Marks `task` active. Idempotent: re-adding an already-active task
    /// simply refreshes its descriptor.
    pub fn add(&self, task: TaskDescriptor) {
        log::debug!("task {:?} marked active", task.task_id);
        let mut state = self.state.lock().unwrap();
        state.active.insert(task.task_id.clone(), task);
    }

    /// Releases every lease `task_id` holds, then clears its active flag.
    pub fn remove(&self, task_id: &str) {
        let mut state = self.state.lock().unwrap();
        for posse_map in state.posses.values_mut() {
            for posses in posse_map.values_mut() {
                for posse in posses.iter_mut() {
                    if posse.tasks.remove(task_id) {
                        if let Err(err) = self.journal.remove(task_id, &posse.lease) {
                            log::warn!("journal remove failed during task teardown: {err}");
                        }
                    }
                }
            }
        }
        for posse_map in state.posses.values_mut() {
            for posses in posse_map.values_mut() {
                posses.retain(|p| !p.is_empty());
            }
        }
        state.active.remove(task_id);
        log::debug!("task {task_id:?} removed, releasing all held leases");
        drop(state);
        self.released.notify_all();
    }

    /// Non-blocking grant attempt (§4.1 steps 1-6).
    pub fn try_lock(
        &self,
        task_id: &str,
        interval: Interval,
        kind: LockKind,
        granularity: LockGranularity,
    ) -> LockboxResult<LockAttempt> {
        let mut state = self.state.lock().unwrap();
        let attempt = self.try_lock_locked(&mut state, task_id, interval, kind, granularity, None)?;
        if matches!(attempt, LockAttempt::Granted(_)) {
            drop(state);
            self.released.notify_all();
        }
        Ok(attempt)
    }

    /// Blocks up to `lockTimeoutMillis` for a lease, retrying on contention
    /// and waking whenever any release is signaled.
    pub fn lock(
        &self,
        task_id: &str,
        interval: Interval,
        kind: LockKind,
        granularity: LockGranularity,
    ) -> LockboxResult<TaskLock> {
        let deadline = Instant::now() + Duration::from_millis(self.config.lock_timeout_millis);
        let mut state = self.state.lock().unwrap();
        loop {
            match self.try_lock_locked(&mut state, task_id, interval, kind, granularity, None)? {
                LockAttempt::Granted(lease) => {
                    drop(state);
                    self.released.notify_all();
                    return Ok(lease);
                }
                LockAttempt::Failed { revoked: true } => {
                    return Err(LockboxError::Revoked {
                        task: task_id.to_string(),
                    });
                }
                LockAttempt::Failed { revoked: false } => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LockboxError::Timeout(format!(
                            "lock({task_id:?}) on {interval} timed out"
                        )));
                    }
                    let remaining = deadline - now;
                    let (guard, timeout) =
                        self.released.wait_timeout(state, remaining).unwrap();
                    state = guard;
                    if timeout.timed_out() {
                        return Err(LockboxError::Timeout(format!(
                            "lock({task_id:?}) on {interval} timed out"
                        )));
                    }
                }
            }
        }
    }

    /// All leases currently held (or pending release after revocation) by
    /// `task_id`.
    pub fn find_locks_for_task(&self, task_id: &str) -> Vec<TaskLock> {
        let state = self.state.lock().unwrap();
        state
            .posses
            .values()
            .flat_map(|m| m.values())
            .flatten()
            .filter(|p| p.tasks.contains(task_id))
            .map(|p| p.lease.clone())
            .collect()
    }

    /// Sets the `upgraded` flag, rendering the lease non-revocable. Fails
    /// on a SHARED lease.
    pub fn upgrade(&self, task_id: &str, interval: Interval) -> LockboxResult<TaskLock> {
        self.replace_owned_lease(task_id, interval, |lease| {
            if lease.kind != LockKind::Exclusive {
                return Err(LockboxError::ConsistencyFault(
                    "cannot upgrade a SHARED lease".into(),
                ));
            }
            lease.upgraded = true;
            Ok(())
        })
    }

    /// Clears the `upgraded` flag. Fails on a SHARED lease.
    pub fn downgrade(&self, task_id: &str, interval: Interval) -> LockboxResult<TaskLock> {
        self.replace_owned_lease(task_id, interval, |lease| {
            if lease.kind != LockKind::Exclusive {
                return Err(LockboxError::ConsistencyFault(
                    "cannot downgrade a SHARED lease".into(),
                ));
            }
            lease.upgraded = false;
            Ok(())
        })
    }

    /// Removes `task_id` from the posse holding `interval`. Idempotent and
    /// logged-but-tolerated on an unknown interval.
    pub fn unlock(&self, task_id: &str, interval: Interval) {
        let mut state = self.state.lock().unwrap();
        let mut found = false;
        for posse_map in state.posses.values_mut() {
            if let Some(posses) = posse_map.get_mut(&interval) {
                for posse in posses.iter_mut() {
                    if posse.tasks.remove(task_id) {
                        found = true;
                        if let Err(err) = self.journal.remove(task_id, &posse.lease) {
                            log::warn!("journal remove failed during unlock: {err}");
                        }
                    }
                }
                posses.retain(|p| !p.is_empty());
            }
        }
        if !found {
            log::debug!("unlock({task_id:?}, {interval}) was a no-op: no matching lease");
        }
        drop(state);
        self.released.notify_all();
    }

    /// Completes `partial` into a full [`ShardSpec`] for `(data_source,
    /// interval)`, consulting and updating the within-process high-water
    /// cache under the same mutex that guards lease state (§4.3 step 4).
    ///
    /// Routing every allocator through this one method, rather than each
    /// allocator keeping its own cache, is what keeps partition numbers
    /// unique when several tasks mint against the same interval under one
    /// SHARED lease (§8 property 3): the mutex serializes them exactly as
    /// it already serializes `try_lock`.
    pub fn complete_partition(
        &self,
        data_source: &str,
        interval: Interval,
        partial: &PartialShardSpec,
    ) -> ShardSpec {
        let mut state = self.state.lock().unwrap();
        let key = (data_source.to_string(), interval);
        let prev = match state.high_water.get(&key) {
            Some(spec) => Some(spec.clone()),
            None => self.historical.max_partition_spec(data_source, &interval),
        };
        let shard_spec = partial.complete(prev.as_ref());
        state.high_water.insert(key, shard_spec.clone());
        shard_spec
    }

    /// Rebuilds in-memory state from the task catalog and lock journal
    /// (§4.1 "Resync").
    pub fn sync_from_storage(&self) -> LockboxResult<()> {
        let mut state = self.state.lock().unwrap();
        state.active.clear();
        state.posses.clear();
        for descriptor in self.catalog.active_tasks() {
            state.active.insert(descriptor.task_id.clone(), descriptor);
        }

        let mut leases = Vec::new();
        for task_id in self.journal.list_active_tasks() {
            leases.extend(self.journal.list_by_task(&task_id));
        }
        leases.sort_by(|a, b| {
            a.lease
                .version
                .cmp(&b.lease.version)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        for journaled in leases {
            if !state.active.contains_key(&journaled.task_id) {
                log::warn!(
                    "resync: lease for inactive task {:?} replayed anyway",
                    journaled.task_id
                );
            }
            self.versioner.observe_version(
                &journaled.lease.data_source,
                &journaled.lease.interval,
                &journaled.lease.version,
            );
            self.replay_lease(&mut state, &journaled.task_id, journaled.lease);
        }
        Ok(())
    }

    fn replay_lease(&self, state: &mut LockboxState, task_id: &str, lease: TaskLock) {
        let posses = state
            .posses
            .entry(lease.data_source.clone())
            .or_default()
            .entry(lease.interval)
            .or_default();
        if let Some(existing) = posses.iter_mut().find(|p| p.lease == lease) {
            existing.tasks.insert(task_id.to_string());
        } else {
            posses.push(LockPosse::new(lease, task_id.to_string()));
        }
    }

    fn replace_owned_lease(
        &self,
        task_id: &str,
        interval: Interval,
        mutate: impl FnOnce(&mut TaskLock) -> LockboxResult<()>,
    ) -> LockboxResult<TaskLock> {
        let mut state = self.state.lock().unwrap();
        let mut target: Option<(String, usize, usize)> = None;
        for (data_source, posse_map) in state.posses.iter() {
            if let Some(posses) = posse_map.get(&interval) {
                for (idx, posse) in posses.iter().enumerate() {
                    if posse.tasks.contains(task_id) {
                        target = Some((data_source.clone(), idx, 0));
                        break;
                    }
                }
            }
            if target.is_some() {
                break;
            }
        }
        let (data_source, idx, _) = target.ok_or_else(|| {
            LockboxError::ConsistencyFault(format!(
                "task {task_id:?} holds no lease on {interval}"
            ))
        })?;
        let posses = state
            .posses
            .get_mut(&data_source)
            .unwrap()
            .get_mut(&interval)
            .unwrap();
        let old = posses[idx].lease.clone();
        let mut new = old.clone();
        if old.revoked {
            return Err(LockboxError::Revoked {
                task: task_id.to_string(),
            });
        }
        mutate(&mut new)?;
        self.journal.replace(task_id, &old, &new)?;
        posses[idx].lease = new.clone();
        log::debug!("task {task_id:?} lease on {interval} transitioned: {old:?} -> {new:?}");
        Ok(new)
    }

    fn try_lock_locked(
        &self,
        state: &mut LockboxState,
        task_id: &str,
        interval: Interval,
        kind: LockKind,
        granularity: LockGranularity,
        preferred_version: Option<String>,
    ) -> LockboxResult<LockAttempt> {
        if interval.is_empty() {
            return Err(LockboxError::EmptyInterval);
        }
        let descriptor = state
            .active
            .get(task_id)
            .cloned()
            .ok_or_else(|| LockboxError::InactiveTask(task_id.to_string()))?;

        let posse_map = state.posses.entry(descriptor.data_source.clone()).or_default();

        let overlapping: Vec<(Interval, usize)> = posse_map
            .iter()
            .filter(|(key, _)| key.overlaps(&interval))
            .flat_map(|(key, posses)| (0..posses.len()).map(move |idx| (*key, idx)))
            .collect();

        let self_revoked = overlapping.iter().any(|(key, idx)| {
            let posse = &posse_map[key][*idx];
            posse.lease.revoked && posse.lease.group_id == descriptor.group_id
        });
        if self_revoked {
            return Ok(LockAttempt::Failed { revoked: true });
        }

        let active: Vec<(Interval, usize)> = overlapping
            .into_iter()
            .filter(|(key, idx)| !posse_map[key][*idx].lease.revoked)
            .collect();

        if active.is_empty() {
            let lease = self.mint_lease(&descriptor, interval, kind, granularity, preferred_version);
            self.install_new_posse(state, &descriptor.data_source, task_id, lease.clone())?;
            log::debug!("granted new lease for task {task_id:?} on {interval}");
            return Ok(LockAttempt::Granted(lease));
        }

        let posse_map = state.posses.get_mut(&descriptor.data_source).unwrap();

        if kind == LockKind::Shared
            && active
                .iter()
                .all(|(key, idx)| posse_map[key][*idx].lease.kind == LockKind::Shared)
        {
            let matches: Vec<&(Interval, usize)> = active
                .iter()
                .filter(|(key, idx)| {
                    let posse = &posse_map[key][*idx];
                    posse.lease.group_id == descriptor.group_id && key.contains(&interval)
                })
                .collect();
            return match matches.as_slice() {
                [] => {
                    let lease =
                        self.mint_lease(&descriptor, interval, kind, granularity, preferred_version);
                    self.install_new_posse(state, &descriptor.data_source, task_id, lease.clone())?;
                    log::debug!("granted new SHARED lease for task {task_id:?} on {interval}");
                    Ok(LockAttempt::Granted(lease))
                }
                [(key, idx)] => {
                    let posse_map = state.posses.get_mut(&descriptor.data_source).unwrap();
                    let posse = &mut posse_map.get_mut(key).unwrap()[*idx];
                    posse.tasks.insert(task_id.to_string());
                    let lease = posse.lease.clone();
                    self.journal.append(task_id, &lease)?;
                    log::debug!("joined existing SHARED posse for task {task_id:?} on {interval}");
                    Ok(LockAttempt::Granted(lease))
                }
                _ => Err(LockboxError::ConsistencyFault(format!(
                    "more than one SHARED posse for group {:?} contains {interval}",
                    descriptor.group_id
                ))),
            };
        }

        if active.len() == 1 {
            let (key, idx) = active[0];
            let posse = &posse_map[&key][idx];
            if posse.lease.kind == kind
                && posse.lease.group_id == descriptor.group_id
                && key.contains(&interval)
            {
                let posse_map = state.posses.get_mut(&descriptor.data_source).unwrap();
                let posse = &mut posse_map.get_mut(&key).unwrap()[idx];
                posse.tasks.insert(task_id.to_string());
                let lease = posse.lease.clone();
                self.journal.append(task_id, &lease)?;
                log::debug!("joined existing posse for task {task_id:?} on {interval}");
                return Ok(LockAttempt::Granted(lease));
            }
            if posse.lease.kind != kind {
                return Err(LockboxError::ConsistencyFault(format!(
                    "posse on {interval} is {:?} but {kind:?} was requested",
                    posse.lease.kind
                )));
            }
        }

        let all_revocable = active
            .iter()
            .all(|(key, idx)| posse_map[key][*idx].lease.is_revocable_by(descriptor.priority));
        if !all_revocable {
            log::debug!("contention for task {task_id:?} on {interval}: not all posses revocable");
            return Ok(LockAttempt::Failed { revoked: false });
        }

        for (key, idx) in &active {
            let posse_map = state.posses.get_mut(&descriptor.data_source).unwrap();
            let posse = &mut posse_map.get_mut(key).unwrap()[*idx];
            let old = posse.lease.clone();
            let mut revoked = old.clone();
            revoked.revoked = true;
            for holder in posse.tasks.iter() {
                if let Err(err) = self.journal.replace(holder, &old, &revoked) {
                    log::warn!("journal replace failed while revoking: {err}");
                }
            }
            posse.lease = revoked;
            log::info!(
                "revoked lease held by group {:?} on {interval} in favor of priority {}",
                old.group_id,
                descriptor.priority
            );
        }

        let lease = self.mint_lease(&descriptor, interval, kind, granularity, preferred_version);
        self.install_new_posse(state, &descriptor.data_source, task_id, lease.clone())?;
        log::debug!("granted lease for task {task_id:?} on {interval} after preemption");
        Ok(LockAttempt::Granted(lease))
    }

    fn mint_lease(
        &self,
        descriptor: &TaskDescriptor,
        interval: Interval,
        kind: LockKind,
        granularity: LockGranularity,
        preferred_version: Option<String>,
    ) -> TaskLock {
        let version = match preferred_version {
            Some(v) => {
                self.versioner.observe_version(&descriptor.data_source, &interval, &v);
                v
            }
            None => self.versioner.next_version(&descriptor.data_source, &interval),
        };
        TaskLock {
            kind,
            granularity,
            group_id: descriptor.group_id.clone(),
            data_source: descriptor.data_source.clone(),
            interval,
            version,
            priority: descriptor.priority,
            revoked: false,
            upgraded: false,
        }
    }

    fn install_new_posse(
        &self,
        state: &mut LockboxState,
        data_source: &str,
        task_id: &str,
        lease: TaskLock,
    ) -> LockboxResult<()> {
        self.journal.append(task_id, &lease)?;
        state
            .posses
            .entry(data_source.to_string())
            .or_default()
            .entry(lease.interval)
            .or_default()
            .push(LockPosse::new(lease, task_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lockbox_journal::memory::{InMemoryHistoricalIndex, InMemoryLockJournal, InMemoryTaskCatalog};

    fn lockbox() -> Lockbox {
        Lockbox::new(
            LockboxConfig::default(),
            Arc::new(InMemoryLockJournal::new()),
            Arc::new(InMemoryTaskCatalog::new()),
            Arc::new(InMemoryHistoricalIndex::new()),
        )
        .unwrap()
    }

    fn add_task(lockbox: &Lockbox, task_id: &str, group_id: &str, priority: i32) {
        lockbox.add(TaskDescriptor {
            task_id: task_id.to_string(),
            group_id: group_id.to_string(),
            data_source: "ds".to_string(),
            priority,
        });
    }

    #[test]
    fn rejects_inactive_task() {
        let lockbox = lockbox();
        let interval = Interval::new(0, 1000).unwrap();
        let err = lockbox
            .try_lock("ghost", interval, LockKind::Exclusive, LockGranularity::TimeChunk)
            .unwrap_err();
        assert!(matches!(err, LockboxError::InactiveTask(_)));
    }

    #[test]
    fn grants_fresh_exclusive_lease() {
        let lockbox = lockbox();
        add_task(&lockbox, "t1", "g1", 0);
        let interval = Interval::new(0, 1000).unwrap();
        let attempt = lockbox
            .try_lock("t1", interval, LockKind::Exclusive, LockGranularity::TimeChunk)
            .unwrap();
        assert!(matches!(attempt, LockAttempt::Granted(_)));
    }

    #[test]
    fn higher_priority_preempts_lower_and_revokes() {
        let lockbox = lockbox();
        add_task(&lockbox, "low", "g-low", 1);
        add_task(&lockbox, "high", "g-high", 5);
        let interval = Interval::new(0, 1000).unwrap();

        lockbox
            .try_lock("low", interval, LockKind::Exclusive, LockGranularity::TimeChunk)
            .unwrap();
        let attempt = lockbox
            .try_lock("high", interval, LockKind::Exclusive, LockGranularity::TimeChunk)
            .unwrap();
        assert!(matches!(attempt, LockAttempt::Granted(_)));

        let follow_up = lockbox
            .try_lock("low", interval, LockKind::Exclusive, LockGranularity::TimeChunk)
            .unwrap();
        assert_eq!(follow_up, LockAttempt::Failed { revoked: true });
    }

    #[test]
    fn upgraded_lease_is_never_preempted() {
        let lockbox = lockbox();
        add_task(&lockbox, "low", "g-low", 1);
        add_task(&lockbox, "high", "g-high", 5);
        let interval = Interval::new(0, 1000).unwrap();

        lockbox
            .try_lock("low", interval, LockKind::Exclusive, LockGranularity::TimeChunk)
            .unwrap();
        lockbox.upgrade("low", interval).unwrap();

        let attempt = lockbox
            .try_lock("high", interval, LockKind::Exclusive, LockGranularity::TimeChunk)
            .unwrap();
        assert_eq!(attempt, LockAttempt::Failed { revoked: false });
    }

    #[test]
    fn shared_leases_from_different_groups_coexist() {
        let lockbox = lockbox();
        add_task(&lockbox, "t1", "g1", 0);
        add_task(&lockbox, "t2", "g2", 0);
        let interval = Interval::new(0, 1000).unwrap();

        let a = lockbox
            .try_lock("t1", interval, LockKind::Shared, LockGranularity::TimeChunk)
            .unwrap();
        let b = lockbox
            .try_lock("t2", interval, LockKind::Shared, LockGranularity::TimeChunk)
            .unwrap();
        assert!(matches!(a, LockAttempt::Granted(_)));
        assert!(matches!(b, LockAttempt::Granted(_)));
    }

    #[test]
    fn remove_releases_all_held_leases() {
        let lockbox = lockbox();
        add_task(&lockbox, "t1", "g1", 0);
        let interval = Interval::new(0, 1000).unwrap();
        lockbox
            .try_lock("t1", interval, LockKind::Exclusive, LockGranularity::TimeChunk)
            .unwrap();
        lockbox.remove("t1");
        assert!(lockbox.find_locks_for_task("t1").is_empty());
    }

    #[test]
    fn two_tasks_sharing_a_lease_mint_distinct_partition_numbers() {
        let lockbox = lockbox();
        add_task(&lockbox, "t1", "g1", 0);
        add_task(&lockbox, "t2", "g1", 0);
        let interval = Interval::new(0, 1000).unwrap();

        lockbox
            .try_lock("t1", interval, LockKind::Shared, LockGranularity::TimeChunk)
            .unwrap();
        lockbox
            .try_lock("t2", interval, LockKind::Shared, LockGranularity::TimeChunk)
            .unwrap();

        let first = lockbox.complete_partition("ds", interval, &lockbox_types::PartialShardSpec::Numbered);
        let second = lockbox.complete_partition("ds", interval, &lockbox_types::PartialShardSpec::Numbered);
        assert_ne!(first.partition_num(), second.partition_num());
    }
}
