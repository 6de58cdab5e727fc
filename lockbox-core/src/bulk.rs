use std::sync::Arc;

use lockbox_types::{
    Interval, LockGranularity, LockKind, LockboxError, LockboxResult, PartialShardSpec,
    SegmentIdWithShardSpec,
};

use crate::lockbox::Lockbox;

/// A bulk allocation request: one fresh EXCLUSIVE lease over `interval`,
/// then `n` contiguous identities minted from `factory` in one critical
/// section (§4.4).
pub struct BulkAllocationRequest<'a> {
    pub task_id: &'a str,
    pub interval: Interval,
    pub n: usize,
    pub factory: &'a (dyn Fn(usize) -> PartialShardSpec + Sync),
}

/// Locks an interval once and mints `n` contiguous partition identities
/// under it, used by parallel batch phases whose per-interval partitioning
/// is known up front (§4.4).
pub struct BulkAllocator {
    lockbox: Arc<Lockbox>,
    data_source: String,
}

impl BulkAllocator {
    pub fn new(lockbox: Arc<Lockbox>, data_source: String) -> Self {
        Self { lockbox, data_source }
    }

    pub fn allocate(
        &self,
        request: BulkAllocationRequest<'_>,
    ) -> LockboxResult<Vec<SegmentIdWithShardSpec>> {
        let lease = self.lockbox.lock(
            request.task_id,
            request.interval,
            LockKind::Exclusive,
            LockGranularity::TimeChunk,
        )?;

        if lease.revoked {
            return Err(LockboxError::Revoked {
                task: request.task_id.to_string(),
            });
        }

        let mut identities = Vec::with_capacity(request.n);
        for ordinal in 0..request.n {
            let partial = (request.factory)(ordinal);
            let shard_spec =
                self.lockbox
                    .complete_partition(&self.data_source, request.interval, &partial);
            identities.push(SegmentIdWithShardSpec {
                data_source: self.data_source.clone(),
                interval: request.interval,
                version: lease.version.clone(),
                shard_spec,
            });
        }

        if identities.len() != request.n {
            return Err(LockboxError::PartitionMismatch {
                expected: request.n,
                actual: identities.len(),
            });
        }

        log::debug!(
            "bulk-allocated {} identities for task {:?} on {}",
            identities.len(),
            request.task_id,
            request.interval
        );
        Ok(identities)
    }
}
