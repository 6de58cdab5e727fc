use lockbox_types::{LockboxResult, SegmentIdWithShardSpec};

use crate::allocator::{AllocateRequest, SegmentAllocator};

/// Thin wrapper that annotates an allocation with a supervising-task
/// identity for audit/routing purposes. It does not alter outcomes (§2
/// "Supervisor-Wrap Layer"): every call is forwarded unchanged to the
/// wrapped [`SegmentAllocator`], with the supervisor id only affecting the
/// log line emitted around the call.
pub struct SupervisedAllocator<'a> {
    inner: &'a SegmentAllocator,
    supervisor_task_id: String,
}

impl<'a> SupervisedAllocator<'a> {
    pub fn new(inner: &'a SegmentAllocator, supervisor_task_id: impl Into<String>) -> Self {
        Self {
            inner,
            supervisor_task_id: supervisor_task_id.into(),
        }
    }

    pub fn allocate(
        &self,
        request: AllocateRequest<'_>,
    ) -> LockboxResult<Option<SegmentIdWithShardSpec>> {
        let task_id = request.task_id.to_string();
        let result = self.inner.allocate(request);
        match &result {
            Ok(Some(segment)) => log::debug!(
                "supervisor {:?}: task {task_id:?} allocated partition {} on {}",
                self.supervisor_task_id,
                segment.partition_num(),
                segment.interval
            ),
            Ok(None) => log::debug!(
                "supervisor {:?}: task {task_id:?} allocation declined",
                self.supervisor_task_id
            ),
            Err(err) => log::debug!(
                "supervisor {:?}: task {task_id:?} allocation failed: {err}",
                self.supervisor_task_id
            ),
        }
        result
    }
}
