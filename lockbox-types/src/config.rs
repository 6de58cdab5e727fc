use serde::{Deserialize, Serialize};

use crate::error::LockboxError;

/// In-process knob bundle for the Lockbox (§6, §1a).
///
/// Distinct from any on-disk config *file* format, which stays out of
/// scope: this is the validated, already-parsed value the Lockbox is
/// constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockboxConfig {
    pub lock_timeout_millis: u64,
    pub max_num_batch_tasks: u32,
    pub max_retry: u32,
    pub task_status_check_period_ms: u64,
}

impl Default for LockboxConfig {
    fn default() -> Self {
        Self {
            lock_timeout_millis: 5 * 60 * 1000,
            max_num_batch_tasks: 100,
            max_retry: 3,
            task_status_check_period_ms: 1000,
        }
    }
}

impl LockboxConfig {
    pub fn validate(&self) -> Result<(), LockboxError> {
        if self.lock_timeout_millis == 0 {
            return Err(LockboxError::InvalidConfig(
                "lockTimeoutMillis must be positive".into(),
            ));
        }
        if self.max_num_batch_tasks == 0 {
            return Err(LockboxError::InvalidConfig(
                "maxNumBatchTasks must be positive".into(),
            ));
        }
        if self.task_status_check_period_ms == 0 {
            return Err(LockboxError::InvalidConfig(
                "taskStatusCheckPeriodMs must be positive".into(),
            ));
        }
        Ok(())
    }
}
