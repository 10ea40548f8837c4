//! Per-worker write serialization.
//!
//! Every mutating schedule operation for a worker runs under that
//! worker's async mutex, so concurrent writers against the same worker
//! queue up instead of racing. Reads and other workers are unaffected.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::WorkerId;

#[derive(Clone, Default)]
pub(crate) struct WorkerLocks {
    inner: Arc<Mutex<HashMap<WorkerId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl WorkerLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lock handle for one worker, created on first use.
    pub(crate) fn for_worker(&self, worker_id: WorkerId) -> Arc<tokio::sync::Mutex<()>> {
        self.inner.lock().entry(worker_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_worker_shares_one_lock() {
        let locks = WorkerLocks::new();
        let first = locks.for_worker(WorkerId(1));
        let second = locks.for_worker(WorkerId(1));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_workers_do_not_share_locks() {
        let locks = WorkerLocks::new();
        let a = locks.for_worker(WorkerId(1));
        let b = locks.for_worker(WorkerId(2));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_lock_serializes_holders() {
        let locks = WorkerLocks::new();
        let lock = locks.for_worker(WorkerId(1));
        let guard = lock.lock().await;
        assert!(locks.for_worker(WorkerId(1)).try_lock().is_err());
        drop(guard);
        assert!(locks.for_worker(WorkerId(1)).try_lock().is_ok());
    }
}
