//! Per-group admission control: a bounded counter of in-flight commands
//! per group, and one stable database lock per group.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::GroupConfig;

struct AdmissionInner {
    counters: Mutex<HashMap<String, u32>>,
}

/// Bounds concurrently executing commands per group. Excess requests are
/// rejected immediately; there is no queue.
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<AdmissionInner>,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AdmissionInner {
                counters: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Atomically checks the group's counter against its worker limit and
    /// increments on success. Groups configured with zero workers always
    /// reject.
    pub fn try_admit(&self, group: &GroupConfig) -> Option<WorkerPermit> {
        if group.workers == 0 {
            return None;
        }
        let mut counters = self.inner.counters.lock();
        let count = counters.entry(group.name.clone()).or_insert(0);
        if *count >= group.workers {
            return None;
        }
        *count += 1;
        Some(WorkerPermit {
            inner: Arc::clone(&self.inner),
            group: group.name.clone(),
        })
    }

    /// Number of in-flight commands for the group.
    pub fn active(&self, group: &str) -> u32 {
        self.inner
            .counters
            .lock()
            .get(group)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the admission slot on drop, exactly once, whether the
/// admitted work succeeded, failed, or panicked.
pub struct WorkerPermit {
    inner: Arc<AdmissionInner>,
    group: String,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        let mut counters = self.inner.counters.lock();
        if let Some(count) = counters.get_mut(&self.group) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counters.remove(&self.group);
            }
        }
    }
}

/// One exclusive lock per group, keyed by group name. Entries are never
/// removed: handing out a fresh lock per call would let a second caller
/// proceed while the first still holds the old one.
pub struct GroupLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_for(&self, group: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(group.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }
}

impl Default for GroupLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::group_named;

    fn group_with_workers(workers: u32) -> GroupConfig {
        let mut group = group_named("Tester", "secret");
        group.workers = workers;
        group
    }

    #[test]
    fn admits_up_to_the_limit_and_rejects_the_excess() {
        let admission = AdmissionController::new();
        let group = group_with_workers(3);
        let permits: Vec<_> = (0..3)
            .map(|_| admission.try_admit(&group).expect("slot available"))
            .collect();
        assert!(admission.try_admit(&group).is_none());
        assert_eq!(admission.active("Tester"), 3);
        drop(permits);
        assert_eq!(admission.active("Tester"), 0);
        assert!(admission.try_admit(&group).is_some());
    }

    #[test]
    fn zero_workers_always_rejects() {
        let admission = AdmissionController::new();
        let group = group_with_workers(0);
        assert!(admission.try_admit(&group).is_none());
        assert_eq!(admission.active("Tester"), 0);
    }

    #[test]
    fn release_is_tied_to_permit_drop() {
        let admission = AdmissionController::new();
        let group = group_with_workers(1);
        let permit = admission.try_admit(&group).expect("slot available");
        assert!(admission.try_admit(&group).is_none());
        drop(permit);
        assert!(admission.try_admit(&group).is_some());
    }

    #[test]
    fn group_lock_is_stable_across_calls() {
        let locks = GroupLocks::new();
        let first = locks.lock_for("Tester");
        let second = locks.lock_for("Tester");
        assert!(Arc::ptr_eq(&first, &second));
        let other = locks.lock_for("Other");
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn group_lock_serializes_holders() {
        let locks = GroupLocks::new();
        let lock = locks.lock_for("Tester");
        let guard = lock.lock().await;
        let contender = locks.lock_for("Tester");
        assert!(contender.try_lock().is_err());
        drop(guard);
        assert!(contender.try_lock().is_ok());
    }
}
