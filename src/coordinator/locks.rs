//! Per-group serialization
//!
//! Each group gets one async mutex guarding a small ledger. Holding the guard
//! is what makes "write position, then evaluate proximity" or "tick every
//! member of the group" atomic with respect to other operations on the same
//! group, while other groups proceed in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::GroupId;

/// State owned by the group lock itself
#[derive(Debug, Default)]
pub struct GroupLedger {
    last_seq: u64,
}

impl GroupLedger {
    /// Next broadcast sequence number for the group, starting at 1
    pub fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }
}

#[derive(Default)]
pub struct GroupLocks {
    locks: DashMap<GroupId, Arc<Mutex<GroupLedger>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the group's lock, creating it on first use.
    ///
    /// The DashMap shard guard is released before awaiting the mutex.
    pub async fn lock(&self, group_id: &GroupId) -> OwnedMutexGuard<GroupLedger> {
        let lock = self
            .locks
            .entry(group_id.clone())
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }

    /// Forget the group's lock unless another task holds or awaits it.
    ///
    /// The map keeps the only reference to an idle lock, so anything that
    /// cloned it out keeps the entry alive. The sequence restarts at 1 if the
    /// group is used again.
    pub fn remove_idle(&self, group_id: &GroupId) -> bool {
        self.locks
            .remove_if(group_id, |_, lock| Arc::strong_count(lock) == 1)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_sequence_is_per_group() {
        let locks = GroupLocks::new();
        let a = GroupId::new("a");
        let b = GroupId::new("b");

        assert_eq!(locks.lock(&a).await.next_seq(), 1);
        assert_eq!(locks.lock(&a).await.next_seq(), 2);
        assert_eq!(locks.lock(&b).await.next_seq(), 1);
        assert_eq!(locks.lock(&a).await.last_seq(), 2);
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_same_group_is_exclusive() {
        let locks = GroupLocks::new();
        let g = GroupId::new("g");
        let other = GroupId::new("other");

        let guard = locks.lock(&g).await;
        let mut contender = task::spawn(locks.lock(&g));
        assert_pending!(contender.poll());

        // Other groups are not blocked
        let mut unrelated = task::spawn(locks.lock(&other));
        assert_ready!(unrelated.poll());

        drop(guard);
        assert!(contender.is_woken());
        let mut ledger = assert_ready!(contender.poll());
        assert_eq!(ledger.next_seq(), 1);
    }

    #[tokio::test]
    async fn test_remove_idle_keeps_contended_locks() {
        let locks = GroupLocks::new();
        let g = GroupId::new("g");

        let guard = locks.lock(&g).await;
        assert!(!locks.remove_idle(&g));
        assert_eq!(locks.len(), 1);

        drop(guard);
        assert!(locks.remove_idle(&g));
        assert!(locks.is_empty());
        assert!(!locks.remove_idle(&g));
    }
}
