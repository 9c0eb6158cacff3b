use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rocket::tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::common::election::ElectionId;

/// One async mutex per election, created on first use.
///
/// Submissions to the same election queue behind each other; different
/// elections never contend.
#[derive(Default)]
pub struct ElectionLocks {
    locks: Mutex<HashMap<ElectionId, Arc<AsyncMutex<()>>>>,
}

impl ElectionLocks {
    /// Wait for exclusive access to the given election.
    pub async fn lock(&self, election_id: ElectionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Every holder and waiter owns a clone, so a count of one means
            // the entry is idle and can go.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(election_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rocket::tokio::time::timeout;

    use super::*;

    #[rocket::async_test]
    async fn same_election_is_exclusive() {
        let locks = ElectionLocks::default();
        let _held = locks.lock(1).await;
        assert!(timeout(Duration::from_millis(50), locks.lock(1)).await.is_err());
    }

    #[rocket::async_test]
    async fn different_elections_do_not_contend() {
        let locks = ElectionLocks::default();
        let _held = locks.lock(1).await;
        assert!(timeout(Duration::from_millis(50), locks.lock(2)).await.is_ok());
    }

    #[rocket::async_test]
    async fn idle_entries_are_pruned() {
        let locks = ElectionLocks::default();
        for election_id in 0..100 {
            drop(locks.lock(election_id).await);
        }
        assert!(locks.len() <= 1);

        let held = locks.lock(1).await;
        drop(locks.lock(2).await);
        drop(locks.lock(3).await);
        // The held lock survives pruning, and still excludes others.
        assert_eq!(locks.len(), 2);
        assert!(timeout(Duration::from_millis(50), locks.lock(1)).await.is_err());
        drop(held);
        assert!(timeout(Duration::from_millis(50), locks.lock(1)).await.is_ok());
    }

    #[rocket::async_test]
    async fn released_on_drop() {
        let locks = ElectionLocks::default();
        drop(locks.lock(1).await);
        assert!(timeout(Duration::from_millis(50), locks.lock(1)).await.is_ok());
    }
}
