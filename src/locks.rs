use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 1024;

/// Per-card async locks shared by every unit of work in this process.
///
/// Locks are always taken in ascending card id order, so two operations
/// over the same pair of cards can never wait on each other in a cycle.
#[derive(Clone, Default)]
pub struct CardLocks {
    slots: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

/// Holds the locks for a set of cards until dropped.
pub struct CardGuard {
    card_ids: Vec<i64>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl CardGuard {
    pub fn card_ids(&self) -> &[i64] {
        &self.card_ids
    }
}

impl CardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, card_ids: &[i64]) -> CardGuard {
        let mut ids = card_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            let slot = self.slot(*id);
            guards.push(slot.lock_owned().await);
        }

        CardGuard {
            card_ids: ids,
            _guards: guards,
        }
    }

    fn slot(&self, card_id: i64) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.len() > PRUNE_THRESHOLD {
            // nobody else references these, so nobody holds or waits on them
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots.entry(card_id).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_sorts_and_dedups() {
        let locks = CardLocks::new();
        let guard = locks.acquire(&[9, 3, 9, 1]).await;
        assert_eq!(guard.card_ids(), &[1, 3, 9]);
    }

    #[tokio::test]
    async fn test_same_card_is_exclusive() {
        let locks = CardLocks::new();
        let guard = locks.acquire(&[1]).await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move { contender.acquire(&[1]).await.card_ids().to_vec() });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        let ids = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_disjoint_cards_do_not_block() {
        let locks = CardLocks::new();
        let _a = locks.acquire(&[1, 2]).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire(&[3, 4])).await;
        assert!(b.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposite_order_requests_do_not_deadlock() {
        let locks = CardLocks::new();
        let mut handles = Vec::new();
        for i in 0..200 {
            let locks = locks.clone();
            handles.push(tokio::spawn(async move {
                let pair = if i % 2 == 0 { [1, 2] } else { [2, 1] };
                let _guard = locks.acquire(&pair).await;
                tokio::task::yield_now().await;
            }));
        }

        let all = async {
            for handle in handles {
                handle.await.unwrap();
            }
        };
        assert!(tokio::time::timeout(Duration::from_secs(5), all).await.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
