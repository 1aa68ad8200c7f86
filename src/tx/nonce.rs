//! Nonce reads and per-account submission ordering
//!
//! The node's pending transaction count is only a point-in-time read, so two
//! builders for the same account can see the same nonce. `AccountQueue` closes
//! that race by letting one submission per account run at a time.

use crate::chain::NodeClient;
use crate::error::{ClientError, ClientResult};

use dashmap::DashMap;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Reads the next nonce for an account from the node
pub struct NonceTracker {
    node: Arc<dyn NodeClient>,
}

impl NonceTracker {
    pub fn new(node: Arc<dyn NodeClient>) -> Self {
        Self { node }
    }

    /// Pending transaction count of `address`; reserves nothing
    pub async fn next_nonce(&self, address: Address) -> ClientResult<U256> {
        let nonce = self
            .node
            .pending_transaction_count(address)
            .await
            .map_err(|e| ClientError::rpc("nonce", e))?;

        debug!("Next nonce for {:?}: {}", address, nonce);
        Ok(nonce)
    }
}

type AccountLocks = DashMap<Address, Arc<Mutex<()>>>;

/// One lock per sending account, dropped once nobody holds or waits for it
#[derive(Default)]
pub struct AccountQueue {
    accounts: Arc<AccountLocks>,
}

/// Held for the whole build-sign-broadcast-confirm sequence of one account
pub struct AccountTurn {
    address: Address,
    guard: Option<OwnedMutexGuard<()>>,
    accounts: Arc<AccountLocks>,
}

impl AccountTurn {
    pub fn address(&self) -> Address {
        self.address
    }
}

impl Drop for AccountTurn {
    fn drop(&mut self) {
        // The guard holds its own clone of the lock
        drop(self.guard.take());

        // Waiters hold a clone too, so only the map's reference is left when idle
        let removed = self
            .accounts
            .remove_if(&self.address, |_, lock| Arc::strong_count(lock) == 1);
        if removed.is_some() {
            debug!("Released last submission turn for {:?}", self.address);
        }
    }
}

impl AccountQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other submission from `address` is in flight
    pub async fn acquire(&self, address: Address) -> AccountTurn {
        // Clone the Arc out so the map shard is not locked while waiting
        let lock = self
            .accounts
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;
        debug!("Acquired submission turn for {:?}", address);
        AccountTurn {
            address,
            guard: Some(guard),
            accounts: self.accounts.clone(),
        }
    }

    /// Number of accounts with a submission in flight or waiting
    pub fn accounts(&self) -> usize {
        self.accounts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use ethers::providers::ProviderError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_next_nonce_reads_pending_count() {
        let mut node = MockNodeClient::new();
        node.expect_pending_transaction_count()
            .times(1)
            .returning(|_| Ok(U256::from(5u64)));

        let tracker = NonceTracker::new(Arc::new(node));
        assert_eq!(
            tracker.next_nonce(Address::random()).await.unwrap(),
            U256::from(5u64)
        );
    }

    #[tokio::test]
    async fn test_nonce_read_failure_is_tagged() {
        let mut node = MockNodeClient::new();
        node.expect_pending_transaction_count()
            .returning(|_| Err(ProviderError::CustomError("connection refused".into())));

        let tracker = NonceTracker::new(Arc::new(node));
        let err = tracker.next_nonce(Address::random()).await.unwrap_err();
        assert_eq!(err.stage(), "nonce");
    }

    #[tokio::test]
    async fn test_same_account_waits_for_turn() {
        let queue = Arc::new(AccountQueue::new());
        let address = Address::random();

        let first = queue.acquire(address).await;
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.acquire(address).await.address() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        assert_eq!(waiter.await.unwrap(), address);
    }

    #[tokio::test]
    async fn test_released_turn_removes_idle_account() {
        let queue = AccountQueue::new();
        let address = Address::random();

        let turn = queue.acquire(address).await;
        assert_eq!(queue.accounts(), 1);
        drop(turn);
        assert_eq!(queue.accounts(), 0);

        // A later submission gets a fresh lock
        let again = tokio::time::timeout(Duration::from_millis(100), queue.acquire(address))
            .await
            .expect("released account must not wait");
        assert_eq!(again.address(), address);
        assert_eq!(queue.accounts(), 1);
    }

    #[tokio::test]
    async fn test_account_with_waiter_is_kept() {
        let queue = Arc::new(AccountQueue::new());
        let address = Address::random();

        let first = queue.acquire(address).await;
        let (acquired_tx, acquired_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let turn = queue.acquire(address).await;
                acquired_tx.send(()).unwrap();
                release_rx.await.unwrap();
                drop(turn);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        acquired_rx.await.unwrap();
        assert_eq!(queue.accounts(), 1);

        release_tx.send(()).unwrap();
        waiter.await.unwrap();
        assert_eq!(queue.accounts(), 0);
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let queue = AccountQueue::new();
        let _a = queue.acquire(Address::random()).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), queue.acquire(Address::random()))
            .await
            .expect("second account must not wait");
        assert_eq!(queue.accounts(), 2);
    }
}
