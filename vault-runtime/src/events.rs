//! Callback registries and the vault `Deposit` event feed.
//!
//! Every registration gets its own id, so removing one listener never
//! touches another registered for the same event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use alloy::primitives::Address;
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use dashmap::DashMap;

use crate::backend::ContractBackend;
use crate::contracts::IVault;
use crate::error::ProviderError;
use crate::types::DepositEvent;

pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Identifies one registered callback.
pub type ListenerId = u64;

/// A set of callbacks for one kind of event.
pub struct SubscriberRegistry<E> {
    next_id: AtomicU64,
    subscribers: DashMap<ListenerId, Callback<E>>,
}

impl<E: 'static> SubscriberRegistry<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: DashMap::new(),
        }
    }

    pub fn insert(&self, callback: Callback<E>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, callback);
        id
    }

    /// Remove exactly the callback registered under `id`.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Register `callback` and hand back a disposer for it.
    pub fn subscribe(self: &Arc<Self>, callback: Callback<E>) -> Subscription {
        let id = self.insert(callback);
        let registry: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        })
    }

    /// Invoke every live callback with `event`.
    ///
    /// Callbacks run outside the map lock so they may unsubscribe themselves.
    pub fn emit(&self, event: &E) -> usize {
        let callbacks: Vec<Callback<E>> = self
            .subscribers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<E: 'static> Default for SubscriberRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposer for a single registered callback.
#[must_use = "dropping a Subscription keeps the callback registered; call unsubscribe() to remove it"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// Deregister the callback this subscription was created for.
    pub fn unsubscribe(mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}

/// Decode a vault log into a [`DepositEvent`], if it is one.
pub fn decode_deposit(log: &Log) -> Option<DepositEvent> {
    let decoded = log.log_decode::<IVault::Deposit>().ok()?;
    let event = decoded.inner.data;
    Some(DepositEvent {
        sender: event.sender,
        owner: event.owner,
        assets: event.assets,
        shares: event.shares,
        block_number: log.block_number,
        tx_hash: log.transaction_hash,
    })
}

/// Polls the vault for `Deposit` logs and fans them out to subscribers.
pub struct DepositWatcher {
    backend: Arc<dyn ContractBackend>,
    vault: Address,
    subscribers: Arc<SubscriberRegistry<DepositEvent>>,
    poll_interval: Duration,
    next_block: Option<u64>,
}

impl DepositWatcher {
    pub fn new(
        backend: Arc<dyn ContractBackend>,
        vault: Address,
        subscribers: Arc<SubscriberRegistry<DepositEvent>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            vault,
            subscribers,
            poll_interval,
            next_block: None,
        }
    }

    /// Start from `block` instead of the chain head.
    pub fn from_block(mut self, block: u64) -> Self {
        self.next_block = Some(block);
        self
    }

    /// Fetch logs up to the current head and dispatch them.
    ///
    /// Returns the number of deposits delivered.
    pub async fn poll_once(&mut self) -> Result<usize, ProviderError> {
        let head = self.backend.block_number().await?;
        let from = self.next_block.unwrap_or(head);
        if from > head {
            return Ok(0);
        }

        let filter = Filter::new()
            .address(self.vault)
            .event_signature(IVault::Deposit::SIGNATURE_HASH)
            .from_block(from)
            .to_block(head);
        let logs = self.backend.get_logs(filter).await?;

        let mut delivered = 0;
        for log in &logs {
            match decode_deposit(log) {
                Some(event) => {
                    self.subscribers.emit(&event);
                    delivered += 1;
                }
                None => tracing::warn!("Skipping undecodable Deposit log: {:?}", log.transaction_hash),
            }
        }

        self.next_block = Some(head + 1);
        Ok(delivered)
    }

    /// Poll until `shutdown` resolves. Poll failures are logged and retried on the next tick.
    pub async fn run(mut self, shutdown: impl std::future::Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Deposit watcher stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(0) => {}
                        Ok(n) => tracing::debug!("Dispatched {n} Deposit events"),
                        Err(e) => tracing::warn!("Deposit poll failed: {e}"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_unsubscribe_removes_only_own_callback() {
        let registry = Arc::new(SubscriberRegistry::<u32>::new());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = first.clone();
        let sub_a = registry.subscribe(Arc::new(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        let s = second.clone();
        let _sub_b = registry.subscribe(Arc::new(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        }));

        registry.emit(&1);
        sub_a.unsubscribe();
        registry.emit(&2);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_callback_registered_twice_is_independent() {
        let registry = Arc::new(SubscriberRegistry::<()>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let callback: Callback<()> = Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let sub_a = registry.subscribe(callback.clone());
        let _sub_b = registry.subscribe(callback);
        sub_a.unsubscribe();
        registry.emit(&());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = Arc::new(SubscriberRegistry::<u8>::new());
        let sub = registry.subscribe(Arc::new(|_| {}));
        drop(registry);
        sub.unsubscribe();
    }

    #[test]
    fn test_remove_unknown_id() {
        let registry = SubscriberRegistry::<u8>::new();
        assert!(!registry.remove(42));
    }

    #[test]
    fn test_decode_deposit_log() {
        let sender = Address::repeat_byte(0x11);
        let owner = Address::repeat_byte(0x22);
        let event = IVault::Deposit {
            sender,
            owner,
            assets: alloy::primitives::U256::from(500u64),
            shares: alloy::primitives::U256::from(490u64),
        };
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0x01),
                data: event.encode_log_data(),
            },
            block_number: Some(7),
            ..Default::default()
        };

        let decoded = decode_deposit(&log).unwrap();
        assert_eq!(decoded.sender, sender);
        assert_eq!(decoded.owner, owner);
        assert_eq!(decoded.assets, alloy::primitives::U256::from(500u64));
        assert_eq!(decoded.block_number, Some(7));
    }
}
