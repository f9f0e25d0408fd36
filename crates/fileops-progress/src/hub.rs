//! Non-blocking fan-out of progress snapshots.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use fileops_core::ProgressInfo;
use tokio::sync::mpsc;

/// Subscription key that receives updates for every operation.
pub const WILDCARD: &str = "*";

/// Default buffer size of a subscription channel.
pub const DEFAULT_CAPACITY: usize = 10;

/// Bounded channels keyed by operation id (or [`WILDCARD`]).
///
/// Publishing never blocks: a subscriber whose buffer is full misses that
/// update.
#[derive(Debug)]
pub struct SubscriberHub {
    default_capacity: usize,
    channels: RwLock<HashMap<String, Vec<mpsc::Sender<ProgressInfo>>>>,
}

impl SubscriberHub {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            default_capacity: default_capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    /// Open a channel for `key` with the given buffer size.
    pub fn subscribe(&self, key: &str, capacity: usize) -> mpsc::Receiver<ProgressInfo> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let senders = channels.entry(key.to_string()).or_default();
        senders.retain(|sender| !sender.is_closed());
        senders.push(tx);
        rx
    }

    /// Drop every sender registered under `key`, closing those channels.
    pub fn close(&self, key: &str) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels.remove(key).is_some()
    }

    /// Check whether a snapshot for `id` would reach anyone.
    pub fn has_subscribers(&self, id: &str) -> bool {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        [id, WILDCARD]
            .iter()
            .filter_map(|key| channels.get(*key))
            .flatten()
            .any(|sender| !sender.is_closed())
    }

    /// Offer `progress` to the subscribers of its id and to wildcard subscribers.
    /// Returns the number of channels that accepted it.
    ///
    /// Senders whose receivers are gone are dropped afterwards.
    pub fn publish(&self, progress: &ProgressInfo) -> usize {
        let keys = [progress.id.as_str(), WILDCARD];
        let mut delivered = 0;
        let mut closed = false;
        {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            for key in keys {
                let Some(senders) = channels.get(key) else {
                    continue;
                };
                for sender in senders {
                    match sender.try_send(progress.clone()) {
                        Ok(()) => delivered += 1,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::trace!(id = %progress.id, key, "subscriber full, update dropped");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => closed = true,
                    }
                }
            }
        }

        if closed {
            self.prune(&keys);
        }
        delivered
    }

    fn prune(&self, keys: &[&str]) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if let Some(senders) = channels.get_mut(*key) {
                senders.retain(|sender| !sender.is_closed());
                if senders.is_empty() {
                    channels.remove(*key);
                }
            }
        }
    }
}

impl Default for SubscriberHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
