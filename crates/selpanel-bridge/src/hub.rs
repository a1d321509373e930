use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::message::Broadcast;

/// Process-unique identity of one connected consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Messages a consumer may have queued before it is treated as stalled.
pub const CONSUMER_QUEUE_DEPTH: usize = 64;

/// Outbound half of a consumer connection.
///
/// Sends never block. A send fails once the connection task has gone away or
/// its queue already holds [`CONSUMER_QUEUE_DEPTH`] undelivered messages;
/// either way the consumer is evicted.
pub type ConsumerChannel = mpsc::Sender<String>;

/// Inbound half of a consumer connection, drained by its connection task.
pub type ConsumerReceiver = mpsc::Receiver<String>;

/// Outcome of one [`ConsumerHub::broadcast`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Registry of connected consumers with best-effort fan-out.
#[derive(Debug, Default)]
pub struct ConsumerHub {
    next_id: AtomicU64,
    channels: Mutex<HashMap<ConsumerId, ConsumerChannel>>,
}

impl ConsumerHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and register a fresh channel for a new consumer.
    pub fn connect(&self) -> (ConsumerId, ConsumerReceiver) {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(CONSUMER_QUEUE_DEPTH);
        self.register(id, tx);
        (id, rx)
    }

    /// Register `channel` under `id`. Registering the same id again replaces
    /// the channel and leaves the registry size unchanged.
    pub fn register(&self, id: ConsumerId, channel: ConsumerChannel) {
        let total = {
            let mut channels = self.lock();
            channels.insert(id, channel);
            channels.len()
        };
        info!(consumer = %id, consumers = total, "consumer registered");
    }

    /// Remove `id`. Returns false if it was not registered.
    pub fn unregister(&self, id: ConsumerId) -> bool {
        let (removed, total) = {
            let mut channels = self.lock();
            let removed = channels.remove(&id).is_some();
            (removed, channels.len())
        };
        if removed {
            info!(consumer = %id, consumers = total, "consumer unregistered");
        }
        removed
    }

    /// Deliver `message` to every registered consumer.
    ///
    /// The message is serialized once. Every channel is attempted; channels
    /// whose send fails, closed or full, are evicted as part of the same call.
    pub fn broadcast(&self, message: &Broadcast) -> Result<BroadcastReport> {
        let text = message.to_text()?;
        let mut report = BroadcastReport::default();

        let mut channels = self.lock();
        channels.retain(|id, channel| match channel.try_send(text.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(consumer = %id, depth = CONSUMER_QUEUE_DEPTH, "evicting stalled consumer");
                report.evicted += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(consumer = %id, "evicting consumer after failed send");
                report.evicted += 1;
                false
            }
        });
        drop(channels);

        if report.evicted > 0 {
            info!(
                evicted = report.evicted,
                consumers = report.delivered,
                "evicted dead consumers"
            );
        }
        Ok(report)
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConsumerId, ConsumerChannel>> {
        // The map stays consistent even if a holder panicked mid-broadcast.
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
