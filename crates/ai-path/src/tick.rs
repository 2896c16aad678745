use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub dt_seconds: f32,
}

/// Host-driven per-frame signal.
///
/// The host calls [`TickSignal::emit`] once per frame; follow loops subscribe and
/// poll their mover on every tick they receive. Clones share the same channel.
#[derive(Debug, Clone)]
pub struct TickSignal {
    sender: broadcast::Sender<TickContext>,
    next_tick: Arc<AtomicU64>,
}

impl TickSignal {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            next_tick: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Broadcast one tick to every live subscriber.
    pub fn emit(&self, dt_seconds: f32) -> TickContext {
        let ctx = TickContext {
            tick: self.next_tick.fetch_add(1, Ordering::Relaxed),
            dt_seconds,
        };
        // No subscribers just means nobody is following right now.
        let _ = self.sender.send(ctx);
        ctx
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TickContext> {
        self.sender.subscribe()
    }

    /// Number of live subscriptions (one per running follow loop).
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TickSignal {
    fn default() -> Self {
        Self::new()
    }
}
