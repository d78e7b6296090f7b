//! Typed publish/subscribe channels for engine notifications
//!
//! Each event kind has its own [`Channel`]. A failing or panicking listener
//! is logged and skipped; the remaining listeners still run and the engine
//! operation that emitted the event is not affected.

use crate::active::ActiveComment;
use danmaku_core::Comment;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Handle returned by [`Channel::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn FnMut(&T) -> anyhow::Result<()>>;

/// Listeners for one event kind, called in subscription order
pub struct Channel<T> {
    name: &'static str,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_id: u64,
}

impl<T> Channel<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) -> anyhow::Result<()> + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener; returns false if it was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers `payload` to every listener, returning how many succeeded
    pub fn emit(&mut self, payload: &T) -> usize {
        let mut delivered = 0;
        for (id, listener) in &mut self.listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(payload)));
            match result {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(event = self.name, subscription = id.0, "Listener failed: {e:#}");
                }
                Err(_) => {
                    tracing::warn!(event = self.name, subscription = id.0, "Listener panicked");
                }
            }
        }
        delivered
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Payload of the `load` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loaded {
    /// Records in the new timeline
    pub count: usize,
}

/// Payload of the `clear` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cleared {
    /// Active comments that were force-finished
    pub finished: usize,
}

/// Payload of the `resize` event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

/// Every notification the engine publishes
#[derive(Debug)]
pub struct EngineEvents {
    pub load: Channel<Loaded>,
    pub insert: Channel<Comment>,
    pub clear: Channel<Cleared>,
    pub resize: Channel<Bounds>,
    pub enter_comment: Channel<ActiveComment>,
    pub exit_comment: Channel<ActiveComment>,
}

impl Default for EngineEvents {
    fn default() -> Self {
        Self {
            load: Channel::new("load"),
            insert: Channel::new("insert"),
            clear: Channel::new("clear"),
            resize: Channel::new("resize"),
            enter_comment: Channel::new("enterComment"),
            exit_comment: Channel::new("exitComment"),
        }
    }
}
