//! Notification sinks.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::Notification;

/// Receives notifications from the kernel.
///
/// `emit` is called while the emitting operation still holds its locks, so
/// notifications for one actor arrive in transition order. Implementations
/// must not call back into the kernel.
pub trait EventSink: Send + Sync {
    /// Delivers one notification.
    fn emit(&self, notification: Notification);
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn EventSink>;

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _notification: Notification) {}
}

/// Keeps every notification in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Notification>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    /// Removes and returns everything emitted so far.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Notifications whose kind equals `kind`.
    pub fn of_kind(&self, kind: &str) -> Vec<Notification> {
        self.events
            .lock()
            .iter()
            .filter(|n| n.kind() == kind)
            .cloned()
            .collect()
    }

    /// Number of notifications held.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, notification: Notification) {
        self.events.lock().push(notification);
    }
}

/// Logs each notification through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, notification: Notification) {
        tracing::info!(
            kind = notification.kind(),
            actor = notification.actor().map(|a| a.as_str()),
            ?notification,
            "notification"
        );
    }
}

/// Forwards every notification to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<SharedSink>,
}

impl FanoutSink {
    /// Creates a fan-out over `sinks`.
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }

    /// Adds a sink.
    pub fn with(mut self, sink: SharedSink) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, notification: Notification) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(notification.clone());
            }
            last.emit(notification);
        }
    }
}
