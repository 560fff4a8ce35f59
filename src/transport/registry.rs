use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::topic;
use super::{InboundMessage, MessageHandler, SubscriptionId};

struct Registration {
    id: SubscriptionId,
    filter: String,
    handler: MessageHandler,
}

/// Handlers registered on one connection, keyed by subscription id.
pub(crate) struct HandlerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<Registration>>,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a handler. `on_first` runs under the registry lock when no other
    /// registration shares the filter, so a concurrent `remove` cannot
    /// interleave between the check and the broker request.
    pub(crate) fn register(&self, filter: &str, handler: MessageHandler, on_first: impl FnOnce(&str)) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries();
        if !entries.iter().any(|r| r.filter == filter) {
            on_first(filter);
        }
        entries.push(Registration {
            id,
            filter: filter.to_string(),
            handler,
        });
        id
    }

    /// Remove a registration. `on_last` runs under the lock when it was the
    /// final handler for its filter.
    pub(crate) fn remove(&self, id: SubscriptionId, on_last: impl FnOnce(&str)) -> bool {
        let mut entries = self.entries();
        let Some(position) = entries.iter().position(|r| r.id == id) else {
            return false;
        };
        let removed = entries.remove(position);
        if !entries.iter().any(|r| r.filter == removed.filter) {
            on_last(&removed.filter);
        }
        true
    }

    /// Visit distinct filters in registration order while holding the lock.
    pub(crate) fn for_each_filter(&self, mut visit: impl FnMut(&str)) {
        let entries = self.entries();
        let mut seen: Vec<&str> = Vec::new();
        for registration in entries.iter() {
            if !seen.contains(&registration.filter.as_str()) {
                seen.push(&registration.filter);
                visit(&registration.filter);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    /// Invoke every handler whose filter matches the message topic.
    /// Handlers are called outside the lock so they may (un)subscribe.
    pub(crate) fn dispatch(&self, message: &InboundMessage) -> usize {
        let handlers: Vec<MessageHandler> = self
            .entries()
            .iter()
            .filter(|r| topic::matches(&r.filter, &message.topic))
            .map(|r| r.handler.clone())
            .collect();

        for handler in &handlers {
            handler(message);
        }
        handlers.len()
    }
}
