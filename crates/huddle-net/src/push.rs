//! Process-wide push channel fan-out.
//!
//! A single transport (see [`crate::sse`]) feeds envelopes into the
//! [`PushHub`]; each open feed subscribes with the chat id it cares about and
//! only sees envelopes scoped to that chat. Dropping the returned
//! [`Subscription`] unsubscribes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use huddle_shared::protocol::PushEnvelope;
use huddle_shared::types::ChatId;

type Handler = Arc<dyn Fn(&PushEnvelope) + Send + Sync>;

struct Subscriber {
    filter: ChatId,
    handler: Handler,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

/// Cheaply cloneable handle to the shared subscriber table.
#[derive(Clone, Default)]
pub struct PushHub {
    inner: Arc<Mutex<HubInner>>,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for envelopes whose `data.chatId` equals `filter`.
    ///
    /// Envelopes dispatched before this call are not replayed.
    pub fn subscribe<F>(&self, filter: ChatId, handler: F) -> Subscription
    where
        F: Fn(&PushEnvelope) + Send + Sync + 'static,
    {
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = guard.next_id;
        guard.next_id += 1;
        guard.subscribers.insert(
            id,
            Subscriber {
                filter,
                handler: Arc::new(handler),
            },
        );
        debug!(chat = %filter, sub = id, "Push subscription added");

        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an envelope to every subscriber of its chat.
    ///
    /// Returns the number of handlers invoked. Envelopes without a valid
    /// `data.chatId` reach nobody.
    pub fn dispatch(&self, envelope: &PushEnvelope) -> usize {
        let Some(chat_id) = envelope.chat_id() else {
            debug!(kind = %envelope.kind, "Push envelope without chat id ignored");
            return 0;
        };

        // Handlers run outside the lock so they may subscribe or unsubscribe.
        let handlers: Vec<Handler> = match self.inner.lock() {
            Ok(guard) => guard
                .subscribers
                .values()
                .filter(|s| s.filter == chat_id)
                .map(|s| s.handler.clone())
                .collect(),
            Err(_) => return 0,
        };

        for handler in &handlers {
            handler(envelope);
        }
        handlers.len()
    }

    /// Parse a raw JSON frame and dispatch it. Malformed frames are dropped.
    pub fn dispatch_raw(&self, raw: &str) -> usize {
        match PushEnvelope::from_json(raw) {
            Ok(envelope) => self.dispatch(&envelope),
            Err(e) => {
                warn!(error = %e, "Dropping malformed push frame");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|g| g.subscribers.len())
            .unwrap_or(0)
    }
}

/// Live registration in a [`PushHub`]. Unsubscribes on drop.
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubInner>>,
}

impl Subscription {
    /// Explicitly tear down the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.hub.upgrade() else {
            return;
        };
        let mut guard = match inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.subscribers.remove(&self.id).is_some() {
            debug!(sub = self.id, "Push subscription removed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(hub: &PushHub, chat: ChatId) -> (Subscription, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = hub.subscribe(chat, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (sub, hits)
    }

    #[test]
    fn test_dispatch_filters_by_chat() {
        let hub = PushHub::new();
        let chat_a = ChatId::new();
        let chat_b = ChatId::new();
        let (_sub_a, hits_a) = counter(&hub, chat_a);
        let (_sub_b, hits_b) = counter(&hub, chat_b);

        assert_eq!(hub.dispatch(&PushEnvelope::new_chat_message(chat_a)), 1);
        assert_eq!(hub.dispatch(&PushEnvelope::new_chat_message(chat_a)), 1);

        assert_eq!(hits_a.load(Ordering::SeqCst), 2);
        assert_eq!(hits_b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = PushHub::new();
        let chat = ChatId::new();
        let (sub, hits) = counter(&hub, chat);
        assert_eq!(hub.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.dispatch(&PushEnvelope::new_chat_message(chat)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let hub = PushHub::new();
        let chat = ChatId::new();
        let (_sub, hits) = counter(&hub, chat);

        assert_eq!(hub.dispatch_raw("{broken"), 0);
        assert_eq!(hub.dispatch_raw(r#"{"type":"new-chat-message","data":{}}"#), 0);
        let ok = format!(r#"{{"type":"new-chat-message","data":{{"chatId":"{chat}"}}}}"#);
        assert_eq!(hub.dispatch_raw(&ok), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outlives_hub() {
        let hub = PushHub::new();
        let (sub, _) = counter(&hub, ChatId::new());
        drop(hub);
        drop(sub);
    }
}
