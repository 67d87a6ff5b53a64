//! Push hub to feed bridge.
//!
//! Converts hub callbacks for the open chat into [`FeedEvent::Push`] values
//! on the feed's event channel. The bridge lives exactly as long as the
//! session it was attached for: dropping it unsubscribes.

use tokio::sync::mpsc;
use tracing::debug;

use huddle_net::{PushHub, Subscription};

use crate::feed::{FeedEvent, SessionToken};

#[derive(Debug)]
pub struct LiveBridge {
    token: SessionToken,
    _subscription: Subscription,
}

impl LiveBridge {
    /// Subscribe to `token`'s chat and forward new-message signals to `tx`.
    pub fn attach(hub: &PushHub, token: SessionToken, tx: mpsc::UnboundedSender<FeedEvent>) -> Self {
        let subscription = hub.subscribe(token.chat_id(), move |envelope| {
            if !envelope.is_new_chat_message() {
                debug!(kind = %envelope.kind, "Ignoring push envelope");
                return;
            }
            // The receiver only goes away when the controller is dropped.
            let _ = tx.send(FeedEvent::Push(token));
        });
        debug!(chat = %token.chat_id(), generation = token.generation(), "Live bridge attached");

        Self {
            token,
            _subscription: subscription,
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn detach(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ChatFeed, FeedRequest};
    use huddle_shared::protocol::PushEnvelope;
    use huddle_shared::types::ChatId;

    fn token_for(chat: ChatId) -> SessionToken {
        let mut feed = ChatFeed::default();
        match feed.open(chat) {
            FeedRequest::LoadPage { token, .. } => token,
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_forwards_only_new_message_signals() {
        let hub = PushHub::new();
        let chat = ChatId::new();
        let token = token_for(chat);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let bridge = LiveBridge::attach(&hub, token, tx);
        hub.dispatch(&PushEnvelope::new_chat_message(chat));
        hub.dispatch(&PushEnvelope {
            kind: "typing".into(),
            data: serde_json::json!({ "chatId": chat }),
        });
        hub.dispatch(&PushEnvelope::new_chat_message(ChatId::new()));

        match rx.try_recv() {
            Ok(FeedEvent::Push(t)) => assert_eq!(t, bridge.token()),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_detach_unsubscribes() {
        let hub = PushHub::new();
        let chat = ChatId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let bridge = LiveBridge::attach(&hub, token_for(chat), tx);
        assert_eq!(hub.subscriber_count(), 1);
        bridge.detach();
        assert_eq!(hub.subscriber_count(), 0);

        assert_eq!(hub.dispatch(&PushEnvelope::new_chat_message(chat)), 0);
        assert!(rx.try_recv().is_err());
    }
}
