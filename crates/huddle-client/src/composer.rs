//! Outgoing message draft and send bookkeeping.

use huddle_shared::protocol::{MessageKind, OutgoingMessage};
use huddle_shared::types::ChatId;

#[derive(Debug, Clone, Default)]
pub struct Composer {
    draft: String,
    kind: MessageKind,
    in_flight: bool,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Switch between text and link payloads (`Image`, `VideoLink`).
    pub fn set_kind(&mut self, kind: MessageKind) {
        self.kind = kind;
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight
    }

    /// Build the request for the current draft.
    ///
    /// Returns `None` for a blank draft or while a send is already pending.
    pub fn submit(&mut self, chat_id: ChatId) -> Option<OutgoingMessage> {
        let content = self.draft.trim();
        if content.is_empty() || self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some(OutgoingMessage {
            chat_id,
            content: content.to_string(),
            kind: self.kind,
        })
    }

    /// The backend accepted the message: clear the input.
    pub fn on_sent(&mut self) {
        self.in_flight = false;
        self.draft.clear();
        self.kind = MessageKind::Text;
    }

    /// The send failed: keep the draft so the user can resubmit.
    pub fn on_failed(&mut self) {
        self.in_flight = false;
    }
}
