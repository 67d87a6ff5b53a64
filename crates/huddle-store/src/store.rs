//! Ordered, deduplicated message sequence for a single chat.
//!
//! Every mutation keeps two invariants: messages are non-decreasing by
//! `created_at`, and no two messages share an id. Inputs that would break
//! either (a duplicate delivered by both a history page and a push, a message
//! stamped slightly earlier than the current tail, a message from another
//! chat) are absorbed rather than rejected with an error.

use std::collections::HashSet;

use tracing::{debug, warn};

use huddle_shared::protocol::ChatMessage;
use huddle_shared::types::{ChatId, MessageId};

#[derive(Debug, Clone)]
pub struct MessageStore {
    chat_id: ChatId,
    messages: Vec<ChatMessage>,
    ids: HashSet<MessageId>,
}

impl MessageStore {
    /// Create an empty store scoped to `chat_id`.
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            messages: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Replace the contents with the newest page. Returns the number kept.
    pub fn initialize(&mut self, messages: Vec<ChatMessage>) -> usize {
        self.messages.clear();
        self.ids.clear();

        let mut page = self.admit_all(messages);
        page.sort_by_key(|m| m.created_at);
        let added = page.len();
        self.messages = page;

        debug!(chat = %self.chat_id, count = added, "Store initialized");
        added
    }

    /// Insert an older page in front of the loaded range.
    ///
    /// The page's internal order is preserved. Returns the number of
    /// messages actually added.
    pub fn prepend(&mut self, older: Vec<ChatMessage>) -> usize {
        let mut page = self.admit_all(older);
        if page.is_empty() {
            return 0;
        }
        page.sort_by_key(|m| m.created_at);
        let added = page.len();

        let fits_in_front = match (page.last(), self.messages.first()) {
            (Some(newest_incoming), Some(oldest_loaded)) => {
                newest_incoming.created_at <= oldest_loaded.created_at
            }
            _ => true,
        };

        if fits_in_front {
            self.messages.splice(0..0, page);
        } else {
            // Overlapping timestamps: place each message before any equal ones,
            // walking newest-first so the page keeps its own order.
            for message in page.into_iter().rev() {
                let pos = self
                    .messages
                    .partition_point(|m| m.created_at < message.created_at);
                self.messages.insert(pos, message);
            }
        }

        debug!(chat = %self.chat_id, added, total = self.messages.len(), "Prepended page");
        added
    }

    /// Add a newer message at the tail. Returns `false` if it was absorbed.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if !self.admit(&message) {
            return false;
        }
        self.push_ordered(message);
        true
    }

    pub fn append_many(&mut self, messages: Vec<ChatMessage>) -> usize {
        messages
            .into_iter()
            .map(|m| self.append(m))
            .filter(|added| *added)
            .count()
    }

    /// Dedup entry point for live arrivals: a message whose id is already
    /// loaded is a no-op, anything else behaves like [`append`](Self::append).
    pub fn insert_if_absent(&mut self, message: ChatMessage) -> bool {
        if self.ids.contains(&message.id) {
            debug!(chat = %self.chat_id, msg_id = %message.id, "Message already present");
            return false;
        }
        self.append(message)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn oldest(&self) -> Option<&ChatMessage> {
        self.messages.first()
    }

    pub fn newest(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Record the id of `message` if it belongs here and is new.
    fn admit(&mut self, message: &ChatMessage) -> bool {
        if message.chat_id != self.chat_id {
            warn!(
                chat = %self.chat_id,
                other = %message.chat_id,
                msg_id = %message.id,
                "Dropping message from another chat"
            );
            return false;
        }
        self.ids.insert(message.id)
    }

    fn admit_all(&mut self, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        messages.into_iter().filter(|m| self.admit(m)).collect()
    }

    fn push_ordered(&mut self, message: ChatMessage) {
        match self.messages.last() {
            Some(last) if last.created_at > message.created_at => {
                let pos = self
                    .messages
                    .partition_point(|m| m.created_at <= message.created_at);
                self.messages.insert(pos, message);
            }
            _ => self.messages.push(message),
        }
    }
}
