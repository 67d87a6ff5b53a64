//! The REST surface the feed consumes.

use async_trait::async_trait;

use huddle_shared::constants::LATEST_MESSAGE_LIMIT;
use huddle_shared::protocol::{ChatMessage, OutgoingMessage};
use huddle_shared::types::ChatId;

use crate::error::Result;

/// Message history and send endpoints.
///
/// Implemented over HTTP by [`HttpChatApi`](crate::HttpChatApi); tests
/// substitute in-memory fakes.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetch up to `limit` messages after skipping `offset` from the newest end.
    ///
    /// The returned page is oldest-first. `offset = 0` is the newest page.
    async fn fetch_page(&self, chat_id: ChatId, offset: usize, limit: usize)
        -> Result<Vec<ChatMessage>>;

    /// Create a message. The returned record carries the server's id and timestamp.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<ChatMessage>;

    /// Fetch the single newest message of a chat.
    async fn fetch_latest(&self, chat_id: ChatId) -> Result<Option<ChatMessage>> {
        let mut page = self.fetch_page(chat_id, 0, LATEST_MESSAGE_LIMIT).await?;
        Ok(page.pop())
    }
}
