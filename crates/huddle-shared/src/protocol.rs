use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::EVENT_NEW_CHAT_MESSAGE;
use crate::error::ProtocolError;
use crate::types::{ChatId, MessageId, UserId};

/// Payload type of a chat message
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    #[default]
    Text,
    /// `content` holds the image URL
    Image,
    /// `content` holds the video URL
    VideoLink,
}

/// A chat message as returned by the history and send endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned id, used for deduplication
    pub id: MessageId,
    /// Owning chat session
    pub chat_id: ChatId,
    pub sender_id: UserId,
    /// Sender display name, denormalized for rendering
    #[serde(default)]
    pub sender_name: String,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    /// Defines the order of messages within a chat
    pub created_at: DateTime<Utc>,
}

/// Body of a send request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub content: String,
    pub kind: MessageKind,
}

/// Envelope delivered by the push channel.
///
/// Only `type` and `data.chatId` are ever read. The rest of `data` is kept
/// opaque since the feed refetches the real message instead of trusting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatScoped {
    chat_id: ChatId,
}

impl PushEnvelope {
    /// Build a `new-chat-message` envelope for the given chat.
    pub fn new_chat_message(chat_id: ChatId) -> Self {
        Self {
            kind: EVENT_NEW_CHAT_MESSAGE.to_string(),
            data: serde_json::json!({ "chatId": chat_id }),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        let envelope: Self = serde_json::from_str(raw)?;
        if envelope.kind.is_empty() {
            return Err(ProtocolError::MalformedEnvelope("empty type".into()));
        }
        Ok(envelope)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The chat this envelope is scoped to, if `data.chatId` is present and valid.
    pub fn chat_id(&self) -> Option<ChatId> {
        ChatScoped::deserialize(&self.data).ok().map(|c| c.chat_id)
    }

    pub fn is_new_chat_message(&self) -> bool {
        self.kind == EVENT_NEW_CHAT_MESSAGE
    }
}
