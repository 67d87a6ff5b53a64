// Types shared by the feed store, the network clients and the controller.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use protocol::{ChatMessage, MessageKind, OutgoingMessage, PushEnvelope};
pub use types::{ChatId, ChatKind, ChatSessionInfo, MessageId, TeamId, UserId};
