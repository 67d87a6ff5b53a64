// Network collaborators of the chat feed: the REST endpoints and the push channel.

pub mod api;
pub mod error;
pub mod http;
pub mod push;
pub mod sse;

pub use api::ChatApi;
pub use error::{NetError, Result};
pub use http::HttpChatApi;
pub use push::{PushHub, Subscription};
pub use sse::{spawn_push_listener, stream_client, PushListener, SseDecoder};
