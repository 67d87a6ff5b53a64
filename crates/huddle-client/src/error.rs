use thiserror::Error;

use huddle_net::NetError;

/// Errors surfaced while wiring a feed to the backend.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Invalid chat id: {0}")]
    InvalidChatId(#[from] uuid::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
