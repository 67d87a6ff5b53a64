/// Messages per history page. The backend never returns more than this.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Limit used when a push event asks for the single newest message
pub const LATEST_MESSAGE_LIMIT: usize = 1;

/// Distance from the bottom (px) within which a new arrival auto-scrolls
pub const DEFAULT_BOTTOM_THRESHOLD_PX: f64 = 100.0;

/// Push envelope type announcing a new message in some chat
pub const EVENT_NEW_CHAT_MESSAGE: &str = "new-chat-message";

/// HTTP request timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Delay before the push stream is reopened after it ends, in seconds
pub const DEFAULT_PUSH_RECONNECT_SECS: u64 = 3;

/// Default REST API base URL (local development backend)
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
