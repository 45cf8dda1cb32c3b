/// A typing signal older than this is treated as absent (milliseconds)
pub const TYPING_WINDOW_MS: i64 = 2_000;

/// Body written over a message when it is soft-deleted
pub const DELETED_MESSAGE_TEXT: &str = "This message was deleted";

/// Maximum message body length in characters
pub const MAX_MESSAGE_CHARS: usize = 4_000;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
