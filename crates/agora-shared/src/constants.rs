/// Application name
pub const APP_NAME: &str = "Agora";

/// Maximum message body length in characters
pub const MAX_MESSAGE_CHARS: usize = 2_000;

/// Default page size for message pagination
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum page size a client may request
pub const MAX_PAGE_SIZE: u32 = 200;

/// Seconds before a typing indicator expires without an explicit stop
pub const TYPING_TTL_SECS: u64 = 5;

/// Interval between background sweeps of expired typing entries
pub const TYPING_SWEEP_INTERVAL_SECS: u64 = 10;

/// Default HTTP/WebSocket listen port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
