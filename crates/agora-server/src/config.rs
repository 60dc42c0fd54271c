//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use agora_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT, TYPING_TTL_SECS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP/WebSocket (axum) server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DB_PATH`
    /// Default: `./agora.db`
    pub db_path: PathBuf,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Agora Node"`
    pub instance_name: String,

    /// Seconds before a typing indicator expires on its own.
    /// Env: `TYPING_TTL_SECS`
    /// Default: `5`
    pub typing_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: PathBuf::from("./agora.db"),
            instance_name: format!("{APP_NAME} Node"),
            typing_ttl_secs: TYPING_TTL_SECS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("TYPING_TTL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.typing_ttl_secs = secs;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.typing_ttl_secs, TYPING_TTL_SECS);
        assert_eq!(config.db_path, PathBuf::from("./agora.db"));
    }
}
