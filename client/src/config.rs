//! Connection settings for the game client

use log::warn;
use shared::{DEFAULT_SERVER_URL, RECONNECT_DELAY_MS};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint of the game server
    pub server_url: String,
    /// Bearer credential forwarded untouched as the `token` query parameter
    pub token: Option<String>,
    /// Fixed wait between a closed connection and the next attempt
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            token: None,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Builds the URL actually dialed. A missing token is allowed; the server
    /// decides what an anonymous connection may do.
    pub fn connection_target(&self) -> String {
        let token = self.token.as_deref().unwrap_or_default();
        if token.is_empty() {
            warn!("No authentication token provided. Connecting without token.");
        }

        let separator = if self.server_url.contains('?') { '&' } else { '?' };
        format!("{}{}token={}", self.server_url, separator, token)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "ws://localhost:8081/ws");
        assert_eq!(config.token, None);
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_connection_target_with_token() {
        let config = ClientConfig::new("ws://game.local/ws").with_token("abc.def");
        assert_eq!(config.connection_target(), "ws://game.local/ws?token=abc.def");
    }

    #[test]
    fn test_connection_target_without_token() {
        let config = ClientConfig::new("ws://game.local/ws");
        assert_eq!(config.connection_target(), "ws://game.local/ws?token=");
    }

    #[test]
    fn test_connection_target_appends_to_existing_query() {
        let config = ClientConfig::new("ws://game.local/ws?room=7").with_token("t");
        assert_eq!(config.connection_target(), "ws://game.local/ws?room=7&token=t");
    }
}
