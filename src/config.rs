//! Client configuration and fixed protocol constants.
//!
//! The Twitch chat endpoint, capability list, keepalive reply and welcome
//! marker are protocol facts rather than tunables, so they live here as
//! explicit constants instead of being scattered through the connection
//! code.

/// Hostname of the Twitch IRC WebSocket gateway.
pub const TWITCH_HOST: &str = "irc-ws.chat.twitch.tv";

/// Capability request sent as the first handshake line.
pub const CAP_REQ: &str = "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership";

/// Reply sent for every server keepalive `PING`.
pub const PONG_REPLY: &str = "PONG :tmi.twitch.tv";

/// A line starting with this marks a successful login (RPL_WELCOME from
/// the Twitch IRC server).
pub const WELCOME_PREFIX: &str = ":tmi.twitch.tv 001";

/// Connection settings for a [`TmiClient`](crate::TmiClient).
#[derive(Debug, Clone)]
pub struct TmiConfig {
    /// OAuth token, with or without the `oauth:` prefix.
    pub token: String,
    /// Username passed in the `NICK` handshake line.
    pub username: String,
    /// Use `wss://` on port 443 when true, `ws://` on port 80 otherwise.
    pub secure: bool,
    /// Gateway hostname. Defaults to [`TWITCH_HOST`].
    pub host: String,
}

impl TmiConfig {
    /// Creates a secure configuration for the Twitch gateway.
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            secure: true,
            host: TWITCH_HOST.to_string(),
        }
    }

    /// Switches to the unencrypted `ws://` scheme on port 80.
    pub fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }

    /// WebSocket URL selected by the `secure` flag.
    pub fn url(&self) -> String {
        if self.secure {
            format!("wss://{}:443", self.host)
        } else {
            format!("ws://{}:80", self.host)
        }
    }

    /// The `PASS` handshake line, normalizing the token to the
    /// `oauth:` form the server expects.
    pub(crate) fn pass_line(&self) -> String {
        if self.token.starts_with("oauth:") {
            format!("PASS {}", self.token)
        } else {
            format!("PASS oauth:{}", self.token)
        }
    }

    /// The `NICK` handshake line.
    pub(crate) fn nick_line(&self) -> String {
        format!("NICK {}", self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_selection() {
        let config = TmiConfig::new("token", "nick");
        assert_eq!(config.url(), "wss://irc-ws.chat.twitch.tv:443");

        let config = config.insecure();
        assert_eq!(config.url(), "ws://irc-ws.chat.twitch.tv:80");
    }

    #[test]
    fn test_pass_line_normalizes_token() {
        let config = TmiConfig::new("abcdef", "nick");
        assert_eq!(config.pass_line(), "PASS oauth:abcdef");

        let config = TmiConfig::new("oauth:abcdef", "nick");
        assert_eq!(config.pass_line(), "PASS oauth:abcdef");
    }
}
