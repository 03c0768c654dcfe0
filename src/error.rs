//! Error types for the TMI client.
//!
//! Protocol-parse anomalies are never errors in this crate: the line
//! parser tolerates malformed input and produces partial records instead.
//! Transport failures surface as [`IrcState::Disconnected`] transitions,
//! not through this module.
//!
//! [`IrcState::Disconnected`]: crate::conn::IrcState

use thiserror::Error;

/// Convenience type alias for Results using [`TmiError`].
pub type Result<T, E = TmiError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TmiError {
    /// A send was attempted while the client is not connected.
    ///
    /// Recoverable: wait for a `Connected` state transition (or install
    /// the reconnect plugin) and retry.
    #[error("not connected to Twitch IRC")]
    NotConnected,

    /// A plugin with the same name is already registered.
    ///
    /// The pipeline keeps the first registration; this error is fatal to
    /// the registration call only.
    #[error("plugin {0:?} is already registered")]
    DuplicatePlugin(String),

    /// WebSocket transport error while opening or using a connection.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TmiError::NotConnected;
        assert_eq!(format!("{}", err), "not connected to Twitch IRC");

        let err = TmiError::DuplicatePlugin("throttle_out".to_string());
        assert_eq!(
            format!("{}", err),
            "plugin \"throttle_out\" is already registered"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err: TmiError = io_err.into();

        match err {
            TmiError::Io(_) => {}
            _ => panic!("Expected Io variant"),
        }
    }
}
