//! Error types for the Kalshi streaming client

use thiserror::Error;

/// Client-wide error type
///
/// Variants follow how each failure is handled: configuration and
/// subscription mistakes are returned to the caller, transport and
/// authentication failures drive the reconnect path, and protocol or
/// handler failures are reported without stopping the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KalshiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not subscribed to channel: {0}")]
    NotSubscribed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Handler error ({channel}): {message}")]
    Handler { channel: String, message: String },

    #[error("Server error (code {code}): {message}")]
    Server { code: i64, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Client closed")]
    Closed,
}

impl KalshiError {
    pub fn config(msg: impl Into<String>) -> Self {
        KalshiError::Config(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        KalshiError::Auth(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        KalshiError::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        KalshiError::Protocol(msg.into())
    }

    pub fn not_subscribed(channel: impl Into<String>) -> Self {
        KalshiError::NotSubscribed(channel.into())
    }

    pub fn handler(channel: impl Into<String>, message: impl Into<String>) -> Self {
        KalshiError::Handler {
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn server(code: i64, message: impl Into<String>) -> Self {
        KalshiError::Server {
            code,
            message: message.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        KalshiError::Timeout(msg.into())
    }

    /// Whether reconnecting could resolve this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KalshiError::Auth(_) | KalshiError::Transport(_) | KalshiError::Timeout(_)
        )
    }
}

/// Result type alias for client operations
pub type KalshiResult<T> = Result<T, KalshiError>;
