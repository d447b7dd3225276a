//! Core types for the Kalshi streaming client
//!
//! This crate defines the shared pieces used across the workspace: the
//! error taxonomy, the channel catalog, and the streaming wire protocol.

pub mod channel;
pub mod error;
pub mod protocol;

pub use channel::Channel;
pub use error::{KalshiError, KalshiResult};
pub use protocol::{Command, CommandKind, ConnectionState, Message, Params, AUTH_COMMAND_ID};
