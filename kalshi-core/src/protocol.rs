//! WebSocket message types for the streaming API
//!
//! These types define the JSON protocol spoken with the exchange: commands
//! flow client -> server, messages flow server -> client.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::Channel;
use crate::error::{KalshiError, KalshiResult};

/// Command id reserved for a protocol-level `auth` command
pub const AUTH_COMMAND_ID: u64 = 1;

/// Channel-specific filter parameters (e.g. `market_tickers`)
pub type Params = serde_json::Map<String, Value>;

// ============================================================================
// Client -> Server
// ============================================================================

/// Kind of command sent to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Auth,
    Subscribe,
    Unsubscribe,
    Ping,
}

/// Command sent to the streaming API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub cmd: CommandKind,
    #[serde(default)]
    pub params: Params,
}

impl Command {
    /// Subscribe command for one channel. `channels` always names the channel,
    /// even if `params` carries a key of the same name.
    pub fn subscribe(id: u64, channel: Channel, params: &Params) -> Self {
        Self {
            id,
            cmd: CommandKind::Subscribe,
            params: channel_params(channel, params),
        }
    }

    /// Unsubscribe command for one channel
    pub fn unsubscribe(id: u64, channel: Channel, params: &Params) -> Self {
        Self {
            id,
            cmd: CommandKind::Unsubscribe,
            params: channel_params(channel, params),
        }
    }

    /// Keepalive probe
    pub fn ping(id: u64) -> Self {
        Self {
            id,
            cmd: CommandKind::Ping,
            params: Params::new(),
        }
    }

    /// Serialize to the JSON text frame sent over the socket
    pub fn to_json(&self) -> KalshiResult<String> {
        serde_json::to_string(self)
            .map_err(|e| KalshiError::protocol(format!("Failed to encode command {}: {}", self.id, e)))
    }
}

fn channel_params(channel: Channel, params: &Params) -> Params {
    let mut out = params.clone();
    out.insert(
        "channels".to_string(),
        Value::Array(vec![Value::String(channel.as_str().to_string())]),
    );
    out
}

// ============================================================================
// Server -> Client
// ============================================================================

/// Frame received from the streaming API
///
/// A nonzero `id` marks a reply to the command with that id; a nonempty
/// `channel` (or a data `type` that names one) marks a channel event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "type", default)]
    pub msg_type: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub msg: Value,
    #[serde(default)]
    pub data: Value,
    /// Server-assigned subscription id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<u64>,
    /// Per-subscription sequence number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl Message {
    /// Parse a text frame
    pub fn parse(text: &str) -> KalshiResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| KalshiError::protocol(format!("Malformed frame: {}", e)))
    }

    /// Parse a binary frame
    pub fn parse_slice(bytes: &[u8]) -> KalshiResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| KalshiError::protocol(format!("Malformed frame: {}", e)))
    }

    /// Whether this frame answers a command
    pub fn is_reply(&self) -> bool {
        self.id != 0
    }

    /// Whether this frame is a server-side error report
    pub fn is_error(&self) -> bool {
        self.msg_type == "error"
    }

    /// The catalog channel this frame should be routed to, if any
    pub fn route_channel(&self) -> Option<Channel> {
        if self.channel.is_empty() {
            Channel::from_message_type(&self.msg_type)
        } else {
            Channel::from_name(&self.channel)
        }
    }

    /// The event body: `data` when present, otherwise `msg`
    pub fn payload(&self) -> &Value {
        if self.data.is_null() {
            &self.msg
        } else {
            &self.data
        }
    }

    /// Decode the event body into a typed payload
    pub fn decode<T: DeserializeOwned>(&self) -> KalshiResult<T> {
        T::deserialize(self.payload()).map_err(|e| {
            KalshiError::protocol(format!("Failed to decode {} payload: {}", self.msg_type, e))
        })
    }

    /// Convert an `error` reply into a [`KalshiError::Server`]
    pub fn server_error(&self) -> Option<KalshiError> {
        if !self.is_error() {
            return None;
        }
        let body = self.payload();
        let code = body.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = body
            .get("msg")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        Some(KalshiError::server(code, message))
    }
}

// ============================================================================
// Session state
// ============================================================================

/// Lifecycle state of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No live transport; a reconnect may be pending
    Disconnected,
    /// Transport upgrade with signed headers in flight
    Authenticating,
    /// Authenticated and receiving data
    Connected,
    /// Closed by the caller, terminal
    Closed,
}

impl ConnectionState {
    pub fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Authenticating => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closed => 3,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Authenticating,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_command_wire_shape() {
        let mut params = Params::new();
        params.insert("market_tickers".to_string(), json!(["KXBTC-25"]));

        let cmd = Command::subscribe(7, Channel::Ticker, &params);
        let value: Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "id": 7,
                "cmd": "subscribe",
                "params": { "channels": ["ticker"], "market_tickers": ["KXBTC-25"] }
            })
        );
    }

    #[test]
    fn test_channels_key_cannot_be_overridden() {
        let mut params = Params::new();
        params.insert("channels".to_string(), json!(["fill"]));

        let cmd = Command::unsubscribe(3, Channel::Trade, &params);
        assert_eq!(cmd.cmd, CommandKind::Unsubscribe);
        assert_eq!(cmd.params["channels"], json!(["trade"]));
    }

    #[test]
    fn test_ping_has_empty_params() {
        let value: Value = serde_json::from_str(&Command::ping(42).to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "id": 42, "cmd": "ping", "params": {} }));
    }

    #[test]
    fn test_message_defaults_for_missing_fields() {
        let msg = Message::parse(r#"{"type":"ticker","sid":4,"msg":{"market_ticker":"X"}}"#).unwrap();
        assert_eq!(msg.id, 0);
        assert!(!msg.is_reply());
        assert!(msg.channel.is_empty());
        assert!(msg.data.is_null());
        assert_eq!(msg.sid, Some(4));
        assert_eq!(msg.payload(), &json!({ "market_ticker": "X" }));
        assert_eq!(msg.route_channel(), Some(Channel::Ticker));
    }

    #[test]
    fn test_explicit_channel_wins_over_type() {
        let msg = Message::parse(r#"{"type":"ticker","channel":"trade","data":{}}"#).unwrap();
        assert_eq!(msg.route_channel(), Some(Channel::Trade));

        let unknown = Message::parse(r#"{"type":"ticker","channel":"mystery"}"#).unwrap();
        assert_eq!(unknown.route_channel(), None);
    }

    #[test]
    fn test_malformed_frame_is_protocol_error() {
        assert!(matches!(Message::parse("not json"), Err(KalshiError::Protocol(_))));
        assert!(matches!(Message::parse_slice(b"[1,2"), Err(KalshiError::Protocol(_))));
    }

    #[test]
    fn test_server_error_extraction() {
        let msg = Message::parse(
            r#"{"id":5,"type":"error","msg":{"code":6,"msg":"Already subscribed"}}"#,
        )
        .unwrap();
        assert_eq!(msg.server_error(), Some(KalshiError::server(6, "Already subscribed")));

        let ok = Message::parse(r#"{"id":5,"type":"subscribed","msg":{"sid":1}}"#).unwrap();
        assert_eq!(ok.server_error(), None);
    }

    #[test]
    fn test_decode_prefers_data() {
        #[derive(Deserialize)]
        struct Body {
            ticker: String,
        }

        let msg = Message::parse(
            r#"{"type":"ticker","channel":"ticker","msg":{"ticker":"A"},"data":{"ticker":"B"}}"#,
        )
        .unwrap();
        assert_eq!(msg.decode::<Body>().unwrap().ticker, "B");
    }

    #[test]
    fn test_state_u8_round_trip() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Authenticating,
            ConnectionState::Connected,
            ConnectionState::Closed,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }
}
