//! Kalshi real-time streaming client
//!
//! Maintains one authenticated WebSocket session to the exchange: channel
//! subscriptions, per-channel dispatch, keepalive pings, and automatic
//! reconnection with subscription restore.
//!
//! ```no_run
//! use std::sync::Arc;
//! use kalshi_stream::{typed, payload::TickerPayload, Channel, ClientOptions, Params, RsaPssSigner, StreamClient};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let signer = RsaPssSigner::from_pem_file("my-key-id", "kalshi.key")?;
//! let client = StreamClient::new(ClientOptions::production(Arc::new(signer))?);
//!
//! client.register_handler(
//!     Channel::Ticker,
//!     typed(|tick: TickerPayload| {
//!         println!("{} {:?}", tick.market_ticker, tick.yes_price_dollars());
//!         Ok(())
//!     }),
//! );
//! client.connect().await?;
//! client.subscribe(Channel::Ticker, Params::new()).await?;
//! # client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod backoff;
pub mod client;
pub mod config;
pub mod payload;
pub mod pending;
pub mod router;
pub mod subscription;

pub use auth::{Credentials, RequestSigner, RsaPssSigner};
pub use client::{ErrorCallback, ReconnectCallback, StreamClient, PING_ID_BASE};
pub use config::{ClientOptions, KALSHI_DEMO_WS_URL, KALSHI_WS_URL};
pub use pending::PendingResponses;
pub use router::{typed, MessageHandler, MessageRouter};
pub use subscription::{Subscription, SubscriptionManager};

pub use kalshi_core::{
    Channel, Command, CommandKind, ConnectionState, KalshiError, KalshiResult, Message, Params,
};
