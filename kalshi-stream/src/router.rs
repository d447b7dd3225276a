//! Per-channel message dispatch

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::debug;

use kalshi_core::{Channel, KalshiError, KalshiResult, Message};

/// Consumer for the messages of one channel
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &Message) -> anyhow::Result<()>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, message: &Message) -> anyhow::Result<()> {
        self(message)
    }
}

/// Wrap a callback taking a decoded payload into a [`MessageHandler`]
///
/// A payload that fails to decode is reported as a handler error.
pub fn typed<T, F>(f: F) -> impl MessageHandler
where
    T: DeserializeOwned,
    F: Fn(T) -> anyhow::Result<()> + Send + Sync,
{
    move |message: &Message| -> anyhow::Result<()> { f(message.decode::<T>()?) }
}

/// Maps each channel to at most one handler
#[derive(Default)]
pub struct MessageRouter {
    handlers: RwLock<HashMap<Channel, Arc<dyn MessageHandler>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `channel`, replacing any previous one
    pub fn register<H>(&self, channel: Channel, handler: H)
    where
        H: MessageHandler + 'static,
    {
        self.handlers.write().insert(channel, Arc::new(handler));
    }

    pub fn unregister(&self, channel: Channel) {
        self.handlers.write().remove(&channel);
    }

    pub fn has_handler(&self, channel: Channel) -> bool {
        self.handlers.read().contains_key(&channel)
    }

    /// Hand `message` to its channel's handler
    ///
    /// Messages for channels without a handler are dropped and count as
    /// success. The handler runs outside the lock, so it may (un)register.
    pub fn route(&self, message: &Message) -> KalshiResult<()> {
        let Some(channel) = message.route_channel() else {
            debug!(
                "[Kalshi WS] Dropping unroutable message (type: {}, channel: {:?})",
                message.msg_type, message.channel
            );
            return Ok(());
        };

        let handler = self.handlers.read().get(&channel).cloned();
        match handler {
            Some(handler) => handler
                .handle(message)
                .map_err(|e| KalshiError::handler(channel.as_str(), format!("{:#}", e))),
            None => {
                debug!("[Kalshi WS] No handler for {}, dropping message", channel);
                Ok(())
            }
        }
    }
}
