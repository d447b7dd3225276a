//! Channel catalog
//!
//! Every streaming topic the exchange offers, and whether subscribing to it
//! requires an authenticated session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KalshiError;

/// A subscription topic on the streaming API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Market price/volume summary
    Ticker,
    /// Incremental ticker updates
    TickerV2,
    /// Public trades
    Trade,
    /// Market open/close/settlement events
    MarketLifecycleV2,
    /// Multivariate collection lookups
    Multivariate,
    /// Orderbook snapshot followed by deltas
    OrderbookDelta,
    /// The user's order updates
    UserOrders,
    /// The user's fills
    Fill,
    /// The user's position changes
    MarketPositions,
    /// Order group lifecycle updates
    OrderGroupUpdates,
    /// RFQ and quote traffic
    Communications,
}

impl Channel {
    /// The full catalog, in declaration order
    pub const ALL: [Channel; 11] = [
        Channel::Ticker,
        Channel::TickerV2,
        Channel::Trade,
        Channel::MarketLifecycleV2,
        Channel::Multivariate,
        Channel::OrderbookDelta,
        Channel::UserOrders,
        Channel::Fill,
        Channel::MarketPositions,
        Channel::OrderGroupUpdates,
        Channel::Communications,
    ];

    /// Wire name of the channel
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Ticker => "ticker",
            Channel::TickerV2 => "ticker_v2",
            Channel::Trade => "trade",
            Channel::MarketLifecycleV2 => "market_lifecycle_v2",
            Channel::Multivariate => "multivariate",
            Channel::OrderbookDelta => "orderbook_delta",
            Channel::UserOrders => "user_orders",
            Channel::Fill => "fill",
            Channel::MarketPositions => "market_positions",
            Channel::OrderGroupUpdates => "order_group_updates",
            Channel::Communications => "communications",
        }
    }

    /// Whether the exchange only serves this channel to authenticated sessions
    pub fn requires_auth(&self) -> bool {
        match self {
            Channel::Ticker
            | Channel::TickerV2
            | Channel::Trade
            | Channel::MarketLifecycleV2
            | Channel::Multivariate => false,
            Channel::OrderbookDelta
            | Channel::UserOrders
            | Channel::Fill
            | Channel::MarketPositions
            | Channel::OrderGroupUpdates
            | Channel::Communications => true,
        }
    }

    /// Look up a channel by its wire name
    pub fn from_name(name: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Infer the channel a data frame belongs to from its message `type`
    ///
    /// Data frames carry their own type names (`orderbook_snapshot`,
    /// `user_order`, ...) which do not always match the channel they were
    /// subscribed through.
    pub fn from_message_type(msg_type: &str) -> Option<Channel> {
        let channel = match msg_type {
            "ticker" => Channel::Ticker,
            "ticker_v2" => Channel::TickerV2,
            "trade" => Channel::Trade,
            "market_lifecycle_v2" | "event_lifecycle" => Channel::MarketLifecycleV2,
            "multivariate" | "multivariate_lookup" => Channel::Multivariate,
            "orderbook_snapshot" | "orderbook_delta" => Channel::OrderbookDelta,
            "user_order" | "user_orders" => Channel::UserOrders,
            "fill" => Channel::Fill,
            "market_position" | "market_positions" => Channel::MarketPositions,
            "order_group_updates" => Channel::OrderGroupUpdates,
            t if t.starts_with("rfq_") || t.starts_with("quote_") => Channel::Communications,
            _ => return None,
        };
        Some(channel)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = KalshiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::from_name(s).ok_or_else(|| KalshiError::config(format!("unknown channel: {}", s)))
    }
}
