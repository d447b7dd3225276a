//! Typed bodies for the common channels
//!
//! Prices arrive in cents (1-99); [`cents_to_dollars`] converts them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Contract side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

/// Convert a price in cents to dollars
pub fn cents_to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// `ticker` channel body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TickerPayload {
    #[serde(alias = "ticker")]
    pub market_ticker: String,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub yes_price: Option<i64>,
    #[serde(default)]
    pub no_price: Option<i64>,
    #[serde(default)]
    pub yes_bid: Option<i64>,
    #[serde(default)]
    pub yes_ask: Option<i64>,
    #[serde(default)]
    pub volume: Option<i64>,
    #[serde(default)]
    pub open_interest: Option<i64>,
    #[serde(default)]
    pub ts: Option<i64>,
}

impl TickerPayload {
    /// Best known YES price: the explicit one, else the last trade price
    pub fn yes_price_dollars(&self) -> Option<Decimal> {
        self.yes_price.or(self.price).map(cents_to_dollars)
    }
}

/// `trade` channel body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradePayload {
    #[serde(alias = "ticker")]
    pub market_ticker: String,
    #[serde(default)]
    pub trade_id: Option<String>,
    #[serde(default)]
    pub yes_price: Option<i64>,
    #[serde(default)]
    pub no_price: Option<i64>,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub taker_side: Option<Side>,
    #[serde(default)]
    pub ts: Option<i64>,
}

/// `orderbook_snapshot` body: `[price_cents, quantity]` levels per side
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderbookSnapshotPayload {
    pub market_ticker: String,
    #[serde(default)]
    pub yes: Vec<(i64, i64)>,
    #[serde(default)]
    pub no: Vec<(i64, i64)>,
}

impl OrderbookSnapshotPayload {
    /// Highest resting bid on `side`, as (price, quantity)
    pub fn best_bid(&self, side: Side) -> Option<(i64, i64)> {
        let levels = match side {
            Side::Yes => &self.yes,
            Side::No => &self.no,
        };
        levels.iter().copied().filter(|(_, qty)| *qty > 0).max_by_key(|(price, _)| *price)
    }
}

/// `orderbook_delta` body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderbookDeltaPayload {
    pub market_ticker: String,
    pub price: i64,
    pub delta: i64,
    pub side: Side,
}

/// `fill` channel body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FillPayload {
    pub trade_id: String,
    pub order_id: String,
    pub market_ticker: String,
    #[serde(default)]
    pub is_taker: bool,
    pub side: Side,
    #[serde(default)]
    pub yes_price: Option<i64>,
    pub count: i64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub ts: Option<i64>,
}
