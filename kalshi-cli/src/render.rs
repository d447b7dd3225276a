//! Terminal rendering of stream messages

use rust_decimal::Decimal;

use kalshi_stream::payload::{
    cents_to_dollars, FillPayload, OrderbookDeltaPayload, OrderbookSnapshotPayload, Side,
    TickerPayload, TradePayload,
};
use kalshi_stream::{Channel, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    /// One raw frame per line
    Json,
}

/// Render one message as a single output line
pub fn render(channel: Channel, message: &Message, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string(message).unwrap_or_else(|_| message.payload().to_string())
        }
        OutputFormat::Text => {
            let body = match channel {
                Channel::Ticker | Channel::TickerV2 => message.decode().ok().map(ticker_line),
                Channel::Trade => message.decode().ok().map(trade_line),
                Channel::OrderbookDelta if message.msg_type == "orderbook_snapshot" => {
                    message.decode().ok().map(snapshot_line)
                }
                Channel::OrderbookDelta => message.decode().ok().map(delta_line),
                Channel::Fill => message.decode().ok().map(fill_line),
                _ => None,
            };
            let body = body.unwrap_or_else(|| format!("{}  {}", message.msg_type, message.payload()));
            format!("{:<14} {}", channel.as_str(), body)
        }
    }
}

fn dollars(cents: Option<i64>) -> String {
    cents
        .map(cents_to_dollars)
        .map(|d: Decimal| format!("${:.2}", d))
        .unwrap_or_else(|| "-".to_string())
}

fn side(side: Side) -> &'static str {
    match side {
        Side::Yes => "YES",
        Side::No => "NO",
    }
}

fn ticker_line(tick: TickerPayload) -> String {
    let volume = tick
        .volume
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  yes {}  bid {}  ask {}  vol {}",
        tick.market_ticker,
        dollars(tick.yes_price.or(tick.price)),
        dollars(tick.yes_bid),
        dollars(tick.yes_ask),
        volume
    )
}

fn trade_line(trade: TradePayload) -> String {
    let taker = trade.taker_side.map(side).unwrap_or("-");
    format!(
        "{}  {} @ {}  taker {}",
        trade.market_ticker,
        trade.count,
        dollars(trade.yes_price),
        taker
    )
}

fn snapshot_line(book: OrderbookSnapshotPayload) -> String {
    let best = |s: Side| {
        book.best_bid(s)
            .map(|(price, qty)| format!("{} x{}", dollars(Some(price)), qty))
            .unwrap_or_else(|| "-".to_string())
    };
    format!(
        "{}  snapshot  best yes {}  best no {}",
        book.market_ticker,
        best(Side::Yes),
        best(Side::No)
    )
}

fn delta_line(delta: OrderbookDeltaPayload) -> String {
    format!(
        "{}  {} {} {:+}",
        delta.market_ticker,
        side(delta.side),
        dollars(Some(delta.price)),
        delta.delta
    )
}

fn fill_line(fill: FillPayload) -> String {
    format!(
        "{}  filled {} {} @ {}  order {}",
        fill.market_ticker,
        fill.count,
        side(fill.side),
        dollars(fill.yes_price),
        fill.order_id
    )
}
