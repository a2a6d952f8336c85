/// Core data types for pump.fun trade events
///
/// `RawTradeEvent` matches the JSON payload of the `tradeCreated` Socket.IO
/// event. Everything downstream of ingestion works on the validated
/// `TradeEvent` / `RetainedTrade` records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smallest-unit divisor: 10^9 lamports = 1 SOL
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Raw `tradeCreated` payload as delivered by the feed
///
/// Every field is optional here; presence is enforced by ingestion.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTradeEvent {
    /// Trader wallet address
    #[serde(default)]
    pub user: Option<String>,
    /// Token mint address
    #[serde(default)]
    pub mint: Option<String>,
    /// Event time in unix seconds
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Traded base-currency amount in lamports
    #[serde(default)]
    pub sol_amount: Option<u64>,
    #[serde(default)]
    pub is_buy: Option<bool>,
    #[serde(default)]
    pub usd_market_cap: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub image_uri: Option<String>,
    /// Traded token amount in the token's smallest unit
    #[serde(default)]
    pub token_amount: Option<u64>,
    /// Transaction signature
    #[serde(default)]
    pub signature: Option<String>,
}

/// Trade side (Buy or Sell)
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_is_buy(is_buy: bool) -> Self {
        if is_buy {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }

    /// Check if this is a buy
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Check if this is a sell
    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptive token fields carried through to presentation
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub image_uri: Option<String>,
}

/// Validated trade event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeEvent {
    pub trader_id: String,
    pub token_id: String,
    /// Event time in unix seconds (as reported by the feed)
    pub timestamp: i64,
    pub lamports: u64,
    pub side: Side,
    pub market_cap_usd: f64,
    pub token: TokenInfo,
    pub token_amount: Option<u64>,
    pub signature: Option<String>,
}

impl TradeEvent {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            token_id: self.token_id.clone(),
            timestamp: self.timestamp,
            lamports: self.lamports,
        }
    }

    /// Whole-unit SOL amount
    pub fn sol_amount(&self) -> f64 {
        self.lamports as f64 / LAMPORTS_PER_SOL
    }
}

/// Deduplication key: the same trade delivered twice shares all three fields
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub token_id: String,
    pub timestamp: i64,
    pub lamports: u64,
}

/// A trade accepted by ingestion, stamped with its local arrival time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetainedTrade {
    pub event: TradeEvent,
    /// Local wall-clock arrival time, drives eviction and windowing
    pub received_at: DateTime<Utc>,
    /// Whole-unit SOL amount
    pub sol_amount: f64,
    /// USD value of `sol_amount` at the spot price applied on arrival
    pub usd_value: f64,
    /// Spot price (USD per SOL) applied on arrival; 0 before the first price
    pub unit_price_usd: f64,
}

impl RetainedTrade {
    pub fn natural_key(&self) -> NaturalKey {
        self.event.natural_key()
    }

    pub fn side(&self) -> Side {
        self.event.side
    }
}
