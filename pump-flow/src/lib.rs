/// pump-flow - Shared Library
///
/// This library provides common functionality for the two TUI binaries:
/// - token-feed: tokens ranked by market cap, volume or unique traders
/// - trader-leaderboard: traders ranked by activity or FIFO realized profit
///
/// The library includes:
/// - Core data types for trade events
/// - Socket.IO WebSocket client for the trade feed
/// - Spot price oracle
/// - Sliding-window trade store, trader ledgers and token aggregation
/// - Ranking and the engine driving it all
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{RawTradeEvent, RetainedTrade, Side, TokenInfo, TradeEvent};

pub use shared::websocket::ConnectionStatus;
pub use shared::websocket::{WebSocketClient, WebSocketConfig};

pub use shared::config::FlowConfig;
pub use shared::price::{HttpPriceSource, PriceCache, PriceOracle, PriceSource};

// Aggregation engine (shared across both TUIs)
pub use shared::aggregation::{aggregate_tokens, TokenAggregate};
pub use shared::engine::{run_engine, Engine, FeedSnapshot, Trigger, ViewSink};
pub use shared::ledger::{PositionLedger, TraderBook, TraderLedger, TraderStanding};
pub use shared::ranking::{
    rank, RowLimit, TokenMetric, TraderMetric, ViewChange, ViewConfig, WindowMinutes,
};
pub use shared::runtime::{spawn_flow, FlowHandle};
pub use shared::store::TradeStore;
