/// Token-mode aggregation over a window of retained trades
///
/// A pure function of its input: every call rebuilds the aggregates from
/// scratch because window membership changes as trades age out.
use crate::shared::types::{RetainedTrade, Side, TokenInfo};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

/// Per-token statistics for one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenAggregate {
    pub token_id: String,
    /// Most recently observed description
    pub token: TokenInfo,
    pub buy_volume_usd: f64,
    pub sell_volume_usd: f64,
    pub total_volume_usd: f64,
    pub unique_traders: usize,
    pub trade_count: usize,
    /// Latest arrival time in the window
    pub last_trade_at: DateTime<Utc>,
    /// Most recently observed market cap
    pub market_cap_usd: f64,
}

impl TokenAggregate {
    /// Buy share of total volume, `None` without volume
    pub fn buy_ratio(&self) -> Option<f64> {
        if self.total_volume_usd > 0.0 {
            Some(self.buy_volume_usd / self.total_volume_usd)
        } else {
            None
        }
    }

    /// Whole seconds since the last trade in the window
    pub fn seconds_since_last_trade(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_trade_at).num_seconds().max(0)
    }
}

struct TokenAccumulator<'a> {
    latest: &'a RetainedTrade,
    buy_volume_usd: f64,
    sell_volume_usd: f64,
    traders: HashSet<&'a str>,
    trade_count: usize,
}

impl<'a> TokenAccumulator<'a> {
    fn new(trade: &'a RetainedTrade) -> Self {
        Self {
            latest: trade,
            buy_volume_usd: 0.0,
            sell_volume_usd: 0.0,
            traders: HashSet::new(),
            trade_count: 0,
        }
    }

    fn add(&mut self, trade: &'a RetainedTrade) {
        match trade.side() {
            Side::Buy => self.buy_volume_usd += trade.usd_value,
            Side::Sell => self.sell_volume_usd += trade.usd_value,
        }
        self.traders.insert(trade.event.trader_id.as_str());
        self.trade_count += 1;

        // ties resolve to the later arrival in iteration order
        if trade.received_at >= self.latest.received_at {
            self.latest = trade;
        }
    }

    fn finish(self) -> TokenAggregate {
        TokenAggregate {
            token_id: self.latest.event.token_id.clone(),
            token: self.latest.event.token.clone(),
            buy_volume_usd: self.buy_volume_usd,
            sell_volume_usd: self.sell_volume_usd,
            total_volume_usd: self.buy_volume_usd + self.sell_volume_usd,
            unique_traders: self.traders.len(),
            trade_count: self.trade_count,
            last_trade_at: self.latest.received_at,
            market_cap_usd: self.latest.event.market_cap_usd,
        }
    }
}

/// Group windowed trades by token, in first-seen order.
pub fn aggregate_tokens<'a, I>(trades: I) -> Vec<TokenAggregate>
where
    I: IntoIterator<Item = &'a RetainedTrade>,
{
    let mut groups: IndexMap<&'a str, TokenAccumulator<'a>> = IndexMap::new();

    for trade in trades {
        groups
            .entry(trade.event.token_id.as_str())
            .or_insert_with(|| TokenAccumulator::new(trade))
            .add(trade);
    }

    groups.into_values().map(TokenAccumulator::finish).collect()
}
