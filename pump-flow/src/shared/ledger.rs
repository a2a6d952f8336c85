/// Trader ledgers with FIFO cost-basis realized profit.
///
/// Ledgers are event-driven running totals: each accepted trade is applied
/// exactly once and nothing is ever recomputed from the trade window.
///
/// Lot amounts are whole SOL units and lot prices are USD per SOL at the time
/// of the buy, so a matched unit contributes `sell_price - buy_price`. Units
/// bought or sold while no spot price was known are matched but contribute
/// nothing to profit.

use crate::shared::types::{RetainedTrade, Side};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::VecDeque;

/// Remaining amounts below this are treated as fully consumed (f64 dust)
const AMOUNT_EPSILON: f64 = 1e-12;

/// An open buy lot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lot {
    pub amount: f64,
    /// `None` when bought before any spot price was known
    pub unit_price_usd: Option<f64>,
}

/// Outcome of matching one sell against the open lots
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SellMatch {
    pub matched: f64,
    pub unmatched: f64,
    pub realized_profit_usd: f64,
}

/// Running position for one trader in one token
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    /// Oldest first
    lots: VecDeque<Lot>,
    pub buy_volume_usd: f64,
    pub sell_volume_usd: f64,
    pub total_trades: u64,
    pub realized_profit_usd: f64,
    /// Sold amount that found no open lot to match against
    pub unmatched_sell_amount: f64,
}

impl PositionLedger {
    pub fn record_buy(&mut self, amount: f64, unit_price_usd: f64) {
        self.total_trades += 1;
        self.buy_volume_usd += amount * unit_price_usd;
        if amount > AMOUNT_EPSILON {
            self.lots.push_back(Lot {
                amount,
                unit_price_usd: known_price(unit_price_usd),
            });
        }
    }

    pub fn record_sell(&mut self, amount: f64, unit_price_usd: f64) -> SellMatch {
        self.total_trades += 1;
        self.sell_volume_usd += amount * unit_price_usd;

        let sell_price = known_price(unit_price_usd);
        let mut remaining = amount;
        let mut outcome = SellMatch::default();

        while remaining > AMOUNT_EPSILON {
            let Some(lot) = self.lots.front_mut() else {
                break;
            };

            let consumed = remaining.min(lot.amount);
            if let (Some(sell), Some(buy)) = (sell_price, lot.unit_price_usd) {
                outcome.realized_profit_usd += consumed * (sell - buy);
            }
            outcome.matched += consumed;
            lot.amount -= consumed;
            remaining -= consumed;

            if lot.amount <= AMOUNT_EPSILON {
                self.lots.pop_front();
            }
        }

        outcome.unmatched = remaining.max(0.0);
        self.realized_profit_usd += outcome.realized_profit_usd;
        self.unmatched_sell_amount += outcome.unmatched;
        outcome
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> + '_ {
        self.lots.iter()
    }

    pub fn open_amount(&self) -> f64 {
        self.lots.iter().map(|lot| lot.amount).sum()
    }
}

fn known_price(unit_price_usd: f64) -> Option<f64> {
    (unit_price_usd.is_finite() && unit_price_usd > 0.0).then_some(unit_price_usd)
}

/// All positions of one trader plus trader-wide running totals
#[derive(Debug, Clone)]
pub struct TraderLedger {
    pub trader_id: String,
    /// Keyed by token mint, first-traded order
    positions: IndexMap<String, PositionLedger>,
    pub buy_volume_usd: f64,
    pub sell_volume_usd: f64,
    pub total_trades: u64,
    pub realized_profit_usd: f64,
    pub last_trade_at: DateTime<Utc>,
}

impl TraderLedger {
    pub fn new(trader_id: String, first_trade_at: DateTime<Utc>) -> Self {
        Self {
            trader_id,
            positions: IndexMap::new(),
            buy_volume_usd: 0.0,
            sell_volume_usd: 0.0,
            total_trades: 0,
            realized_profit_usd: 0.0,
            last_trade_at: first_trade_at,
        }
    }

    pub fn apply(&mut self, trade: &RetainedTrade) {
        let position = self
            .positions
            .entry(trade.event.token_id.clone())
            .or_default();

        self.total_trades += 1;
        self.last_trade_at = self.last_trade_at.max(trade.received_at);

        match trade.side() {
            Side::Buy => {
                position.record_buy(trade.sol_amount, trade.unit_price_usd);
                self.buy_volume_usd += trade.usd_value;
            }
            Side::Sell => {
                let outcome = position.record_sell(trade.sol_amount, trade.unit_price_usd);
                self.sell_volume_usd += trade.usd_value;
                self.realized_profit_usd += outcome.realized_profit_usd;
            }
        }
    }

    pub fn position(&self, token_id: &str) -> Option<&PositionLedger> {
        self.positions.get(token_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&String, &PositionLedger)> + '_ {
        self.positions.iter()
    }

    /// Buy minus sell volume
    pub fn net_flow_usd(&self) -> f64 {
        self.buy_volume_usd - self.sell_volume_usd
    }

    /// Tokens with open lots remaining
    pub fn open_positions(&self) -> usize {
        self.positions
            .values()
            .filter(|position| position.lots().next().is_some())
            .count()
    }

    pub fn standing(&self) -> TraderStanding {
        TraderStanding {
            trader_id: self.trader_id.clone(),
            total_trades: self.total_trades,
            buy_volume_usd: self.buy_volume_usd,
            sell_volume_usd: self.sell_volume_usd,
            net_flow_usd: self.net_flow_usd(),
            realized_profit_usd: self.realized_profit_usd,
            tokens_traded: self.positions.len(),
            open_positions: self.open_positions(),
            last_trade_at: self.last_trade_at,
        }
    }
}

/// Point-in-time leaderboard row for one trader
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraderStanding {
    pub trader_id: String,
    pub total_trades: u64,
    pub buy_volume_usd: f64,
    pub sell_volume_usd: f64,
    pub net_flow_usd: f64,
    pub realized_profit_usd: f64,
    pub tokens_traded: usize,
    pub open_positions: usize,
    pub last_trade_at: DateTime<Utc>,
}

/// Session-lifetime ledgers for every trader seen, first-seen order
#[derive(Debug, Clone, Default)]
pub struct TraderBook {
    traders: IndexMap<String, TraderLedger>,
}

impl TraderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an accepted trade to its trader's ledger, creating it on first sight.
    pub fn apply(&mut self, trade: &RetainedTrade) {
        self.traders
            .entry(trade.event.trader_id.clone())
            .or_insert_with(|| {
                TraderLedger::new(trade.event.trader_id.clone(), trade.received_at)
            })
            .apply(trade);
    }

    pub fn get(&self, trader_id: &str) -> Option<&TraderLedger> {
        self.traders.get(trader_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraderLedger> + '_ {
        self.traders.values()
    }

    pub fn standings(&self) -> Vec<TraderStanding> {
        self.traders.values().map(TraderLedger::standing).collect()
    }

    pub fn len(&self) -> usize {
        self.traders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traders.is_empty()
    }
}
