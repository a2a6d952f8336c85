/// Ranking of aggregated entities and the user-facing view settings.

use crate::shared::aggregation::TokenAggregate;
use crate::shared::error::ConfigError;
use crate::shared::ledger::TraderStanding;
use chrono::Duration;
use serde::Serialize;
use std::str::FromStr;

/// Selectable window sizes in minutes
pub const WINDOW_CHOICES: [u32; 13] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 15, 30, 60];

pub const DEFAULT_ROW_LIMIT: usize = 12;
pub const MAX_ROW_LIMIT: usize = 20;

/// Token feed sort keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TokenMetric {
    #[default]
    MarketCap,
    TotalVolume,
    BuyVolume,
    SellVolume,
    UniqueTraders,
}

impl TokenMetric {
    pub const ALL: [TokenMetric; 5] = [
        TokenMetric::MarketCap,
        TokenMetric::TotalVolume,
        TokenMetric::BuyVolume,
        TokenMetric::SellVolume,
        TokenMetric::UniqueTraders,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TokenMetric::MarketCap => "Market Cap",
            TokenMetric::TotalVolume => "Total Volume",
            TokenMetric::BuyVolume => "Buy Volume",
            TokenMetric::SellVolume => "Sell Volume",
            TokenMetric::UniqueTraders => "Unique Traders",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self)
    }
}

impl FromStr for TokenMetric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise(s).as_str() {
            "marketcap" => Ok(TokenMetric::MarketCap),
            "totalvolume" => Ok(TokenMetric::TotalVolume),
            "buyvolume" => Ok(TokenMetric::BuyVolume),
            "sellvolume" => Ok(TokenMetric::SellVolume),
            "uniquetraders" => Ok(TokenMetric::UniqueTraders),
            _ => Err(ConfigError::UnknownMetric(s.to_string())),
        }
    }
}

/// Trader leaderboard sort keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TraderMetric {
    #[default]
    TotalTrades,
    RealizedProfit,
    NetFlow,
}

impl TraderMetric {
    pub const ALL: [TraderMetric; 3] = [
        TraderMetric::TotalTrades,
        TraderMetric::RealizedProfit,
        TraderMetric::NetFlow,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TraderMetric::TotalTrades => "Total Trades",
            TraderMetric::RealizedProfit => "Realized Profit",
            TraderMetric::NetFlow => "Net Flow",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self)
    }
}

impl FromStr for TraderMetric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise(s).as_str() {
            "totaltrades" | "trades" => Ok(TraderMetric::TotalTrades),
            "realizedprofit" | "profit" | "pnl" => Ok(TraderMetric::RealizedProfit),
            "netflow" => Ok(TraderMetric::NetFlow),
            _ => Err(ConfigError::UnknownMetric(s.to_string())),
        }
    }
}

fn normalise(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T) -> T {
    let index = all.iter().position(|m| *m == current).unwrap_or(0);
    all[(index + 1) % all.len()]
}

/// An entity that can be ranked by metric `M`
pub trait Rankable<M> {
    fn metric_value(&self, metric: M) -> f64;
}

impl Rankable<TokenMetric> for TokenAggregate {
    fn metric_value(&self, metric: TokenMetric) -> f64 {
        match metric {
            TokenMetric::MarketCap => self.market_cap_usd,
            TokenMetric::TotalVolume => self.total_volume_usd,
            TokenMetric::BuyVolume => self.buy_volume_usd,
            TokenMetric::SellVolume => self.sell_volume_usd,
            TokenMetric::UniqueTraders => self.unique_traders as f64,
        }
    }
}

impl Rankable<TraderMetric> for TraderStanding {
    fn metric_value(&self, metric: TraderMetric) -> f64 {
        match metric {
            TraderMetric::TotalTrades => self.total_trades as f64,
            TraderMetric::RealizedProfit => self.realized_profit_usd,
            TraderMetric::NetFlow => self.net_flow_usd,
        }
    }
}

/// Sort descending by `metric` and keep the first `limit` entries.
///
/// The sort is stable: ties keep their input order.
pub fn rank<T, M>(mut entities: Vec<T>, metric: M, limit: usize) -> Vec<T>
where
    T: Rankable<M>,
    M: Copy,
{
    entities.sort_by(|a, b| b.metric_value(metric).total_cmp(&a.metric_value(metric)));
    entities.truncate(limit);
    entities
}

/// Display window, restricted to `WINDOW_CHOICES`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowMinutes(u32);

impl WindowMinutes {
    pub fn new(minutes: u32) -> Result<Self, ConfigError> {
        if WINDOW_CHOICES.contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(ConfigError::UnsupportedWindow(minutes))
        }
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }

    /// Next larger choice, wrapping to the smallest
    pub fn next(self) -> Self {
        Self(cycle(&WINDOW_CHOICES, self.0))
    }

    /// Next smaller choice, wrapping to the largest
    pub fn prev(self) -> Self {
        let index = WINDOW_CHOICES.iter().position(|m| *m == self.0).unwrap_or(0);
        Self(WINDOW_CHOICES[(index + WINDOW_CHOICES.len() - 1) % WINDOW_CHOICES.len()])
    }
}

impl Default for WindowMinutes {
    fn default() -> Self {
        Self(WINDOW_CHOICES[0])
    }
}

/// Number of displayed rows, 1..=20
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowLimit(usize);

impl RowLimit {
    pub fn new(rows: usize) -> Result<Self, ConfigError> {
        if (1..=MAX_ROW_LIMIT).contains(&rows) {
            Ok(Self(rows))
        } else {
            Err(ConfigError::RowLimit(rows))
        }
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn increment(self) -> Self {
        Self((self.0 + 1).min(MAX_ROW_LIMIT))
    }

    pub fn decrement(self) -> Self {
        Self(self.0.saturating_sub(1).max(1))
    }
}

impl Default for RowLimit {
    fn default() -> Self {
        Self(DEFAULT_ROW_LIMIT)
    }
}

/// User-selected view settings shared by both tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ViewConfig {
    pub window: WindowMinutes,
    pub limit: RowLimit,
    pub token_metric: TokenMetric,
    pub trader_metric: TraderMetric,
}

/// A single user-driven change to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    Window(WindowMinutes),
    Limit(RowLimit),
    TokenMetric(TokenMetric),
    TraderMetric(TraderMetric),
}

impl ViewConfig {
    pub fn apply(&mut self, change: ViewChange) {
        match change {
            ViewChange::Window(window) => self.window = window,
            ViewChange::Limit(limit) => self.limit = limit,
            ViewChange::TokenMetric(metric) => self.token_metric = metric,
            ViewChange::TraderMetric(metric) => self.trader_metric = metric,
        }
    }
}
