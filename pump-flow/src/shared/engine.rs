/// Aggregation engine: one owner for the trade store, the trader ledgers and
/// the view settings.
///
/// Every trigger runs to completion (mutate -> recompute -> rank -> publish)
/// before the next one is read, so engine state needs no locking.

use crate::shared::aggregation::{aggregate_tokens, TokenAggregate};
use crate::shared::error::IngestError;
use crate::shared::ingest::ingest;
use crate::shared::ledger::{TraderBook, TraderStanding};
use crate::shared::price::PriceCache;
use crate::shared::ranking::{rank, ViewChange, ViewConfig};
use crate::shared::store::TradeStore;
use crate::shared::types::RawTradeEvent;
use crate::shared::websocket::ConnectionStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Everything that can cause a recompute
#[derive(Debug, Clone)]
pub enum Trigger {
    Trade(RawTradeEvent),
    Connection(ConnectionStatus),
    PriceUpdated(f64),
    View(ViewChange),
}

/// Ranked, capped output of one aggregation pass
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub taken_at: DateTime<Utc>,
    pub view: ViewConfig,
    pub sol_price_usd: f64,
    pub tokens: Vec<TokenAggregate>,
    pub traders: Vec<TraderStanding>,
    pub retained_trades: usize,
    pub traders_seen: usize,
    #[serde(skip)]
    pub connection: ConnectionStatus,
}

impl Default for FeedSnapshot {
    fn default() -> Self {
        Self {
            taken_at: Utc::now(),
            view: ViewConfig::default(),
            sol_price_usd: 0.0,
            tokens: Vec::new(),
            traders: Vec::new(),
            retained_trades: 0,
            traders_seen: 0,
            connection: ConnectionStatus::default(),
        }
    }
}

/// Presentation collaborator receiving every snapshot
pub trait ViewSink {
    fn present(&mut self, snapshot: FeedSnapshot);
}

impl ViewSink for watch::Sender<FeedSnapshot> {
    fn present(&mut self, snapshot: FeedSnapshot) {
        // no receivers left is fine, the next pass overwrites anyway
        let _ = self.send(snapshot);
    }
}

/// Counters for rejected input, reported in logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub duplicates: u64,
    pub rejected: u64,
}

pub struct Engine {
    store: TradeStore,
    traders: TraderBook,
    price: PriceCache,
    view: ViewConfig,
    connection: ConnectionStatus,
    stats: IngestStats,
}

impl Engine {
    pub fn new(price: PriceCache, view: ViewConfig) -> Self {
        Self::with_store(TradeStore::new(), price, view)
    }

    pub fn with_store(store: TradeStore, price: PriceCache, view: ViewConfig) -> Self {
        Self {
            store,
            traders: TraderBook::new(),
            price,
            view,
            connection: ConnectionStatus::default(),
            stats: IngestStats::default(),
        }
    }

    /// Ingest one raw trade. Returns whether it was new (not a duplicate).
    ///
    /// Only new trades reach the trader ledgers.
    pub fn on_trade(
        &mut self,
        raw: RawTradeEvent,
        now: DateTime<Utc>,
    ) -> Result<bool, IngestError> {
        let trade = match ingest(raw, self.price.current(), now) {
            Ok(trade) => trade,
            Err(error) => {
                self.stats.rejected += 1;
                return Err(error);
            }
        };

        let outcome = self.store.add(trade.clone(), now);
        if outcome.evicted > 0 {
            debug!(evicted = outcome.evicted, "evicted trades beyond retention horizon");
        }

        if outcome.accepted {
            self.traders.apply(&trade);
            self.stats.accepted += 1;
        } else {
            self.stats.duplicates += 1;
        }

        Ok(outcome.accepted)
    }

    pub fn on_view_change(&mut self, change: ViewChange) {
        self.view.apply(change);
    }

    pub fn handle(&mut self, trigger: Trigger, now: DateTime<Utc>) {
        match trigger {
            Trigger::Trade(raw) => {
                if let Err(error) = self.on_trade(raw, now) {
                    warn!(%error, "rejected trade event");
                }
            }
            Trigger::Connection(status) => {
                if status == ConnectionStatus::Connected {
                    info!("Trade feed connected");
                }
                self.connection = status;
            }
            Trigger::PriceUpdated(price) => {
                debug!(price, "recomputing with new spot price");
            }
            Trigger::View(change) => {
                debug!(?change, "view changed");
                self.on_view_change(change);
            }
        }
    }

    /// Token aggregates for the current window, unranked
    pub fn token_aggregates(&self, now: DateTime<Utc>) -> Vec<TokenAggregate> {
        aggregate_tokens(self.store.within_window(self.view.window.duration(), now))
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> FeedSnapshot {
        let limit = self.view.limit.get();

        FeedSnapshot {
            taken_at: now,
            view: self.view,
            sol_price_usd: self.price.current(),
            tokens: rank(self.token_aggregates(now), self.view.token_metric, limit),
            traders: rank(self.traders.standings(), self.view.trader_metric, limit),
            retained_trades: self.store.len(),
            traders_seen: self.traders.len(),
            connection: self.connection,
        }
    }

    pub fn view(&self) -> ViewConfig {
        self.view
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn store(&self) -> &TradeStore {
        &self.store
    }

    pub fn traders(&self) -> &TraderBook {
        &self.traders
    }
}

/// Drive the engine from a trigger channel until every sender is gone.
pub async fn run_engine<V>(mut engine: Engine, mut triggers: mpsc::Receiver<Trigger>, mut sink: V)
where
    V: ViewSink,
{
    info!("Engine task started");
    sink.present(engine.snapshot(Utc::now()));

    while let Some(trigger) = triggers.recv().await {
        let now = Utc::now();
        engine.handle(trigger, now);
        sink.present(engine.snapshot(now));
    }

    let stats = engine.stats();
    info!(
        accepted = stats.accepted,
        duplicates = stats.duplicates,
        rejected = stats.rejected,
        "Engine task stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ranking::{RowLimit, TokenMetric, TraderMetric, WindowMinutes};
    use chrono::Duration;

    fn raw(trader: &str, mint: &str, timestamp: i64, lamports: u64, is_buy: bool) -> RawTradeEvent {
        RawTradeEvent {
            user: Some(trader.to_string()),
            mint: Some(mint.to_string()),
            timestamp: Some(timestamp),
            sol_amount: Some(lamports),
            is_buy: Some(is_buy),
            usd_market_cap: Some(timestamp as f64),
            name: Some(format!("{mint} token")),
            symbol: Some(mint.to_uppercase()),
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicates_do_not_reach_ledgers() {
        let now = Utc::now();
        let mut engine = Engine::new(PriceCache::new(), ViewConfig::default());

        assert!(engine.on_trade(raw("a", "m1", 1, 10, true), now).unwrap());
        assert!(!engine.on_trade(raw("b", "m1", 1, 10, false), now).unwrap());

        assert_eq!(engine.store().len(), 1);
        assert_eq!(engine.traders().len(), 1);
        assert_eq!(engine.traders().get("a").unwrap().total_trades, 1);
        assert_eq!(
            engine.stats(),
            IngestStats {
                accepted: 1,
                duplicates: 1,
                rejected: 0
            }
        );
    }

    #[test]
    fn test_rejected_trade_is_counted_not_stored() {
        let mut engine = Engine::new(PriceCache::new(), ViewConfig::default());
        let mut missing = raw("a", "m1", 1, 10, true);
        missing.user = None;

        engine.handle(Trigger::Trade(missing), Utc::now());

        assert!(engine.store().is_empty());
        assert_eq!(engine.stats().rejected, 1);
    }

    #[test]
    fn test_zero_price_produces_zero_usd() {
        let now = Utc::now();
        let mut engine = Engine::new(PriceCache::new(), ViewConfig::default());
        engine.on_trade(raw("a", "m1", 1, 5_000_000_000, true), now).unwrap();

        let snapshot = engine.snapshot(now);
        assert_eq!(snapshot.sol_price_usd, 0.0);
        assert_eq!(snapshot.tokens[0].total_volume_usd, 0.0);
        assert_eq!(snapshot.traders[0].buy_volume_usd, 0.0);
    }

    #[test]
    fn test_window_change_recomputes_tokens_not_ledgers() {
        let now = Utc::now();
        let mut engine = Engine::new(PriceCache::new(), ViewConfig::default());
        engine
            .on_trade(raw("a", "old", 1, 10, true), now - Duration::minutes(5))
            .unwrap();
        engine.on_trade(raw("a", "new", 2, 10, true), now).unwrap();

        // default window is one minute
        assert_eq!(engine.snapshot(now).tokens.len(), 1);

        engine.handle(
            Trigger::View(ViewChange::Window(WindowMinutes::new(10).unwrap())),
            now,
        );
        let snapshot = engine.snapshot(now);
        assert_eq!(snapshot.tokens.len(), 2);
        assert_eq!(snapshot.view.window.minutes(), 10);
        assert_eq!(snapshot.traders[0].total_trades, 2);
    }

    #[test]
    fn test_snapshot_ranks_and_limits() {
        let now = Utc::now();
        let mut engine = Engine::new(PriceCache::new(), ViewConfig::default());
        // market cap equals the timestamp in these fixtures
        engine.on_trade(raw("a", "m5", 5, 10, true), now).unwrap();
        engine.on_trade(raw("b", "m50", 50, 10, true), now).unwrap();
        engine.on_trade(raw("b", "m1", 1, 10, true), now).unwrap();

        engine.on_view_change(ViewChange::Limit(RowLimit::new(2).unwrap()));
        engine.on_view_change(ViewChange::TokenMetric(TokenMetric::MarketCap));
        engine.on_view_change(ViewChange::TraderMetric(TraderMetric::TotalTrades));

        let snapshot = engine.snapshot(now);
        let caps: Vec<_> = snapshot.tokens.iter().map(|t| t.market_cap_usd).collect();
        assert_eq!(caps, vec![50.0, 5.0]);
        assert_eq!(snapshot.traders[0].trader_id, "b");
        assert_eq!(snapshot.retained_trades, 3);
        assert_eq!(snapshot.traders_seen, 2);
    }

    #[tokio::test]
    async fn test_run_engine_publishes_after_every_trigger() {
        let engine = Engine::new(PriceCache::new(), ViewConfig::default());
        let (tx, rx) = mpsc::channel(8);
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());

        let handle = tokio::spawn(run_engine(engine, rx, snapshot_tx));
        tx.send(Trigger::Connection(ConnectionStatus::Connected))
            .await
            .unwrap();
        tx.send(Trigger::Trade(raw("a", "m1", 1, 10, true))).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let snapshot = snapshot_rx.borrow();
        assert_eq!(snapshot.connection, ConnectionStatus::Connected);
        assert_eq!(snapshot.tokens.len(), 1);
        assert_eq!(snapshot.traders_seen, 1);
    }
}
