/// Sliding-window trade store.
///
/// Retains trades for a fixed horizon measured against their local arrival
/// time, deduplicated by natural key. Display windows are read-only filters
/// over the retained set and are independent of the retention horizon.

use crate::shared::types::{NaturalKey, RetainedTrade};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Fixed retention horizon (60 minutes)
pub fn retention_horizon() -> Duration {
    Duration::minutes(60)
}

/// Result of `TradeStore::add`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub accepted: bool,
    pub evicted: usize,
}

#[derive(Debug, Clone)]
pub struct TradeStore {
    horizon: Duration,
    /// Arrival order
    trades: VecDeque<RetainedTrade>,
    keys: HashSet<NaturalKey>,
}

impl Default for TradeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeStore {
    pub fn new() -> Self {
        Self::with_horizon(retention_horizon())
    }

    pub fn with_horizon(horizon: Duration) -> Self {
        Self {
            horizon,
            trades: VecDeque::new(),
            keys: HashSet::new(),
        }
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Append a trade unless its natural key is already retained, then evict
    /// everything older than the retention horizon.
    pub fn add(&mut self, trade: RetainedTrade, now: DateTime<Utc>) -> AddOutcome {
        let key = trade.natural_key();
        let accepted = if self.keys.contains(&key) {
            debug!(
                mint = %key.token_id,
                timestamp = key.timestamp,
                lamports = key.lamports,
                "duplicate trade, not adding"
            );
            false
        } else {
            self.keys.insert(key);
            self.trades.push_back(trade);
            true
        };

        let evicted = self.evict_older_than(self.horizon, now);
        AddOutcome { accepted, evicted }
    }

    /// Drop trades with `now - received_at > horizon`. Returns the number dropped.
    ///
    /// Arrival times are not assumed to be monotonic.
    pub fn evict_older_than(&mut self, horizon: Duration, now: DateTime<Utc>) -> usize {
        let before = self.trades.len();
        let keys = &mut self.keys;
        self.trades.retain(|trade| {
            let keep = now - trade.received_at <= horizon;
            if !keep {
                keys.remove(&trade.natural_key());
            }
            keep
        });
        before - self.trades.len()
    }

    /// Retained trades with `now - received_at <= window`, in arrival order.
    pub fn within_window(
        &self,
        window: Duration,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &RetainedTrade> + '_ {
        self.trades
            .iter()
            .filter(move |trade| now - trade.received_at <= window)
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetainedTrade> + '_ {
        self.trades.iter()
    }
}
