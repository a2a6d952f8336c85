/// Wires feed, price oracle and engine together for the terminal binaries.

use crate::shared::config::FlowConfig;
use crate::shared::engine::{run_engine, Engine, FeedSnapshot, Trigger};
use crate::shared::error::PriceError;
use crate::shared::price::{HttpPriceSource, PriceCache, PriceOracle};
use crate::shared::ranking::ViewChange;
use crate::shared::websocket::{ConnectionStatus, WebSocketClient};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Handle held by a UI: latest snapshots out, view changes in
pub struct FlowHandle {
    pub snapshots: watch::Receiver<FeedSnapshot>,
    triggers: mpsc::Sender<Trigger>,
}

impl FlowHandle {
    /// Queue a view change; the engine recomputes without any network call.
    pub async fn change_view(&self, change: ViewChange) {
        if self.triggers.send(Trigger::View(change)).await.is_err() {
            debug!("engine stopped, dropping view change");
        }
    }
}

/// Spawn the feed client, price oracle and engine tasks.
pub fn spawn_flow(config: &FlowConfig) -> Result<FlowHandle, PriceError> {
    let price_cache = PriceCache::new();
    let source =
        HttpPriceSource::new(&config.price_url, &config.price_asset, config.price_timeout)?;
    let oracle = PriceOracle::with_cache(source, price_cache.clone());

    let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(config.feed.channel_buffer_size);
    let (refresh_tx, refresh_rx) = mpsc::channel::<()>(1);
    let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());

    let engine = Engine::new(price_cache, config.view);
    tokio::spawn(run_engine(engine, trigger_rx, snapshot_tx));

    tokio::spawn(oracle.run(config.price_refresh_interval, refresh_rx, trigger_tx.clone()));

    let (mut event_rx, mut status_rx) =
        WebSocketClient::with_config(config.feed.clone()).start();

    {
        let triggers = trigger_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if triggers.send(Trigger::Trade(event)).await.is_err() {
                    break;
                }
            }
        });
    }

    {
        let triggers = trigger_tx.clone();
        tokio::spawn(async move {
            while let Some(status) = status_rx.recv().await {
                if status == ConnectionStatus::Connected {
                    // a refresh already queued is as good as a new one
                    let _ = refresh_tx.try_send(());
                }
                if triggers.send(Trigger::Connection(status)).await.is_err() {
                    break;
                }
            }
        });
    }

    info!(
        feed = %config.feed.url,
        price = %config.price_url,
        "pump-flow pipeline started"
    );

    Ok(FlowHandle {
        snapshots: snapshot_rx,
        triggers: trigger_tx,
    })
}
