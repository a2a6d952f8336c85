/// WebSocket client for the Socket.IO trade feed
///
/// Provides automatic reconnection, Engine.IO heartbeat replies, a read
/// timeout for silently dead connections, and event parsing
use crate::shared::ingest::decode_payload;
use crate::shared::socketio::{Packet, CONNECT_DEFAULT_NAMESPACE, ENGINE_PONG};
use crate::shared::types::RawTradeEvent;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_FEED_URL: &str = "wss://client-api-2-74b1891ee9f9.herokuapp.com";
pub const TRADE_EVENT: &str = "tradeCreated";

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Feed URL; the Socket.IO path and query are added when missing
    pub url: String,
    /// Socket.IO event carrying trades
    pub event_name: String,
    /// Reconnection delay after disconnect
    pub reconnect_delay: Duration,
    /// Reconnect when nothing (not even a heartbeat) arrives for this long
    pub read_timeout: Duration,
    /// Maximum channel buffer size for events
    pub channel_buffer_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            event_name: TRADE_EVENT.to_string(),
            reconnect_delay: Duration::from_secs(2),
            read_timeout: Duration::from_secs(120),
            channel_buffer_size: 1000,
        }
    }
}

impl WebSocketConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the subscribed event name
    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = event_name.into();
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Build the Engine.IO v4 WebSocket transport URL for a Socket.IO endpoint.
pub fn socket_io_url(base: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;

    match url.scheme() {
        "https" => {
            let _ = url.set_scheme("wss");
        }
        "http" => {
            let _ = url.set_scheme("ws");
        }
        _ => {}
    }

    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/socket.io/");
    }

    let has_eio = url.query_pairs().any(|(key, _)| key == "EIO");
    if !has_eio {
        url.query_pairs_mut()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
    }

    Ok(url)
}

/// WebSocket client for trade events
pub struct WebSocketClient {
    config: WebSocketConfig,
    event_tx: mpsc::Sender<RawTradeEvent>,
    event_rx: mpsc::Receiver<RawTradeEvent>,
    status_tx: mpsc::Sender<ConnectionStatus>,
    status_rx: mpsc::Receiver<ConnectionStatus>,
}

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "CONNECTED",
            ConnectionStatus::Disconnected => "DISCONNECTED",
            ConnectionStatus::Reconnecting => "RECONNECTING",
        }
    }
}

impl WebSocketClient {
    /// Create a new WebSocket client with default configuration
    pub fn new() -> Self {
        Self::with_config(WebSocketConfig::default())
    }

    /// Create a new WebSocket client with custom configuration
    pub fn with_config(config: WebSocketConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size);
        let (status_tx, status_rx) = mpsc::channel(10);

        Self {
            config,
            event_tx,
            event_rx,
            status_tx,
            status_rx,
        }
    }

    /// Start the WebSocket client connection
    ///
    /// Returns a receiver for trade events and a receiver for connection status updates
    pub fn start(
        self,
    ) -> (
        mpsc::Receiver<RawTradeEvent>,
        mpsc::Receiver<ConnectionStatus>,
    ) {
        let config = self.config.clone();
        let event_tx = self.event_tx.clone();
        let status_tx = self.status_tx.clone();

        tokio::spawn(async move {
            run_websocket_loop(config, event_tx, status_tx).await;
        });

        (self.event_rx, self.status_rx)
    }
}

impl Default for WebSocketClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a single connection ended
enum SessionEnd {
    /// Connection dropped, try again
    Reconnect,
    /// Nobody is listening anymore
    Stop,
}

/// Main WebSocket connection loop with auto-reconnect
async fn run_websocket_loop(
    config: WebSocketConfig,
    event_tx: mpsc::Sender<RawTradeEvent>,
    status_tx: mpsc::Sender<ConnectionStatus>,
) {
    let url = match socket_io_url(&config.url) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid feed URL {}: {}", config.url, e);
            let _ = status_tx.send(ConnectionStatus::Disconnected).await;
            return;
        }
    };

    info!("Starting WebSocket client for {}", url);

    loop {
        // Notify about reconnection attempt
        let _ = status_tx.send(ConnectionStatus::Reconnecting).await;

        match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!("Connected to WebSocket server at {}", url);

                let end = run_session(ws_stream, &config, &event_tx, &status_tx).await;

                // Notify disconnection
                let _ = status_tx.send(ConnectionStatus::Disconnected).await;

                if let SessionEnd::Stop = end {
                    info!("Event receiver dropped, stopping client");
                    return;
                }
                warn!("Connection closed, will reconnect...");
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", url, e);
                let _ = status_tx.send(ConnectionStatus::Disconnected).await;
            }
        }

        // Wait before reconnecting
        debug!(
            "Waiting {:?} before reconnecting...",
            config.reconnect_delay
        );
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn run_session<S>(
    ws_stream: S,
    config: &WebSocketConfig,
    event_tx: &mpsc::Sender<RawTradeEvent>,
    status_tx: &mpsc::Sender<ConnectionStatus>,
) -> SessionEnd
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message>
        + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    loop {
        let msg = match tokio::time::timeout(config.read_timeout, read.next()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                info!("Server closed stream");
                return SessionEnd::Reconnect;
            }
            Err(_) => {
                warn!(
                    timeout_secs = config.read_timeout.as_secs(),
                    "WebSocket read timeout - no data received, triggering reconnection"
                );
                return SessionEnd::Reconnect;
            }
        };

        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                info!("Server closed connection");
                return SessionEnd::Reconnect;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Heartbeat messages - tungstenite handles these automatically
                continue;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                return SessionEnd::Reconnect;
            }
            _ => continue,
        };

        let packet = match Packet::decode(text.as_str()) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Failed to decode frame: {} - {}", e, truncate(text.as_str()));
                continue;
            }
        };

        match packet {
            Packet::Open(handshake) => {
                debug!("Engine.IO handshake: {}", handshake);
                if write
                    .send(Message::Text(CONNECT_DEFAULT_NAMESPACE.into()))
                    .await
                    .is_err()
                {
                    error!("Failed to send namespace connect");
                    return SessionEnd::Reconnect;
                }
            }
            Packet::Ping => {
                if write.send(Message::Text(ENGINE_PONG.into())).await.is_err() {
                    debug!("Failed to send pong, connection likely dead");
                    return SessionEnd::Reconnect;
                }
            }
            Packet::Connected { namespace } => {
                info!("Joined namespace {}", namespace);
                let _ = status_tx.send(ConnectionStatus::Connected).await;
            }
            Packet::ConnectError { namespace, message } => {
                error!("Namespace {} refused connection: {}", namespace, message);
                return SessionEnd::Reconnect;
            }
            Packet::Disconnected { namespace } => {
                warn!("Server disconnected namespace {}", namespace);
                return SessionEnd::Reconnect;
            }
            Packet::Close => {
                info!("Engine.IO close received");
                return SessionEnd::Reconnect;
            }
            Packet::Event { .. } => {
                let Some(payload) = packet.event_payload(&config.event_name) else {
                    continue;
                };

                match decode_payload(payload.clone()) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            return SessionEnd::Stop;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse {} payload: {}", config.event_name, e);
                        debug!("Raw message: {}", truncate(text.as_str()));
                    }
                }
            }
            Packet::Pong | Packet::Noop => {}
        }
    }
}

fn truncate(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(200)
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    &text[..end]
}
