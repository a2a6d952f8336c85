/// Spot price oracle with a stale-tolerant, lock-free cache.
///
/// The cache starts at 0, meaning "no price yet". While it is 0 every USD
/// figure computed by the engine is 0 as well; this is the expected state
/// between startup and the first successful refresh.

use crate::shared::engine::Trigger;
use crate::shared::error::PriceError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_PRICE_URL: &str = "https://price.jup.ag/v4/price?ids=SOL";
pub const DEFAULT_PRICE_ASSET: &str = "SOL";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_PRICE_TIMEOUT: Duration = Duration::from_secs(10);

/// Latest known spot price, shared between the oracle and its readers
#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    bits: Arc<AtomicU64>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last cached price, 0 if no refresh has succeeded yet
    pub fn current(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn has_price(&self) -> bool {
        self.current() > 0.0
    }

    fn store(&self, price: f64) {
        self.bits.store(price.to_bits(), Ordering::Release);
    }
}

/// Source of spot prices
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self) -> Result<f64, PriceError>;
}

/// HTTP JSON price endpoint: `{"data": {"<ASSET>": {"price": ..}}}`
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: reqwest::Client,
    url: String,
    asset: String,
}

impl HttpPriceSource {
    pub fn new(
        url: impl Into<String>,
        asset: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PriceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            asset: asset.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch(&self) -> Result<f64, PriceError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("application/json") {
            return Err(PriceError::ContentType(content_type));
        }

        let body: serde_json::Value = response.json().await?;
        parse_price(&body, &self.asset)
    }
}

/// Extract and validate `data.<asset>.price`, accepting numbers or numeric strings.
pub fn parse_price(body: &serde_json::Value, asset: &str) -> Result<f64, PriceError> {
    let value = body
        .get("data")
        .and_then(|data| data.get(asset))
        .and_then(|entry| entry.get("price"))
        .ok_or_else(|| PriceError::MissingPrice(asset.to_string()))?;

    let price = match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| PriceError::InvalidPrice(value.to_string()))?;

    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(PriceError::InvalidPrice(value.to_string()))
    }
}

/// Refreshes a `PriceCache` from a `PriceSource`
pub struct PriceOracle<S> {
    source: S,
    cache: PriceCache,
}

impl<S> PriceOracle<S>
where
    S: PriceSource,
{
    pub fn new(source: S) -> Self {
        Self::with_cache(source, PriceCache::new())
    }

    pub fn with_cache(source: S, cache: PriceCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> PriceCache {
        self.cache.clone()
    }

    /// Last cached price, never blocks
    pub fn current(&self) -> f64 {
        self.cache.current()
    }

    /// Fetch a fresh price. On failure the cached price is left untouched.
    pub async fn refresh(&self) -> Result<f64, PriceError> {
        match self.source.fetch().await {
            Ok(price) => {
                self.cache.store(price);
                info!(price, "fetched spot price");
                Ok(price)
            }
            Err(error) => {
                warn!(
                    %error,
                    last_good = self.cache.current(),
                    "failed to fetch spot price, keeping last good value"
                );
                Err(error)
            }
        }
    }

    /// Refresh on every `refresh_interval` and whenever a request arrives on
    /// `refresh_requests`. Successful refreshes are forwarded to the engine.
    pub async fn run(
        self,
        refresh_interval: Duration,
        mut refresh_requests: mpsc::Receiver<()>,
        triggers: mpsc::Sender<Trigger>,
    ) {
        let mut ticker = interval_at(Instant::now() + refresh_interval, refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut requests_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                request = refresh_requests.recv(), if requests_open => {
                    if request.is_none() {
                        debug!("price refresh requests closed");
                        requests_open = false;
                        continue;
                    }
                }
            }

            if let Ok(price) = self.refresh().await {
                if triggers.send(Trigger::PriceUpdated(price)).await.is_err() {
                    debug!("engine dropped, stopping price oracle");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Replays a scripted sequence of fetch results
    struct ScriptedSource {
        results: Mutex<Vec<Result<f64, PriceError>>>,
    }

    impl ScriptedSource {
        fn new(mut results: Vec<Result<f64, PriceError>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
            }
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        async fn fetch(&self) -> Result<f64, PriceError> {
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(PriceError::Timeout))
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_good_price() {
        let oracle = PriceOracle::new(ScriptedSource::new(vec![
            Ok(172.01),
            Err(PriceError::Status(500)),
            Err(PriceError::Timeout),
        ]));
        assert_eq!(oracle.current(), 0.0);

        assert_eq!(oracle.refresh().await.unwrap(), 172.01);
        assert!(oracle.refresh().await.is_err());
        assert!(oracle.refresh().await.is_err());

        assert_eq!(oracle.current(), 172.01);
        assert!(oracle.cache().has_price());
    }

    #[tokio::test]
    async fn test_first_refresh_failure_keeps_sentinel() {
        let oracle = PriceOracle::new(ScriptedSource::new(vec![Err(PriceError::Timeout)]));
        assert!(oracle.refresh().await.is_err());
        assert_eq!(oracle.current(), 0.0);
        assert!(!oracle.cache().has_price());
    }

    #[tokio::test]
    async fn test_run_forwards_requested_refresh() {
        let oracle = PriceOracle::new(ScriptedSource::new(vec![Ok(150.0)]));
        let (request_tx, request_rx) = mpsc::channel(1);
        let (trigger_tx, mut trigger_rx) = mpsc::channel(4);

        let handle = tokio::spawn(oracle.run(Duration::from_secs(3600), request_rx, trigger_tx));
        request_tx.send(()).await.unwrap();

        match trigger_rx.recv().await {
            Some(Trigger::PriceUpdated(price)) => assert_eq!(price, 150.0),
            other => panic!("unexpected trigger: {:?}", other),
        }
        handle.abort();
    }

    #[test]
    fn test_parse_price() {
        struct TestCase {
            input: serde_json::Value,
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: numeric price
                input: json!({ "data": { "SOL": { "id": "SOL", "price": 172.01 } } }),
                expected: Some(172.01),
            },
            TestCase {
                // TC1: string price
                input: json!({ "data": { "SOL": { "price": "171.5" } } }),
                expected: Some(171.5),
            },
            TestCase {
                // TC2: asset missing
                input: json!({ "data": {} }),
                expected: None,
            },
            TestCase {
                // TC3: non-positive price
                input: json!({ "data": { "SOL": { "price": 0 } } }),
                expected: None,
            },
            TestCase {
                // TC4: garbage
                input: json!({ "data": { "SOL": { "price": "n/a" } } }),
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_price(&test.input, "SOL").ok();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[tokio::test]
    async fn test_http_source_parses_json_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/price"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "SOL": { "price": 99.5 } } })),
            )
            .mount(&server)
            .await;

        let source = HttpPriceSource::new(
            format!("{}/price", server.uri()),
            "SOL",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(source.fetch().await.unwrap(), 99.5);
    }

    #[tokio::test]
    async fn test_http_source_rejects_error_status_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let down = HttpPriceSource::new(
            format!("{}/down", server.uri()),
            "SOL",
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(matches!(down.fetch().await, Err(PriceError::Status(503))));

        let html = HttpPriceSource::new(
            format!("{}/html", server.uri()),
            "SOL",
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(matches!(html.fetch().await, Err(PriceError::ContentType(_))));
    }

    #[tokio::test]
    async fn test_http_source_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "SOL": { "price": 1.0 } } }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let source =
            HttpPriceSource::new(server.uri(), "SOL", Duration::from_millis(100)).unwrap();
        assert!(matches!(source.fetch().await, Err(PriceError::Timeout)));
    }
}
