/// Runtime configuration from environment variables.
///
/// Every value has a default; invalid values are logged and replaced by the
/// default instead of aborting startup.

use crate::shared::price::{
    DEFAULT_PRICE_ASSET, DEFAULT_PRICE_TIMEOUT, DEFAULT_PRICE_URL, DEFAULT_REFRESH_INTERVAL,
};
use crate::shared::ranking::{RowLimit, TokenMetric, TraderMetric, ViewConfig, WindowMinutes};
use crate::shared::websocket::{WebSocketConfig, DEFAULT_FEED_URL};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_LOG_FILE: &str = "pump-flow.log";

/// Log file path from `PUMP_FLOW_LOG`, read before logging is installed
pub fn log_file_from_env() -> PathBuf {
    log_file_from_vars(std::env::vars())
}

/// Log file path from key/value pairs
pub fn log_file_from_vars<I>(vars: I) -> PathBuf
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .find(|(key, _)| key == "PUMP_FLOW_LOG")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub feed: WebSocketConfig,
    pub price_url: String,
    pub price_asset: String,
    pub price_refresh_interval: Duration,
    pub price_timeout: Duration,
    pub view: ViewConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            feed: WebSocketConfig::new(DEFAULT_FEED_URL),
            price_url: DEFAULT_PRICE_URL.to_string(),
            price_asset: DEFAULT_PRICE_ASSET.to_string(),
            price_refresh_interval: DEFAULT_REFRESH_INTERVAL,
            price_timeout: DEFAULT_PRICE_TIMEOUT,
            view: ViewConfig::default(),
        }
    }
}

impl FlowConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from key/value pairs
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let defaults = Self::default();

        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let feed_url = get("WS_URL")
            .map(str::to_string)
            .unwrap_or(defaults.feed.url);

        let window = parse_or(get("WINDOW_MINUTES"), "WINDOW_MINUTES", defaults.view.window, |v| {
            v.parse::<u32>()
                .map_err(|e| e.to_string())
                .and_then(|m| WindowMinutes::new(m).map_err(|e| e.to_string()))
        });
        let limit = parse_or(get("ROW_LIMIT"), "ROW_LIMIT", defaults.view.limit, |v| {
            v.parse::<usize>()
                .map_err(|e| e.to_string())
                .and_then(|n| RowLimit::new(n).map_err(|e| e.to_string()))
        });
        let token_metric =
            parse_or(get("TOKEN_SORT"), "TOKEN_SORT", defaults.view.token_metric, |v| {
                TokenMetric::from_str(v).map_err(|e| e.to_string())
            });
        let trader_metric =
            parse_or(get("TRADER_SORT"), "TRADER_SORT", defaults.view.trader_metric, |v| {
                TraderMetric::from_str(v).map_err(|e| e.to_string())
            });

        Self {
            feed: WebSocketConfig::new(feed_url),
            price_url: get("PRICE_URL")
                .map(str::to_string)
                .unwrap_or(defaults.price_url),
            price_asset: get("PRICE_ASSET")
                .map(str::to_uppercase)
                .unwrap_or(defaults.price_asset),
            price_refresh_interval: parse_secs(
                get("PRICE_REFRESH_SECS"),
                "PRICE_REFRESH_SECS",
                defaults.price_refresh_interval,
            ),
            price_timeout: parse_secs(
                get("PRICE_TIMEOUT_SECS"),
                "PRICE_TIMEOUT_SECS",
                defaults.price_timeout,
            ),
            view: ViewConfig {
                window,
                limit,
                token_metric,
                trader_metric,
            },
        }
    }
}

fn parse_or<T, F>(value: Option<&str>, key: &str, default: T, parse: F) -> T
where
    F: FnOnce(&str) -> Result<T, String>,
{
    match value {
        None => default,
        Some(raw) => parse(raw).unwrap_or_else(|error| {
            warn!(key, value = raw, %error, "invalid configuration value, using default");
            default
        }),
    }
}

fn parse_secs(value: Option<&str>, key: &str, default: Duration) -> Duration {
    parse_or(value, key, default, |v| match v.parse::<u64>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = FlowConfig::from_vars(Vec::new());

        assert_eq!(config.feed.url, DEFAULT_FEED_URL);
        assert_eq!(config.price_url, DEFAULT_PRICE_URL);
        assert_eq!(config.price_asset, "SOL");
        assert_eq!(config.price_refresh_interval, Duration::from_secs(60));
        assert_eq!(config.price_timeout, Duration::from_secs(10));
        assert_eq!(config.view, ViewConfig::default());
        assert_eq!(config.view.limit.get(), 12);
    }

    #[test]
    fn test_overrides() {
        let config = FlowConfig::from_vars(vars(&[
            ("WS_URL", "ws://127.0.0.1:3000"),
            ("PRICE_ASSET", "sol"),
            ("PRICE_REFRESH_SECS", "15"),
            ("WINDOW_MINUTES", "30"),
            ("ROW_LIMIT", "5"),
            ("TOKEN_SORT", "totalVolume"),
            ("TRADER_SORT", "realized_profit"),
        ]));

        assert_eq!(config.feed.url, "ws://127.0.0.1:3000");
        assert_eq!(config.price_asset, "SOL");
        assert_eq!(config.price_refresh_interval, Duration::from_secs(15));
        assert_eq!(config.view.window.minutes(), 30);
        assert_eq!(config.view.limit.get(), 5);
        assert_eq!(config.view.token_metric, TokenMetric::TotalVolume);
        assert_eq!(config.view.trader_metric, TraderMetric::RealizedProfit);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = FlowConfig::from_vars(vars(&[
            ("WINDOW_MINUTES", "11"),
            ("ROW_LIMIT", "99"),
            ("TOKEN_SORT", "hype"),
            ("PRICE_TIMEOUT_SECS", "0"),
            ("WS_URL", "   "),
        ]));

        assert_eq!(config.view, ViewConfig::default());
        assert_eq!(config.price_timeout, Duration::from_secs(10));
        assert_eq!(config.feed.url, DEFAULT_FEED_URL);
    }

    #[test]
    fn test_log_file_path() {
        assert_eq!(log_file_from_vars(Vec::new()), PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(
            log_file_from_vars(vars(&[("PUMP_FLOW_LOG", " /tmp/flow.log ")])),
            PathBuf::from("/tmp/flow.log")
        );
        assert_eq!(
            log_file_from_vars(vars(&[("PUMP_FLOW_LOG", "  ")])),
            PathBuf::from("pump-flow.log")
        );
    }
}
