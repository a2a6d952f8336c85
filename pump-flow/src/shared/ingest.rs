/// Ingestion boundary: raw `tradeCreated` payloads -> validated `RetainedTrade`.

use crate::shared::error::IngestError;
use crate::shared::types::{RawTradeEvent, RetainedTrade, Side, TokenInfo, TradeEvent};
use chrono::{DateTime, Utc};

/// Decode a JSON payload into a `RawTradeEvent`.
pub fn decode_payload(payload: serde_json::Value) -> Result<RawTradeEvent, IngestError> {
    Ok(serde_json::from_value(payload)?)
}

/// Validate a raw payload and stamp it with its arrival time.
///
/// `spot_usd` is the latest cached price; 0 before the first successful
/// refresh, in which case every USD figure of the trade is 0.
pub fn ingest(
    raw: RawTradeEvent,
    spot_usd: f64,
    now: DateTime<Utc>,
) -> Result<RetainedTrade, IngestError> {
    let event = validate(raw)?;
    let sol_amount = event.sol_amount();

    Ok(RetainedTrade {
        usd_value: sol_amount * spot_usd,
        unit_price_usd: spot_usd,
        sol_amount,
        received_at: now,
        event,
    })
}

fn validate(raw: RawTradeEvent) -> Result<TradeEvent, IngestError> {
    let trader_id = required_id(raw.user, "user")?;
    let token_id = required_id(raw.mint, "mint")?;
    let timestamp = raw.timestamp.ok_or(IngestError::MissingField("timestamp"))?;
    let lamports = raw.sol_amount.ok_or(IngestError::MissingField("sol_amount"))?;
    let is_buy = raw.is_buy.ok_or(IngestError::MissingField("is_buy"))?;

    Ok(TradeEvent {
        trader_id,
        token_id,
        timestamp,
        lamports,
        side: Side::from_is_buy(is_buy),
        market_cap_usd: raw
            .usd_market_cap
            .filter(|cap| cap.is_finite())
            .unwrap_or(0.0),
        token: TokenInfo {
            name: raw.name.unwrap_or_default(),
            symbol: raw.symbol.unwrap_or_default(),
            image_uri: raw.image_uri.filter(|uri| !uri.is_empty()),
        },
        token_amount: raw.token_amount,
        signature: raw.signature,
    })
}

fn required_id(value: Option<String>, field: &'static str) -> Result<String, IngestError> {
    match value {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(IngestError::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_trade() -> RawTradeEvent {
        RawTradeEvent {
            user: Some("trader1".to_string()),
            mint: Some("mint1".to_string()),
            timestamp: Some(1_700_000_000),
            sol_amount: Some(2_500_000_000),
            is_buy: Some(true),
            usd_market_cap: Some(42_000.0),
            name: Some("Token".to_string()),
            symbol: Some("TKN".to_string()),
            image_uri: Some(String::new()),
            token_amount: Some(1_000_000),
            signature: None,
        }
    }

    #[test]
    fn test_ingest_converts_lamports_and_usd() {
        let now = Utc::now();
        let trade = ingest(raw_trade(), 100.0, now).unwrap();

        assert_eq!(trade.sol_amount, 2.5);
        assert_eq!(trade.usd_value, 250.0);
        assert_eq!(trade.unit_price_usd, 100.0);
        assert_eq!(trade.received_at, now);
        assert_eq!(trade.event.side, Side::Buy);
        assert_eq!(trade.event.market_cap_usd, 42_000.0);
        assert!(trade.event.token.image_uri.is_none());
    }

    #[test]
    fn test_ingest_zero_price_yields_zero_usd() {
        let trade = ingest(raw_trade(), 0.0, Utc::now()).unwrap();
        assert_eq!(trade.usd_value, 0.0);
        assert_eq!(trade.sol_amount, 2.5);
    }

    #[test]
    fn test_ingest_rejects_missing_fields() {
        struct TestCase {
            input: RawTradeEvent,
            expected: IngestError,
        }

        let tests = vec![
            TestCase {
                // TC0: no trader
                input: RawTradeEvent {
                    user: None,
                    ..raw_trade()
                },
                expected: IngestError::MissingField("user"),
            },
            TestCase {
                // TC1: blank mint
                input: RawTradeEvent {
                    mint: Some("  ".to_string()),
                    ..raw_trade()
                },
                expected: IngestError::MissingField("mint"),
            },
            TestCase {
                // TC2: no amount
                input: RawTradeEvent {
                    sol_amount: None,
                    ..raw_trade()
                },
                expected: IngestError::MissingField("sol_amount"),
            },
            TestCase {
                // TC3: no side
                input: RawTradeEvent {
                    is_buy: None,
                    ..raw_trade()
                },
                expected: IngestError::MissingField("is_buy"),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = ingest(test.input, 1.0, Utc::now()).unwrap_err();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_decode_payload() {
        let raw = decode_payload(json!({
            "user": "trader1",
            "mint": "mint1",
            "timestamp": 1,
            "sol_amount": 10,
            "is_buy": false,
            "extra_field": "ignored"
        }))
        .unwrap();
        assert_eq!(raw.is_buy, Some(false));

        let error = decode_payload(json!({ "sol_amount": "not a number" })).unwrap_err();
        assert!(matches!(error, IngestError::Malformed(_)));
    }
}
