use thiserror::Error;

/// Reasons an inbound trade payload is rejected at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("trade payload missing required field: {0}")]
    MissingField(&'static str),

    #[error("trade payload could not be decoded: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for IngestError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}

/// Errors generated while refreshing the spot price.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price request timed out")]
    Timeout,

    #[error("price request failed: {0}")]
    Transport(String),

    #[error("price endpoint returned HTTP {0}")]
    Status(u16),

    #[error("price endpoint returned unexpected content type: {0}")]
    ContentType(String),

    #[error("price response has no price for asset {0}")]
    MissingPrice(String),

    #[error("price response contains invalid price: {0}")]
    InvalidPrice(String),
}

impl From<reqwest::Error> for PriceError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Errors decoding Socket.IO / Engine.IO text frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("unknown engine.io packet type: {0}")]
    UnknownEnginePacket(char),

    #[error("unknown socket.io packet type: {0}")]
    UnknownSocketPacket(char),

    #[error("invalid event payload: {0}")]
    InvalidEvent(String),
}

/// Invalid view or runtime configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported window size: {0} minutes")]
    UnsupportedWindow(u32),

    #[error("row limit {0} outside 1..=20")]
    RowLimit(usize),

    #[error("unknown sort metric: {0}")]
    UnknownMetric(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_from_serde() {
        let error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let ingest = IngestError::from(error);
        assert!(matches!(ingest, IngestError::Malformed(_)));
    }

    #[test]
    fn test_error_display() {
        struct TestCase {
            input: String,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: missing identity field
                input: IngestError::MissingField("user").to_string(),
                expected: "trade payload missing required field: user",
            },
            TestCase {
                // TC1: HTTP status
                input: PriceError::Status(503).to_string(),
                expected: "price endpoint returned HTTP 503",
            },
            TestCase {
                // TC2: unsupported window
                input: ConfigError::UnsupportedWindow(11).to_string(),
                expected: "unsupported window size: 11 minutes",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input, test.expected, "TC{} failed", index);
        }
    }
}
