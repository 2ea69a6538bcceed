//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum TradesimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown data source: {0}")]
    UnknownSource(String),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("bars out of order: {timestamp} does not follow {previous}")]
    UnorderedBars {
        previous: NaiveDateTime,
        timestamp: NaiveDateTime,
    },

    #[error("no price for {symbol} at {timestamp}")]
    MissingPrice {
        symbol: String,
        timestamp: NaiveDateTime,
    },

    #[error("no data for {symbol} from {source_name}")]
    NoData { symbol: String, source_name: String },

    #[error("ledger violation for {symbol} at {timestamp}: {reason}")]
    LedgerViolation {
        symbol: String,
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("transient failure from {source_name}: {reason}")]
    Transient { source_name: String, reason: String },

    #[error("{source_name} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        source_name: String,
        attempts: u32,
        last: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradesimError {
    /// Whether a data source may succeed if the same request is repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TradesimError::Transient { .. })
    }
}

impl From<&TradesimError> for std::process::ExitCode {
    fn from(err: &TradesimError) -> Self {
        let code: u8 = match err {
            TradesimError::Io(_) | TradesimError::Cache { .. } => 1,
            TradesimError::ConfigParse { .. }
            | TradesimError::ConfigMissing { .. }
            | TradesimError::ConfigInvalid { .. }
            | TradesimError::InvalidRange { .. }
            | TradesimError::Validation { .. } => 2,
            TradesimError::UnknownSource(_)
            | TradesimError::Transient { .. }
            | TradesimError::RetriesExhausted { .. }
            | TradesimError::Data { .. }
            | TradesimError::UnorderedBars { .. } => 3,
            TradesimError::UnknownStrategy(_) => 4,
            TradesimError::MissingPrice { .. } | TradesimError::NoData { .. } => 5,
            TradesimError::LedgerViolation { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
