//! Configuration validation.
//!
//! Validates all config fields before anything is loaded or run. Each
//! validator reports the first problem it finds.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::adapters::registry as sources;
use crate::domain::bar::{Bound, parse_bound};
use crate::domain::data_loader::Backoff;
use crate::domain::error::TradesimError;
use crate::domain::risk::RiskLimits;
use crate::domain::strategy::{MovingAverageCrossover, registry as strategies};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_SOURCE: &str = "csv";

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_data_config(config)?;
    validate_risk_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_initial_capital(config)?;
    validate_dates(config)?;
    let symbols = read_symbols(config)?;
    validate_fixed_quantity(config)?;
    validate_source(config)?;
    validate_benchmark(config, &symbols)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let name = strategy_name(config);
    strategies::build(&name, config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    for key in ["max_retries", "retry_delay_ms", "min_request_interval_ms"] {
        if config.get_int("data", key, 0)? < 0 {
            return Err(invalid("data", key, &format!("{key} must be non-negative")));
        }
    }
    if let Some(backoff) = config.get_string("data", "backoff") {
        backoff
            .parse::<Backoff>()
            .map_err(|reason| invalid("data", "backoff", &reason))?;
    }
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if config.get_bool("risk", "enabled", false)? {
        RiskLimits::from_config(config)?;
    }
    Ok(())
}

pub fn strategy_name(config: &dyn ConfigPort) -> String {
    config
        .get_string("strategy", "name")
        .unwrap_or_else(|| MovingAverageCrossover::NAME.to_string())
}

pub fn source_name(config: &dyn ConfigPort) -> String {
    config
        .get_string("backtest", "source")
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string())
}

/// Splits a comma-separated symbol list, trimming and uppercasing each entry.
/// Empty entries and duplicates are rejected.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, TradesimError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(invalid("backtest", "symbols", "empty entry in symbol list"));
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(invalid(
                "backtest",
                "symbols",
                &format!("duplicate symbol: {symbol}"),
            ));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

pub fn read_symbols(config: &dyn ConfigPort) -> Result<Vec<String>, TradesimError> {
    let raw = config
        .get_string("backtest", "symbols")
        .ok_or_else(|| missing("backtest", "symbols"))?;
    parse_symbols(&raw)
}

/// Reads `[backtest] start_date` and `end_date` as an inclusive range.
pub fn read_range(config: &dyn ConfigPort) -> Result<(NaiveDateTime, NaiveDateTime), TradesimError> {
    let start = parse_date(config.get_string("backtest", "start_date"), "start_date", Bound::Start)?;
    let end = parse_date(config.get_string("backtest", "end_date"), "end_date", Bound::End)?;
    Ok((start, end))
}

fn parse_date(value: Option<String>, key: &str, bound: Bound) -> Result<NaiveDateTime, TradesimError> {
    let value = value.ok_or_else(|| missing("backtest", key))?;
    parse_bound(&value, bound).ok_or_else(|| {
        invalid(
            "backtest",
            key,
            &format!("invalid date '{value}' (expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)"),
        )
    })
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let (start, end) = read_range(config)?;
    if start > end {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

fn validate_fixed_quantity(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if config.get_int("backtest", "fixed_quantity", 100)? < 1 {
        return Err(invalid(
            "backtest",
            "fixed_quantity",
            "fixed_quantity must be at least 1",
        ));
    }
    Ok(())
}

fn validate_source(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let name = source_name(config);
    if !sources::names().any(|n| n == name) {
        return Err(TradesimError::UnknownSource(name));
    }
    Ok(())
}

fn validate_benchmark(config: &dyn ConfigPort, symbols: &[String]) -> Result<(), TradesimError> {
    if let Some(benchmark) = config.get_string("backtest", "benchmark") {
        let benchmark = benchmark.to_uppercase();
        if !symbols.contains(&benchmark) {
            return Err(invalid(
                "backtest",
                "benchmark",
                &format!("benchmark {benchmark} is not one of the configured symbols"),
            ));
        }
    }
    Ok(())
}

fn missing(section: &str, key: &str) -> TradesimError {
    TradesimError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> TradesimError {
    TradesimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
