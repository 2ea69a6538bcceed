//! Backtest engine and event loop.
//!
//! One pass over the bars of `[start, end]`: update the strategy, collect its
//! signals, let the risk gate rewrite them, execute, then revalue. Metrics are
//! computed once after the last bar.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::bar::{Bar, BarSeries, closes};
use super::error::TradesimError;
use super::execution::{ExecutionConfig, ExecutionSimulator};
use super::metrics::{Metrics, evaluate_by_symbol};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::TradeRecord;
use super::risk::RiskControl;
use super::strategy::Strategy;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    /// Symbol whose closes drive the headline metrics. Defaults to the first
    /// symbol, by name, seen in the filtered bars.
    pub benchmark: Option<String>,
}

impl BacktestConfig {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, initial_capital: f64) -> Self {
        BacktestConfig {
            start,
            end,
            initial_capital,
            execution: ExecutionConfig::default(),
            benchmark: None,
        }
    }

    pub fn validate(&self) -> Result<(), TradesimError> {
        if self.start > self.end {
            return Err(TradesimError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(TradesimError::ConfigInvalid {
                section: "backtest".into(),
                key: "initial_capital".into(),
                reason: "initial_capital must be positive".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub bars_processed: usize,
    pub portfolio: Portfolio,
    pub metrics: Metrics,
    pub benchmark: Option<String>,
    pub symbol_metrics: BTreeMap<String, Metrics>,
}

impl BacktestResult {
    pub fn trades(&self) -> &[TradeRecord] {
        self.portfolio.trades()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.portfolio.equity_curve()
    }

    pub fn final_value(&self) -> f64 {
        self.portfolio.value()
    }
}

/// Runs `strategy` over the bars of `series` that fall in
/// `[config.start, config.end]`.
///
/// The strategy is initialized here, once. Policy skips (unaffordable buys,
/// sells with nothing held) are not errors; a price missing where a trade or
/// revaluation needs it is.
pub fn run_backtest(
    strategy: &mut dyn Strategy,
    series: &BarSeries,
    config: &BacktestConfig,
    risk: Option<&dyn RiskControl>,
) -> Result<BacktestResult, TradesimError> {
    config.validate()?;
    let simulator = ExecutionSimulator::new(config.execution.clone())?;
    let bars = series.range(config.start, config.end);

    info!(
        strategy = strategy.name(),
        start = %config.start,
        end = %config.end,
        bars = bars.len(),
        initial_capital = config.initial_capital,
        "backtest starting"
    );

    let mut portfolio = Portfolio::new(config.initial_capital);
    strategy.initialize();

    for bar in bars {
        step(strategy, &simulator, risk, &mut portfolio, bar)?;
    }

    let benchmark = config
        .benchmark
        .clone()
        .or_else(|| bars.iter().flat_map(|b| b.symbols()).min().map(str::to_string));
    let prices = benchmark
        .as_deref()
        .map(|symbol| closes(bars, symbol))
        .unwrap_or_default();
    if let Some(symbol) = &benchmark {
        if prices.is_empty() && !bars.is_empty() {
            warn!(%symbol, "benchmark symbol has no prices in range");
        }
    }
    let metrics = Metrics::evaluate(&prices, portfolio.value(), config.initial_capital);
    let symbol_metrics = evaluate_by_symbol(bars, portfolio.value(), config.initial_capital);

    info!(
        trades = portfolio.trades().len(),
        final_value = portfolio.value(),
        total_return = metrics.total_return,
        "backtest finished"
    );

    Ok(BacktestResult {
        strategy: strategy.name().to_string(),
        start: config.start,
        end: config.end,
        bars_processed: bars.len(),
        portfolio,
        metrics,
        benchmark,
        symbol_metrics,
    })
}

fn step(
    strategy: &mut dyn Strategy,
    simulator: &ExecutionSimulator,
    risk: Option<&dyn RiskControl>,
    portfolio: &mut Portfolio,
    bar: &Bar,
) -> Result<(), TradesimError> {
    strategy.update(bar.timestamp, bar);
    let mut signals = strategy.generate_signals();
    if let Some(gate) = risk {
        signals = gate.apply(signals, portfolio);
    }
    for fill in simulator.apply(portfolio, &signals, bar)? {
        strategy.on_fill(&fill);
    }
    let value = portfolio.revalue(bar)?;
    debug!(timestamp = %bar.timestamp, value, cash = portfolio.cash(), "revalued");
    Ok(())
}
