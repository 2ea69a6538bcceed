//! Trade execution and fill simulation.
//!
//! Orders fill immediately at the bar's close for a fixed quantity. Buys that
//! cannot be afforded, buys into an open position and sells with nothing to
//! sell are policy skips, not errors.

use tracing::debug;

use super::bar::Bar;
use super::error::TradesimError;
use super::portfolio::Portfolio;
use super::position::{TradeAction, TradeRecord};
use super::signal::{Signal, SignalMap};

pub const DEFAULT_FIXED_QUANTITY: u64 = 100;

/// Execution settings.
///
/// Every buy is for `fixed_quantity` units. This is a deliberate
/// simplification: there is no volatility- or equity-scaled sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub fixed_quantity: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            fixed_quantity: DEFAULT_FIXED_QUANTITY,
        }
    }
}

/// Why a signal did not produce a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientCash,
    PositionOpen,
    NoPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Filled(TradeRecord),
    Skipped(SkipReason),
    NoAction,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionSimulator {
    config: ExecutionConfig,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig) -> Result<Self, TradesimError> {
        if config.fixed_quantity == 0 {
            return Err(TradesimError::ConfigInvalid {
                section: "backtest".into(),
                key: "fixed_quantity".into(),
                reason: "fixed_quantity must be at least 1".into(),
            });
        }
        Ok(ExecutionSimulator { config })
    }

    /// Applies `signals` against `bar`, in ascending symbol order, and returns
    /// the trades that were executed.
    pub fn apply(
        &self,
        portfolio: &mut Portfolio,
        signals: &SignalMap,
        bar: &Bar,
    ) -> Result<Vec<TradeRecord>, TradesimError> {
        let mut fills = Vec::new();
        for (symbol, &signal) in signals {
            match self.execute(portfolio, symbol, signal, bar)? {
                ExecutionOutcome::Filled(record) => fills.push(record),
                ExecutionOutcome::Skipped(reason) => {
                    debug!(%symbol, %signal, ?reason, timestamp = %bar.timestamp, "signal skipped");
                }
                ExecutionOutcome::NoAction => {}
            }
        }
        Ok(fills)
    }

    /// Executes a single signal. Cash sufficiency is checked against the
    /// balance at the moment of the call.
    pub fn execute(
        &self,
        portfolio: &mut Portfolio,
        symbol: &str,
        signal: Signal,
        bar: &Bar,
    ) -> Result<ExecutionOutcome, TradesimError> {
        let (action, quantity) = match signal {
            Signal::Hold => return Ok(ExecutionOutcome::NoAction),
            Signal::Buy => {
                if portfolio.has_position(symbol) {
                    return Ok(ExecutionOutcome::Skipped(SkipReason::PositionOpen));
                }
                (TradeAction::Buy, self.config.fixed_quantity)
            }
            Signal::Sell => match portfolio.position(symbol) {
                Some(position) => (TradeAction::Sell, position.quantity),
                None => return Ok(ExecutionOutcome::Skipped(SkipReason::NoPosition)),
            },
        };

        let price = bar.require_close(symbol)?;
        if action == TradeAction::Buy && portfolio.cash() < quantity as f64 * price {
            return Ok(ExecutionOutcome::Skipped(SkipReason::InsufficientCash));
        }

        let record = TradeRecord {
            timestamp: bar.timestamp,
            symbol: symbol.to_string(),
            action,
            price,
            quantity,
        };
        portfolio.apply_trade(record.clone())?;
        debug!(%symbol, %action, price, quantity, timestamp = %bar.timestamp, "filled");
        Ok(ExecutionOutcome::Filled(record))
    }
}
