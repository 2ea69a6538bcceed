//! Portfolio ledger: cash, open positions, trade history and equity tracking.
//!
//! `apply_trade` is the only way cash, positions or history change. It refuses
//! any record that would leave the ledger inconsistent, so `cash >= 0` and
//! "one position per symbol" hold no matter who calls it.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::bar::Bar;
use super::error::TradesimError;
use super::position::{Position, TradeAction, TradeRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    cash: f64,
    initial_capital: f64,
    value: f64,
    positions: BTreeMap<String, Position>,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            value: initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Mark-to-market value as of the last revaluation.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn apply_trade(&mut self, record: TradeRecord) -> Result<(), TradesimError> {
        let violation = |reason: String| TradesimError::LedgerViolation {
            symbol: record.symbol.clone(),
            timestamp: record.timestamp,
            reason,
        };

        if record.quantity == 0 {
            return Err(violation("quantity must be positive".into()));
        }
        if !(record.price.is_finite() && record.price > 0.0) {
            return Err(violation(format!("invalid price {}", record.price)));
        }
        if let Some(last) = self.trades.last() {
            if record.timestamp < last.timestamp {
                return Err(violation(format!(
                    "trade precedes last recorded trade at {}",
                    last.timestamp
                )));
            }
        }

        let notional = record.notional();
        match record.action {
            TradeAction::Buy => {
                if self.positions.contains_key(&record.symbol) {
                    return Err(violation("position already open".into()));
                }
                if notional > self.cash {
                    return Err(violation(format!(
                        "cost {notional:.2} exceeds cash {:.2}",
                        self.cash
                    )));
                }
                self.cash -= notional;
                self.positions.insert(
                    record.symbol.clone(),
                    Position {
                        symbol: record.symbol.clone(),
                        quantity: record.quantity,
                        entry_price: record.price,
                        entry_time: record.timestamp,
                    },
                );
            }
            TradeAction::Sell => {
                let held = match self.positions.get(&record.symbol) {
                    Some(pos) => pos.quantity,
                    None => return Err(violation("no open position".into())),
                };
                if held != record.quantity {
                    return Err(violation(format!(
                        "sell quantity {} does not match position quantity {held}",
                        record.quantity
                    )));
                }
                self.positions.remove(&record.symbol);
                self.cash += notional;
            }
        }

        self.trades.push(record);
        Ok(())
    }

    /// Recomputes `value = cash + Σ quantity × close` against `bar` and records
    /// an equity point. Every open position must be priced by the bar.
    pub fn revalue(&mut self, bar: &Bar) -> Result<f64, TradesimError> {
        let mut value = self.cash;
        for pos in self.positions.values() {
            value += pos.market_value(bar.require_close(&pos.symbol)?);
        }
        self.value = value;
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            value,
        });
        Ok(value)
    }
}
