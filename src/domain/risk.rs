//! Risk gate applied between signal generation and execution.

use tracing::warn;

use super::error::TradesimError;
use super::metrics::{mean, period_returns};
use super::portfolio::Portfolio;
use super::signal::{Signal, SignalMap};
use crate::ports::config_port::ConfigPort;

/// Rewrites a bar's signals given the current ledger. Called once per bar,
/// after the strategy and before execution.
pub trait RiskControl {
    fn apply(&self, signals: SignalMap, portfolio: &Portfolio) -> SignalMap;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    /// Largest tolerated decline from the equity peak, as a positive fraction.
    pub max_drawdown: f64,
    /// Largest tolerated standard deviation of equity period returns.
    pub volatility_target: f64,
    /// Equity points required before volatility is measured.
    pub min_observations: usize,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            max_drawdown: 0.2,
            volatility_target: 0.15,
            min_observations: 20,
        }
    }
}

impl RiskLimits {
    /// Reads the `[risk]` section, falling back to defaults per absent key.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradesimError> {
        let defaults = RiskLimits::default();
        let max_drawdown = config.get_double("risk", "max_drawdown", defaults.max_drawdown)?;
        if !(max_drawdown > 0.0 && max_drawdown <= 1.0) {
            return Err(invalid("max_drawdown", "max_drawdown must be in (0, 1]"));
        }
        let volatility_target =
            config.get_double("risk", "volatility_target", defaults.volatility_target)?;
        if !(volatility_target > 0.0) {
            return Err(invalid(
                "volatility_target",
                "volatility_target must be positive",
            ));
        }
        let min_observations = config.get_int(
            "risk",
            "min_observations",
            defaults.min_observations as i64,
        )?;
        if min_observations < 2 {
            return Err(invalid(
                "min_observations",
                "min_observations must be at least 2",
            ));
        }
        Ok(RiskLimits {
            max_drawdown,
            volatility_target,
            min_observations: min_observations as usize,
        })
    }
}

fn invalid(key: &str, reason: &str) -> TradesimError {
    TradesimError::ConfigInvalid {
        section: "risk".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Risk figures measured from a portfolio's equity curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSnapshot {
    /// Current decline from the equity peak, as a non-negative fraction.
    pub drawdown: f64,
    /// Population standard deviation of equity returns, if measurable yet.
    pub volatility: Option<f64>,
}

/// Liquidates every open position once drawdown or volatility exceeds its
/// limit. Otherwise signals pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct DrawdownVolatilityGate {
    limits: RiskLimits,
}

impl DrawdownVolatilityGate {
    pub fn new(limits: RiskLimits) -> Self {
        DrawdownVolatilityGate { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn assess(&self, portfolio: &Portfolio) -> RiskSnapshot {
        let values: Vec<f64> = portfolio.equity_curve().iter().map(|p| p.value).collect();
        let drawdown = match values.last() {
            Some(&current) => {
                let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if peak > 0.0 { (peak - current) / peak } else { 0.0 }
            }
            None => 0.0,
        };
        let volatility = if values.len() >= self.limits.min_observations {
            Some(population_stddev(&period_returns(&values)))
        } else {
            None
        };
        RiskSnapshot {
            drawdown,
            volatility,
        }
    }

    pub fn within_limits(&self, snapshot: &RiskSnapshot) -> bool {
        snapshot.drawdown <= self.limits.max_drawdown
            && snapshot
                .volatility
                .is_none_or(|v| v <= self.limits.volatility_target)
    }
}

fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

impl RiskControl for DrawdownVolatilityGate {
    fn apply(&self, signals: SignalMap, portfolio: &Portfolio) -> SignalMap {
        let snapshot = self.assess(portfolio);
        if self.within_limits(&snapshot) {
            return signals;
        }
        warn!(
            drawdown = snapshot.drawdown,
            volatility = ?snapshot.volatility,
            positions = portfolio.position_count(),
            "risk limit breached, liquidating"
        );
        portfolio
            .positions()
            .keys()
            .map(|symbol| (symbol.clone(), Signal::Sell))
            .collect()
    }
}
