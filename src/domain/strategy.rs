//! Pluggable strategies.
//!
//! A strategy sees one bar at a time and answers with a [`SignalMap`] for the
//! bar it was last updated with. Strategies are built by name through
//! [`registry`] so the engine never names a concrete type.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::debug;

use super::bar::Bar;
use super::error::TradesimError;
use super::indicator::{MaType, MovingAverage};
use super::position::TradeRecord;
use super::signal::{Signal, SignalMap};
use crate::ports::config_port::ConfigPort;

pub trait Strategy {
    /// Registry name of the strategy.
    fn name(&self) -> &str;

    /// Called once before the first bar of a run.
    fn initialize(&mut self);

    /// Called exactly once per bar, in timestamp order.
    fn update(&mut self, timestamp: NaiveDateTime, bar: &Bar);

    /// Decision for the bar most recently passed to [`Strategy::update`].
    fn generate_signals(&self) -> SignalMap;

    /// Fill notification for a trade executed on the current bar.
    fn on_fill(&mut self, _record: &TradeRecord) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub ma_type: MaType,
}

impl CrossoverParams {
    pub fn validate(&self) -> Result<(), TradesimError> {
        if self.fast_period < 1 {
            return Err(invalid("fast_ma_period", "fast_ma_period must be at least 1"));
        }
        if self.fast_period >= self.slow_period {
            return Err(invalid(
                "slow_ma_period",
                "fast_ma_period must be less than slow_ma_period",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> TradesimError {
    TradesimError::ConfigInvalid {
        section: "strategy".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone)]
struct SymbolState {
    fast: MovingAverage,
    slow: MovingAverage,
    observations: usize,
    /// Fast and slow means of the previous observation, once defined.
    previous: Option<(f64, f64)>,
    current: Option<(f64, f64)>,
}

impl SymbolState {
    fn new(params: &CrossoverParams) -> Self {
        SymbolState {
            fast: MovingAverage::new(params.ma_type, params.fast_period),
            slow: MovingAverage::new(params.ma_type, params.slow_period),
            observations: 0,
            previous: None,
            current: None,
        }
    }

    fn observe(&mut self, close: f64, slow_period: usize) {
        self.fast.update(close);
        self.slow.update(close);
        self.observations += 1;
        self.previous = self.current;
        self.current = if self.observations >= slow_period {
            self.fast.value().zip(self.slow.value())
        } else {
            None
        };
    }

    fn signal(&self) -> Signal {
        match (self.previous, self.current) {
            (Some((pf, ps)), Some((cf, cs))) => {
                if pf <= ps && cf > cs {
                    Signal::Buy
                } else if pf >= ps && cf < cs {
                    Signal::Sell
                } else {
                    Signal::Hold
                }
            }
            _ => Signal::Hold,
        }
    }
}

/// Buys when the fast mean of close crosses above the slow mean and sells
/// when it crosses below, independently per symbol.
#[derive(Debug, Clone)]
pub struct MovingAverageCrossover {
    params: CrossoverParams,
    symbols: BTreeMap<String, SymbolState>,
    signals: SignalMap,
}

impl MovingAverageCrossover {
    pub const NAME: &'static str = "moving_average_crossover";

    pub fn new(params: CrossoverParams) -> Result<Self, TradesimError> {
        params.validate()?;
        Ok(MovingAverageCrossover {
            params,
            symbols: BTreeMap::new(),
            signals: SignalMap::new(),
        })
    }

    /// Reads `[strategy] fast_ma_period, slow_ma_period, ma_type`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradesimError> {
        let fast_period = read_period(config, "fast_ma_period")?;
        let slow_period = read_period(config, "slow_ma_period")?;
        let ma_type = config
            .get_string("strategy", "ma_type")
            .ok_or_else(|| TradesimError::ConfigMissing {
                section: "strategy".to_string(),
                key: "ma_type".to_string(),
            })?
            .parse::<MaType>()
            .map_err(|reason| invalid("ma_type", &reason))?;
        Self::new(CrossoverParams {
            fast_period,
            slow_period,
            ma_type,
        })
    }
}

fn read_period(config: &dyn ConfigPort, key: &str) -> Result<usize, TradesimError> {
    let raw = config
        .get_string("strategy", key)
        .ok_or_else(|| TradesimError::ConfigMissing {
            section: "strategy".to_string(),
            key: key.to_string(),
        })?;
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(key, &format!("{key} must be an integer, got '{raw}'")))?;
    usize::try_from(value)
        .ok()
        .filter(|&v| v >= 1)
        .ok_or_else(|| invalid(key, &format!("{key} must be a positive integer")))
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self) {
        self.symbols.clear();
        self.signals.clear();
    }

    fn update(&mut self, timestamp: NaiveDateTime, bar: &Bar) {
        for signal in self.signals.values_mut() {
            *signal = Signal::Hold;
        }
        for (symbol, quote) in &bar.quotes {
            let state = self
                .symbols
                .entry(symbol.clone())
                .or_insert_with(|| SymbolState::new(&self.params));
            state.observe(quote.close, self.params.slow_period);
            let signal = state.signal();
            if signal != Signal::Hold {
                debug!(%symbol, %signal, %timestamp, "crossover");
            }
            self.signals.insert(symbol.clone(), signal);
        }
    }

    fn generate_signals(&self) -> SignalMap {
        self.signals.clone()
    }
}

pub mod registry {
    //! Strategies selectable by name.

    use super::*;

    pub type Constructor = fn(&dyn ConfigPort) -> Result<Box<dyn Strategy>, TradesimError>;

    pub const STRATEGIES: &[(&str, Constructor)] =
        &[(MovingAverageCrossover::NAME, build_crossover)];

    fn build_crossover(config: &dyn ConfigPort) -> Result<Box<dyn Strategy>, TradesimError> {
        Ok(Box::new(MovingAverageCrossover::from_config(config)?))
    }

    pub fn build(name: &str, config: &dyn ConfigPort) -> Result<Box<dyn Strategy>, TradesimError> {
        STRATEGIES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, ctor)| ctor(config))
            .unwrap_or_else(|| Err(TradesimError::UnknownStrategy(name.to_string())))
    }
}
