//! Incremental moving averages over closing prices.
//!
//! Each average consumes one close at a time, so a strategy can keep one per
//! symbol and update it bar by bar.

pub mod ema;
pub mod sma;

use std::fmt;
use std::str::FromStr;

pub use ema::ExponentialMean;
pub use sma::RollingMean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaType {
    Simple,
    Exponential,
}

impl fmt::Display for MaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaType::Simple => f.write_str("simple"),
            MaType::Exponential => f.write_str("exponential"),
        }
    }
}

impl FromStr for MaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "sma" => Ok(MaType::Simple),
            "exponential" | "ema" => Ok(MaType::Exponential),
            other => Err(format!(
                "moving average type must be 'simple' or 'exponential', got '{other}'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MovingAverage {
    Simple(RollingMean),
    Exponential(ExponentialMean),
}

impl MovingAverage {
    pub fn new(ma_type: MaType, period: usize) -> Self {
        match ma_type {
            MaType::Simple => MovingAverage::Simple(RollingMean::new(period)),
            MaType::Exponential => MovingAverage::Exponential(ExponentialMean::new(period)),
        }
    }

    pub fn update(&mut self, close: f64) {
        match self {
            MovingAverage::Simple(m) => m.update(close),
            MovingAverage::Exponential(m) => m.update(close),
        }
    }

    /// Current mean, or `None` until enough closes have been seen.
    pub fn value(&self) -> Option<f64> {
        match self {
            MovingAverage::Simple(m) => m.value(),
            MovingAverage::Exponential(m) => m.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ma_type_parses_names_and_aliases() {
        assert_eq!("simple".parse::<MaType>().unwrap(), MaType::Simple);
        assert_eq!("EMA".parse::<MaType>().unwrap(), MaType::Exponential);
        assert_eq!(
            " exponential ".parse::<MaType>().unwrap(),
            MaType::Exponential
        );
        assert!("weighted".parse::<MaType>().is_err());
    }

    #[test]
    fn dispatches_to_variant() {
        let mut sma = MovingAverage::new(MaType::Simple, 2);
        let mut ema = MovingAverage::new(MaType::Exponential, 2);
        for c in [10.0, 20.0] {
            sma.update(c);
            ema.update(c);
        }
        assert_eq!(sma.value(), Some(15.0));
        // alpha = 2/3: 20*2/3 + 10/3
        assert!((ema.value().unwrap() - (20.0 * 2.0 / 3.0 + 10.0 / 3.0)).abs() < 1e-12);
    }
}
