//! Exponential moving average.
//!
//! alpha = 2/(n+1), seeded with the first close, then
//! EMA[i] = C[i]*alpha + EMA[i-1]*(1-alpha). Defined from the first close.

#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialMean {
    alpha: f64,
    current: Option<f64>,
}

impl ExponentialMean {
    pub fn new(period: usize) -> Self {
        ExponentialMean {
            alpha: 2.0 / (period as f64 + 1.0),
            current: None,
        }
    }

    pub fn update(&mut self, close: f64) {
        self.current = Some(match self.current {
            None => close,
            Some(prev) => close * self.alpha + prev * (1.0 - self.alpha),
        });
    }

    pub fn value(&self) -> Option<f64> {
        self.current
    }
}
