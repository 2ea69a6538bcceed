//! Simple moving average over a rolling window.
//!
//! SMA(n) = sum of the last n closes / n. Undefined until n closes are seen.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
}

impl RollingMean {
    pub fn new(period: usize) -> Self {
        RollingMean {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn update(&mut self, close: f64) {
        if self.period == 0 {
            return;
        }
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(close);
    }

    pub fn value(&self) -> Option<f64> {
        if self.period == 0 || self.window.len() < self.period {
            return None;
        }
        // Summed from scratch so equal windows give bit-equal means.
        Some(self.window.iter().sum::<f64>() / self.period as f64)
    }
}
