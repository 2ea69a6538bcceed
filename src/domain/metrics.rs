//! Performance metrics.
//!
//! Sharpe ratio and drawdown are computed over a market price series (the
//! benchmark's closes), not the portfolio's equity curve.

use std::collections::{BTreeMap, BTreeSet};

use super::bar::{Bar, closes};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

impl Metrics {
    /// Pure function of its inputs. Degenerate series give NaN or infinities
    /// (e.g. a flat price series has zero deviation) rather than panicking.
    pub fn evaluate(prices: &[f64], final_value: f64, initial_capital: f64) -> Self {
        let returns = period_returns(prices);
        Metrics {
            total_return: total_return(final_value, initial_capital),
            sharpe_ratio: sharpe_ratio(&returns),
            max_drawdown: max_drawdown(prices),
        }
    }
}

pub fn total_return(final_value: f64, initial_capital: f64) -> f64 {
    (final_value - initial_capital) / initial_capital
}

/// Bar-over-bar percentage change: `p[i] / p[i-1] - 1`.
pub fn period_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// mean / sample standard deviation (n - 1).
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    mean(returns) / sample_stddev(returns)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Prefix maximum of `values`.
pub fn running_max(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|&v| {
            peak = peak.max(v);
            peak
        })
        .collect()
}

/// Relative decline from the running peak at each point: `(p - peak) / peak`.
pub fn drawdowns(prices: &[f64]) -> Vec<f64> {
    running_max(prices)
        .iter()
        .zip(prices)
        .map(|(&peak, &p)| (p - peak) / peak)
        .collect()
}

/// Deepest relative decline from the running peak, as a non-positive fraction.
pub fn max_drawdown(prices: &[f64]) -> f64 {
    drawdowns(prices).into_iter().fold(f64::NAN, f64::min)
}

/// Metrics for every symbol present in `bars`, each over its own closes.
pub fn evaluate_by_symbol(
    bars: &[Bar],
    final_value: f64,
    initial_capital: f64,
) -> BTreeMap<String, Metrics> {
    let symbols: BTreeSet<&str> = bars.iter().flat_map(|b| b.symbols()).collect();
    symbols
        .into_iter()
        .map(|symbol| {
            let prices = closes(bars, symbol);
            (
                symbol.to_string(),
                Metrics::evaluate(&prices, final_value, initial_capital),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_return_positive_and_negative() {
        assert!((total_return(110_000.0, 100_000.0) - 0.10).abs() < 1e-12);
        assert!((total_return(90_000.0, 100_000.0) + 0.10).abs() < 1e-12);
        assert!((total_return(101_000.0, 100_000.0) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn running_max_sequence() {
        assert_eq!(
            running_max(&[10.0, 12.0, 8.0, 15.0, 9.0]),
            vec![10.0, 12.0, 12.0, 15.0, 15.0]
        );
    }

    #[test]
    fn drawdown_series_trough_after_first_peak() {
        let dd = drawdowns(&[10.0, 12.0, 8.0, 15.0, 9.0]);
        assert_eq!(dd[0], 0.0);
        assert_eq!(dd[1], 0.0);
        assert!((dd[2] - (8.0 - 12.0) / 12.0).abs() < 1e-12);
        assert_eq!(dd[3], 0.0);
        assert!((dd[4] - (9.0 - 15.0) / 15.0).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_known_series() {
        // Drawdowns: 0, 0, -1/3, 0, -0.4. The deepest is 9 vs the 15 peak.
        let dd = max_drawdown(&[10.0, 12.0, 8.0, 15.0, 9.0]);
        assert!((dd - (9.0 - 15.0) / 15.0).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_first_trough() {
        let dd = max_drawdown(&[10.0, 12.0, 8.0, 15.0, 14.0]);
        assert!((dd - (8.0 - 12.0) / 12.0).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotone_rise_is_zero() {
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn max_drawdown_empty_is_nan() {
        assert!(max_drawdown(&[]).is_nan());
    }

    #[test]
    fn period_returns_pct_change() {
        let r = period_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn sharpe_uses_sample_stddev() {
        let returns = [0.01, 0.03];
        // mean 0.02, sample stddev sqrt(0.0002) = 0.014142...
        let expected = 0.02 / (0.0002_f64).sqrt();
        assert!((sharpe_ratio(&returns) - expected).abs() < 1e-9);
    }

    #[test]
    fn sharpe_flat_prices_is_nan() {
        let m = Metrics::evaluate(&[5.0, 5.0, 5.0], 1.0, 1.0);
        assert!(m.sharpe_ratio.is_nan());
    }

    #[test]
    fn sharpe_too_few_points_is_nan() {
        assert!(Metrics::evaluate(&[5.0], 1.0, 1.0).sharpe_ratio.is_nan());
        assert!(Metrics::evaluate(&[5.0, 6.0], 1.0, 1.0).sharpe_ratio.is_nan());
        assert!(Metrics::evaluate(&[], 1.0, 1.0).sharpe_ratio.is_nan());
    }

    #[test]
    fn evaluate_is_pure() {
        let prices = [100.0, 101.5, 99.0, 103.2, 98.7, 110.0];
        let a = Metrics::evaluate(&prices, 104_321.0, 100_000.0);
        let b = Metrics::evaluate(&prices, 104_321.0, 100_000.0);
        assert_eq!(a.total_return.to_bits(), b.total_return.to_bits());
        assert_eq!(a.sharpe_ratio.to_bits(), b.sharpe_ratio.to_bits());
        assert_eq!(a.max_drawdown.to_bits(), b.max_drawdown.to_bits());
    }

    #[test]
    fn by_symbol_uses_each_symbols_closes() {
        use chrono::NaiveDate;
        let t = |d| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        let bars = vec![
            Bar::new(t(1)).with_close("A", 10.0).with_close("B", 20.0),
            Bar::new(t(2)).with_close("A", 5.0),
            Bar::new(t(3)).with_close("A", 10.0).with_close("B", 25.0),
        ];
        let by = evaluate_by_symbol(&bars, 100.0, 100.0);
        assert_eq!(by.len(), 2);
        assert!((by["A"].max_drawdown + 0.5).abs() < 1e-12);
        assert_eq!(by["B"].max_drawdown, 0.0);
        assert_eq!(by["B"].total_return, 0.0);
    }
}
