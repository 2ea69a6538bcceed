#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use tradesim::domain::bar::{Bar, BarSeries, Quote};
use tradesim::domain::error::TradesimError;
use tradesim::ports::data_port::DataPort;

/// In-memory data source. Transient failures are served first, then data.
pub struct MockDataPort {
    pub name: String,
    pub data: HashMap<String, Vec<(NaiveDateTime, f64)>>,
    pub errors: HashMap<String, String>,
    pub transient_failures: Cell<u32>,
    pub calls: Rc<Cell<u32>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            data: HashMap::new(),
            errors: HashMap::new(),
            transient_failures: Cell::new(0),
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_closes(mut self, symbol: &str, start: &str, closes: &[f64]) -> Self {
        let first = ts(start);
        let rows = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| (first + Duration::days(i as i64), c))
            .collect();
        self.data.insert(symbol.to_string(), rows);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn failing_first(self, n: u32) -> Self {
        self.transient_failures.set(n);
        self
    }

    /// Shared counter of `get_historical_data` calls, readable after the
    /// port has been boxed into a loader.
    pub fn call_counter(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.calls)
    }
}

impl DataPort for MockDataPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_historical_data(
        &self,
        symbols: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<BarSeries, TradesimError> {
        self.calls.set(self.calls.get() + 1);
        let remaining = self.transient_failures.get();
        if remaining > 0 {
            self.transient_failures.set(remaining - 1);
            return Err(TradesimError::Transient {
                source_name: self.name.clone(),
                reason: "connection reset".into(),
            });
        }

        let mut timeline: BTreeMap<NaiveDateTime, Bar> = BTreeMap::new();
        for symbol in symbols {
            if let Some(reason) = self.errors.get(symbol) {
                return Err(TradesimError::Data {
                    reason: reason.clone(),
                });
            }
            for &(t, close) in self.data.get(symbol).into_iter().flatten() {
                if t < start || t > end {
                    continue;
                }
                let bar = timeline.entry(t).or_insert_with(|| Bar::new(t));
                bar.quotes.insert(symbol.clone(), Quote::flat(close));
            }
        }
        BarSeries::new(timeline.into_values().collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TradesimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Midnight of a `YYYY-MM-DD` date.
pub fn ts(value: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Daily single-symbol bars starting at `start`.
pub fn daily_series(symbol: &str, start: &str, closes: &[f64]) -> BarSeries {
    let first = ts(start);
    BarSeries::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(first + Duration::days(i as i64)).with_close(symbol, c))
            .collect(),
    )
    .unwrap()
}

/// Writes `<symbol>.csv` with one row per close, one day apart.
pub fn write_symbol_csv(dir: &Path, symbol: &str, start: &str, closes: &[f64]) {
    let mut file = std::fs::File::create(dir.join(format!("{symbol}.csv"))).unwrap();
    writeln!(file, "date,open,high,low,close,volume").unwrap();
    let first = ts(start).date();
    for (i, c) in closes.iter().enumerate() {
        let d = first + Duration::days(i as i64);
        writeln!(file, "{},{},{},{},{},1000", d, c, c + 1.0, c - 1.0, c).unwrap();
    }
}

/// Closes that fall, rise sharply, then fall again: one golden cross and one
/// death cross for a 2/3 crossover.
pub const CROSSOVER_CLOSES: [f64; 9] = [10.0, 9.0, 8.0, 7.0, 12.0, 15.0, 9.0, 6.0, 5.0];
