//! CSV file data adapter.
//!
//! One `<SYMBOL>.csv` per symbol with a `date,open,high,low,close,volume`
//! header. Files are merged into one timeline: a bar per distinct timestamp,
//! quoting whichever symbols traded then.

use crate::domain::bar::{Bar, BarSeries, Quote, parse_timestamp};
use crate::domain::error::TradesimError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub const SOURCE_NAME: &str = "csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Quotes for one symbol within `[start, end]`, in file order.
    fn read_symbol(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<(NaiveDateTime, Quote)>, TradesimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TradesimError::NoData {
                symbol: symbol.to_string(),
                source_name: SOURCE_NAME.to_string(),
            },
            _ => TradesimError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| TradesimError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let field = |idx: usize, name: &str| {
                record.get(idx).map(str::trim).ok_or_else(|| TradesimError::Data {
                    reason: format!("{} row {}: missing {} column", path.display(), line + 1, name),
                })
            };
            let number = |idx: usize, name: &str| -> Result<f64, TradesimError> {
                let raw = field(idx, name)?;
                raw.parse().map_err(|_| TradesimError::Data {
                    reason: format!(
                        "{} row {}: invalid {} value '{}'",
                        path.display(),
                        line + 1,
                        name,
                        raw
                    ),
                })
            };

            let date_str = field(0, "date")?;
            let timestamp = parse_timestamp(date_str).ok_or_else(|| TradesimError::Data {
                reason: format!(
                    "{} row {}: invalid date '{}'",
                    path.display(),
                    line + 1,
                    date_str
                ),
            })?;
            if timestamp < start || timestamp > end {
                continue;
            }

            let quote = Quote {
                open: number(1, "open")?,
                high: number(2, "high")?,
                low: number(3, "low")?,
                close: number(4, "close")?,
                volume: number(5, "volume")? as i64,
            };
            if !(quote.close.is_finite() && quote.close > 0.0) {
                return Err(TradesimError::Data {
                    reason: format!(
                        "{} row {}: close must be positive, got {}",
                        path.display(),
                        line + 1,
                        quote.close
                    ),
                });
            }
            rows.push((timestamp, quote));
        }

        Ok(rows)
    }
}

impl DataPort for CsvAdapter {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn get_historical_data(
        &self,
        symbols: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<BarSeries, TradesimError> {
        let mut timeline: BTreeMap<NaiveDateTime, Bar> = BTreeMap::new();
        for symbol in symbols {
            for (timestamp, quote) in self.read_symbol(symbol, start, end)? {
                let bar = timeline
                    .entry(timestamp)
                    .or_insert_with(|| Bar::new(timestamp));
                if bar.quotes.insert(symbol.clone(), quote).is_some() {
                    return Err(TradesimError::Data {
                        reason: format!("{symbol}: duplicate row for {timestamp}"),
                    });
                }
            }
        }
        BarSeries::new(timeline.into_values().collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TradesimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TradesimError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
