//! Market bars and ordered bar series.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::error::TradesimError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Quote {
    /// A quote where every price field equals `close`.
    pub fn flat(close: f64) -> Self {
        Quote {
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }
}

/// One timestamped snapshot of prices for a set of symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub quotes: BTreeMap<String, Quote>,
}

impl Bar {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Bar {
            timestamp,
            quotes: BTreeMap::new(),
        }
    }

    pub fn with_quote(mut self, symbol: &str, quote: Quote) -> Self {
        self.quotes.insert(symbol.to_string(), quote);
        self
    }

    pub fn with_close(self, symbol: &str, close: f64) -> Self {
        self.with_quote(symbol, Quote::flat(close))
    }

    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    pub fn close(&self, symbol: &str) -> Option<f64> {
        self.quote(symbol).map(|q| q.close)
    }

    /// Close price for `symbol`, or `MissingPrice` naming this bar's timestamp.
    pub fn require_close(&self, symbol: &str) -> Result<f64, TradesimError> {
        self.close(symbol).ok_or_else(|| TradesimError::MissingPrice {
            symbol: symbol.to_string(),
            timestamp: self.timestamp,
        })
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.quotes.keys().map(String::as_str)
    }
}

/// Bars in strictly ascending timestamp order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, TradesimError> {
        for pair in bars.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(TradesimError::UnorderedBars {
                    previous: pair[0].timestamp,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(BarSeries { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars with `start <= timestamp <= end`.
    pub fn range(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Bar] {
        let lo = self.bars.partition_point(|b| b.timestamp < start);
        let hi = self.bars.partition_point(|b| b.timestamp <= end);
        if lo >= hi { &[] } else { &self.bars[lo..hi] }
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        self.bars
            .iter()
            .flat_map(|b| b.quotes.keys().cloned())
            .collect()
    }
}

/// Closing prices of `symbol` across `bars`, skipping bars without a quote.
pub fn closes(bars: &[Bar], symbol: &str) -> Vec<f64> {
    bars.iter().filter_map(|b| b.close(symbol)).collect()
}

/// Which end of a range a parsed timestamp bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parses `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`. A date-only end bound covers the whole day.
pub fn parse_bound(value: &str, bound: Bound) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT) {
        return Some(ts);
    }
    let date = NaiveDate::parse_from_str(value, DATE_FORMAT).ok()?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_opt(23, 59, 59)?,
    };
    Some(date.and_time(time))
}

/// Parses a bar timestamp; date-only values are midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    parse_bound(value, Bound::Start)
}
