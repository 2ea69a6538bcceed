//! Bar cache port trait.

use std::fmt;

use chrono::NaiveDateTime;

use crate::domain::bar::BarSeries;
use crate::domain::error::TradesimError;

/// Identifies one cached request: source, symbol set and time range.
///
/// Symbols are sorted and deduplicated, so the same set requested in any
/// order maps to the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub symbols: Vec<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl CacheKey {
    pub fn new(source: &str, symbols: &[String], start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let mut symbols = symbols.to_vec();
        symbols.sort();
        symbols.dedup();
        CacheKey {
            source: source.to_string(),
            symbols,
            start,
            end,
        }
    }
}

const STEM_FORMAT: &str = "%Y%m%dT%H%M%S";

/// `{source}_{SYM1_SYM2}_{YYYYMMDDTHHMMSS}_{YYYYMMDDTHHMMSS}`; used as a file
/// stem. Both bounds keep their time of day.
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.source,
            self.symbols.join("_"),
            self.start.format(STEM_FORMAT),
            self.end.format(STEM_FORMAT)
        )
    }
}

pub trait CachePort {
    /// Cached series for `key`. Missing, unreadable and corrupt entries are
    /// all misses.
    fn load(&self, key: &CacheKey) -> Option<BarSeries>;

    fn store(&self, key: &CacheKey, series: &BarSeries) -> Result<(), TradesimError>;
}
