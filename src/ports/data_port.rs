//! Historical data source port trait.

use chrono::NaiveDateTime;

use crate::domain::bar::BarSeries;
use crate::domain::error::TradesimError;

pub trait DataPort {
    /// Name the source is registered under, e.g. `csv`.
    fn name(&self) -> &str;

    /// Bars for `symbols` with `start <= timestamp <= end`, ascending.
    ///
    /// Failures worth repeating are reported as errors whose
    /// [`TradesimError::is_retryable`] is true. The caller owns the retry.
    fn get_historical_data(
        &self,
        symbols: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<BarSeries, TradesimError>;

    /// Symbols this source can serve.
    fn list_symbols(&self) -> Result<Vec<String>, TradesimError>;
}
