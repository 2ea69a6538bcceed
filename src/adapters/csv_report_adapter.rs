//! Trade ledger export as CSV.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TradesimError;
use crate::ports::report_port::ReportPort;
use std::fs::File;
use std::io::Write;

const HEADER: [&str; 5] = ["timestamp", "symbol", "action", "price", "quantity"];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Writes the header and one row per trade, in execution order.
    pub fn write_to<W: Write>(&self, result: &BacktestResult, out: W) -> Result<(), TradesimError> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(HEADER).map_err(csv_error)?;
        for trade in result.trades() {
            wtr.write_record([
                trade.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                trade.symbol.clone(),
                trade.action.to_string(),
                trade.price.to_string(),
                trade.quantity.to_string(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> TradesimError {
    TradesimError::Data {
        reason: format!("CSV write error: {e}"),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), TradesimError> {
        let file = File::create(output_path)?;
        self.write_to(result, file)
    }
}
