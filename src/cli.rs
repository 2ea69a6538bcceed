//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_cache_adapter::JsonCacheAdapter;
use crate::adapters::registry as sources;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    DEFAULT_INITIAL_CAPITAL, read_range, read_symbols, source_name, strategy_name, validate_all,
};
use crate::domain::data_loader::{Backoff, DataLoader, RetryPolicy};
use crate::domain::error::TradesimError;
use crate::domain::execution::{DEFAULT_FIXED_QUANTITY, ExecutionConfig};
use crate::domain::risk::{DrawdownVolatilityGate, RiskControl, RiskLimits};
use crate::domain::strategy::registry as strategies;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Event-driven trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the trade ledger as CSV to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available from the configured data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

fn fail(err: TradesimError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

fn run_backtest(config_path: &Path, output_path: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = match run_backtest_pipeline(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_summary(&result);

    if let Some(output) = output_path {
        let path = output.display().to_string();
        if let Err(e) = CsvReportAdapter::new().write(&result, &path) {
            return fail(e);
        }
        eprintln!("\nTrades written to: {path}");
    }
    ExitCode::SUCCESS
}

/// Validates the configuration, loads data, and runs one backtest.
pub fn run_backtest_pipeline(config: &dyn ConfigPort) -> Result<BacktestResult, TradesimError> {
    validate_all(config)?;

    let bt_config = build_backtest_config(config)?;
    let symbols = read_symbols(config)?;
    let source = source_name(config);
    let mut strategy = strategies::build(&strategy_name(config), config)?;
    let gate = build_risk_gate(config)?;
    let mut loader = build_loader(config)?;

    eprintln!(
        "Loading {} symbols from {}: {} to {}",
        symbols.len(),
        source,
        bt_config.start,
        bt_config.end
    );
    let series = loader.load_historical_data(&symbols, bt_config.start, bt_config.end, &source)?;

    eprintln!(
        "Running {}: {} bars",
        strategy.name(),
        series.range(bt_config.start, bt_config.end).len()
    );
    backtest_engine::run_backtest(
        strategy.as_mut(),
        &series,
        &bt_config,
        gate.as_ref().map(|g| g as &dyn RiskControl),
    )
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TradesimError> {
    let (start, end) = read_range(adapter)?;
    let fixed_quantity =
        adapter.get_int("backtest", "fixed_quantity", DEFAULT_FIXED_QUANTITY as i64)?;
    let fixed_quantity = u64::try_from(fixed_quantity).map_err(|_| TradesimError::ConfigInvalid {
        section: "backtest".into(),
        key: "fixed_quantity".into(),
        reason: "fixed_quantity must be at least 1".into(),
    })?;

    Ok(BacktestConfig {
        start,
        end,
        initial_capital: adapter.get_double(
            "backtest",
            "initial_capital",
            DEFAULT_INITIAL_CAPITAL,
        )?,
        execution: ExecutionConfig { fixed_quantity },
        benchmark: adapter
            .get_string("backtest", "benchmark")
            .map(|b| b.to_uppercase()),
    })
}

pub fn build_retry_policy(adapter: &dyn ConfigPort) -> Result<RetryPolicy, TradesimError> {
    let defaults = RetryPolicy::default();
    let backoff = match adapter.get_string("data", "backoff") {
        Some(raw) => raw
            .parse::<Backoff>()
            .map_err(|reason| TradesimError::ConfigInvalid {
                section: "data".into(),
                key: "backoff".into(),
                reason,
            })?,
        None => defaults.backoff,
    };
    let max_retries: u32 = read_count(adapter, "max_retries", i64::from(defaults.max_retries))?;
    let delay_ms: u64 = read_count(
        adapter,
        "retry_delay_ms",
        defaults.base_delay.as_millis() as i64,
    )?;

    Ok(RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(delay_ms),
        backoff,
    })
}

/// Non-negative `[data]` integer that must fit `T`.
fn read_count<T: TryFrom<i64>>(
    adapter: &dyn ConfigPort,
    key: &str,
    default: i64,
) -> Result<T, TradesimError> {
    let value = adapter.get_int("data", key, default)?;
    T::try_from(value).map_err(|_| TradesimError::ConfigInvalid {
        section: "data".into(),
        key: key.into(),
        reason: format!("{key} must be a non-negative integer in range, got {value}"),
    })
}

/// Loader with the configured source, optional cache, retry policy and rate limit.
pub fn build_loader(adapter: &dyn ConfigPort) -> Result<DataLoader, TradesimError> {
    let source = sources::build(&source_name(adapter), adapter)?;
    let min_interval: u64 = read_count(adapter, "min_request_interval_ms", 0)?;

    let mut loader = DataLoader::new()
        .with_source(source)
        .with_retry(build_retry_policy(adapter)?)
        .with_rate_limit(Duration::from_millis(min_interval));
    if let Some(dir) = adapter.get_string("data", "cache_dir") {
        loader = loader.with_cache(Box::new(JsonCacheAdapter::new(dir)));
    }
    Ok(loader)
}

pub fn build_risk_gate(
    adapter: &dyn ConfigPort,
) -> Result<Option<DrawdownVolatilityGate>, TradesimError> {
    if !adapter.get_bool("risk", "enabled", false)? {
        return Ok(None);
    }
    Ok(Some(DrawdownVolatilityGate::new(RiskLimits::from_config(
        adapter,
    )?)))
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results: {} ===", result.strategy);
    eprintln!("Period:           {} to {}", result.start, result.end);
    eprintln!("Bars:             {}", result.bars_processed);
    eprintln!(
        "Initial Capital:  {:.2}",
        result.portfolio.initial_capital()
    );
    eprintln!("Final Value:      {:.2}", result.final_value());
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    if let Some(benchmark) = &result.benchmark {
        eprintln!("Benchmark:        {benchmark}");
    }
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Max Drawdown:     {:.1}%", m.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", result.trades().len());
    eprintln!("Open Positions:   {}", result.portfolio.position_count());

    if result.symbol_metrics.len() > 1 {
        eprintln!("\n=== Per-Symbol Summary ===");
        for (symbol, sm) in &result.symbol_metrics {
            let trades = result
                .trades()
                .iter()
                .filter(|t| &t.symbol == symbol)
                .count();
            eprintln!(
                "  {}:  {} trades, sharpe {:.2}, max drawdown {:.1}%",
                symbol,
                trades,
                sm.sharpe_ratio,
                sm.max_drawdown * 100.0,
            );
        }
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_all(&adapter) {
        return fail(e);
    }
    eprintln!("Config validated successfully");

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let symbols = match read_symbols(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!("\nBacktest:");
    eprintln!("  range:           {} to {}", bt_config.start, bt_config.end);
    eprintln!("  initial capital: {:.2}", bt_config.initial_capital);
    eprintln!("  fixed quantity:  {}", bt_config.execution.fixed_quantity);
    eprintln!("  symbols:         {}", symbols.join(", "));
    eprintln!("  source:          {}", source_name(&adapter));
    eprintln!("\nStrategy: {}", strategy_name(&adapter));
    for key in ["fast_ma_period", "slow_ma_period", "ma_type"] {
        if let Some(v) = adapter.get_string("strategy", key) {
            eprintln!("  {key}: {v}");
        }
    }
    match adapter.get_bool("risk", "enabled", false) {
        Ok(true) => eprintln!("\nRisk gate: enabled"),
        Ok(false) => {}
        Err(e) => return fail(e),
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match validate_all(&adapter) {
        Ok(()) => {
            eprintln!("Configuration is valid");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let source = match sources::build(&source_name(&adapter), &adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let symbols = match source.list_symbols() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    if symbols.is_empty() {
        eprintln!("No symbols found for source {}", source.name());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn backtest_config_defaults() {
        let cfg = make_config(
            "[backtest]\nstart_date = 2023-01-01\nend_date = 2023-06-30\nsymbols = A\n",
        );
        let c = build_backtest_config(&cfg).unwrap();
        assert_eq!(c.start.to_string(), "2023-01-01 00:00:00");
        assert_eq!(c.end.to_string(), "2023-06-30 23:59:59");
        assert!((c.initial_capital - 100_000.0).abs() < f64::EPSILON);
        assert_eq!(c.execution.fixed_quantity, 100);
        assert_eq!(c.benchmark, None);
    }

    #[test]
    fn backtest_config_overrides() {
        let cfg = make_config(
            "[backtest]\nstart_date = 2023-01-01 09:30:00\nend_date = 2023-01-01 16:00:00\n\
             initial_capital = 2500\nfixed_quantity = 7\nbenchmark = spy\n",
        );
        let c = build_backtest_config(&cfg).unwrap();
        assert_eq!(c.start.to_string(), "2023-01-01 09:30:00");
        assert_eq!(c.end.to_string(), "2023-01-01 16:00:00");
        assert!((c.initial_capital - 2500.0).abs() < f64::EPSILON);
        assert_eq!(c.execution.fixed_quantity, 7);
        assert_eq!(c.benchmark.as_deref(), Some("SPY"));
    }

    #[test]
    fn retry_policy_from_config() {
        let cfg = make_config("[data]\nmax_retries = 5\nretry_delay_ms = 250\nbackoff = fixed\n");
        let p = build_retry_policy(&cfg).unwrap();
        assert_eq!(p.max_retries, 5);
        assert_eq!(p.base_delay, Duration::from_millis(250));
        assert_eq!(p.backoff, Backoff::Fixed);
    }

    #[test]
    fn retry_policy_defaults() {
        let p = build_retry_policy(&make_config("[data]\n")).unwrap();
        assert_eq!(p, RetryPolicy::default());
    }

    #[test]
    fn negative_retry_delay_is_invalid() {
        let err = build_retry_policy(&make_config("[data]\nretry_delay_ms = -250\n")).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { section, key, .. }
            if section == "data" && key == "retry_delay_ms"));
    }

    #[test]
    fn retry_count_beyond_range_is_invalid() {
        let cfg = make_config("[data]\nmax_retries = 5000000000\n");
        let err = build_retry_policy(&cfg).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "max_retries"));
    }

    #[test]
    fn non_numeric_retry_count_is_invalid() {
        let err = build_retry_policy(&make_config("[data]\nmax_retries = lots\n")).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "max_retries"));
    }

    #[test]
    fn negative_request_interval_is_invalid() {
        let cfg = make_config("[data]\ncsv_dir = /tmp\nmin_request_interval_ms = -1\n");
        let err = build_loader(&cfg).err().unwrap();
        assert!(
            matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "min_request_interval_ms")
        );
    }

    #[test]
    fn malformed_backtest_numbers_are_invalid() {
        let base = "[backtest]\nstart_date = 2023-01-01\nend_date = 2023-06-30\n";
        let err = build_backtest_config(&make_config(&format!("{base}initial_capital = 5O000\n")))
            .unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "initial_capital"));
        let err = build_backtest_config(&make_config(&format!("{base}fixed_quantity = ten\n")))
            .unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "fixed_quantity"));
    }

    #[test]
    fn risk_gate_rejects_unreadable_flag() {
        let err = build_risk_gate(&make_config("[risk]\nenabled = maybe\n")).err().unwrap();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "enabled"));
    }

    #[test]
    fn risk_gate_disabled_by_default() {
        assert!(build_risk_gate(&make_config("[risk]\n")).unwrap().is_none());
    }

    #[test]
    fn risk_gate_reads_limits() {
        let cfg = make_config("[risk]\nenabled = true\nmax_drawdown = 0.1\n");
        let gate = build_risk_gate(&cfg).unwrap().unwrap();
        assert!((gate.limits().max_drawdown - 0.1).abs() < f64::EPSILON);
        assert_eq!(gate.limits().min_observations, 20);
    }

    #[test]
    fn loader_requires_csv_dir() {
        let err = build_loader(&make_config("[data]\n")).err().unwrap();
        assert!(matches!(err, TradesimError::ConfigMissing { key, .. } if key == "csv_dir"));
    }
}
