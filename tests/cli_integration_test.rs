//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, build_retry_policy)
//! - The full backtest pipeline over CSV files on disk
//! - Exit codes of the backtest, validate and list-symbols commands
//! - Trade ledger output written by `--output`

mod common;

use common::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;
use tradesim::adapters::file_config_adapter::FileConfigAdapter;
use tradesim::cli::{self, Cli, Command};
use tradesim::domain::error::TradesimError;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Config for a 2/3 simple crossover over `csv_dir`.
fn valid_ini(csv_dir: &Path) -> String {
    format!(
        r#"
[backtest]
initial_capital = 100000.0
start_date = 2024-01-01
end_date = 2024-01-31
symbols = aaa
fixed_quantity = 100
source = csv

[strategy]
name = moving_average_crossover
fast_ma_period = 2
slow_ma_period = 3
ma_type = simple

[data]
csv_dir = {}
max_retries = 0
"#,
        csv_dir.display()
    )
}

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_symbol_csv(dir.path(), "AAA", "2024-01-01", &CROSSOVER_CLOSES);
    dir
}

fn same_code(actual: ExitCode, expected: u8) -> bool {
    format!("{:?}", actual) == format!("{:?}", ExitCode::from(expected))
}

fn backtest(config: PathBuf, output: Option<PathBuf>, dry_run: bool) -> ExitCode {
    cli::run(Cli {
        command: Command::Backtest {
            config,
            output,
            dry_run,
        },
    })
}

mod config_loading {
    use super::*;

    #[test]
    fn build_backtest_config_from_ini() {
        let dir = data_dir();
        let adapter = FileConfigAdapter::from_string(&valid_ini(dir.path())).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.start, ts("2024-01-01"));
        assert_eq!(config.end, date(2024, 1, 31).and_hms_opt(23, 59, 59).unwrap());
        assert!((config.initial_capital - 100_000.0).abs() < f64::EPSILON);
        assert_eq!(config.execution.fixed_quantity, 100);
    }

    #[test]
    fn missing_start_date_is_config_error() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nend_date = 2024-01-31\n").unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigMissing { key, .. } if key == "start_date"));
    }

    #[test]
    fn malformed_date_is_invalid() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 01/02/2024\nend_date = 2024-01-31\n",
        )
        .unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "start_date"));
    }
}

mod pipeline {
    use super::*;

    #[test]
    fn runs_crossover_over_csv_files() {
        let dir = data_dir();
        let adapter = FileConfigAdapter::from_string(&valid_ini(dir.path())).unwrap();
        let result = cli::run_backtest_pipeline(&adapter).unwrap();

        assert_eq!(result.strategy, "moving_average_crossover");
        assert_eq!(result.trades().len(), 2);
        assert!((result.final_value() - 99_400.0).abs() < 1e-9);
        assert_eq!(result.benchmark.as_deref(), Some("AAA"));
    }

    #[test]
    fn pipeline_populates_cache_dir() {
        let dir = data_dir();
        let cache = TempDir::new().unwrap();
        let ini = format!(
            "{}cache_dir = {}\n",
            valid_ini(dir.path()),
            cache.path().display()
        );
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        cli::run_backtest_pipeline(&adapter).unwrap();

        let entries: Vec<_> = std::fs::read_dir(cache.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].starts_with("csv_AAA_20240101T000000_20240131T235959"));
    }

    #[test]
    fn missing_symbol_file_is_no_data() {
        let dir = data_dir();
        let ini = valid_ini(dir.path()).replace("symbols = aaa", "symbols = aaa, zzz");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::run_backtest_pipeline(&adapter).unwrap_err();
        assert!(matches!(err, TradesimError::NoData { symbol, .. } if symbol == "ZZZ"));
    }

    #[test]
    fn unknown_strategy_is_rejected_before_loading() {
        let ini = valid_ini(Path::new("/nonexistent"))
            .replace("name = moving_average_crossover", "name = mean_reversion");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::run_backtest_pipeline(&adapter).unwrap_err();
        assert!(matches!(err, TradesimError::UnknownStrategy(name) if name == "mean_reversion"));
    }
}

mod commands {
    use super::*;

    #[test]
    fn backtest_writes_trade_ledger() {
        let dir = data_dir();
        let ini = write_temp_ini(&valid_ini(dir.path()));
        let out = dir.path().join("trades.csv");

        let code = backtest(ini.path().to_path_buf(), Some(out.clone()), false);
        assert!(same_code(code, 0));

        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("2024-01-05 00:00:00,AAA,buy,12,100"));
    }

    #[test]
    fn dry_run_does_not_write_output() {
        let dir = data_dir();
        let ini = write_temp_ini(&valid_ini(dir.path()));
        let out = dir.path().join("trades.csv");

        let code = backtest(ini.path().to_path_buf(), Some(out.clone()), true);
        assert!(same_code(code, 0));
        assert!(!out.exists());
    }

    #[test]
    fn missing_config_file_exits_with_io_code() {
        let code = backtest(PathBuf::from("/nonexistent/tradesim.ini"), None, false);
        assert!(same_code(code, 1));
    }

    #[test]
    fn invalid_config_exits_with_config_code() {
        let dir = data_dir();
        let ini = valid_ini(dir.path()).replace("fast_ma_period = 2", "fast_ma_period = 5");
        let file = write_temp_ini(&ini);
        let code = cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, 2));
    }

    #[test]
    fn malformed_number_exits_with_config_code() {
        let dir = data_dir();
        let ini = valid_ini(dir.path())
            .replace("initial_capital = 100000.0", "initial_capital = 1O0000");
        let file = write_temp_ini(&ini);
        let code = cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, 2));
        assert!(same_code(backtest(file.path().to_path_buf(), None, false), 2));
    }

    #[test]
    fn unknown_strategy_exit_code() {
        let dir = data_dir();
        let ini = valid_ini(dir.path()).replace("name = moving_average_crossover", "name = x");
        let file = write_temp_ini(&ini);
        let code = backtest(file.path().to_path_buf(), None, false);
        assert!(same_code(code, 4));
    }

    #[test]
    fn validate_accepts_valid_config() {
        let dir = data_dir();
        let file = write_temp_ini(&valid_ini(dir.path()));
        let code = cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, 0));
    }

    #[test]
    fn list_symbols_succeeds() {
        let dir = data_dir();
        let file = write_temp_ini(&valid_ini(dir.path()));
        let code = cli::run(Cli {
            command: Command::ListSymbols {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, 0));
    }
}
