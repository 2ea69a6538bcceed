//! Data sources selectable by name.

use std::path::PathBuf;

use crate::adapters::csv_adapter::{self, CsvAdapter};
use crate::domain::error::TradesimError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

pub type Constructor = fn(&dyn ConfigPort) -> Result<Box<dyn DataPort>, TradesimError>;

pub const SOURCES: &[(&str, Constructor)] = &[(csv_adapter::SOURCE_NAME, build_csv)];

fn build_csv(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, TradesimError> {
    let dir = config
        .get_string("data", "csv_dir")
        .ok_or_else(|| TradesimError::ConfigMissing {
            section: "data".to_string(),
            key: "csv_dir".to_string(),
        })?;
    Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
}

pub fn names() -> impl Iterator<Item = &'static str> {
    SOURCES.iter().map(|(name, _)| *name)
}

pub fn build(name: &str, config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, TradesimError> {
    SOURCES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, ctor)| ctor(config))
        .unwrap_or_else(|| Err(TradesimError::UnknownSource(name.to_string())))
}
