//! Core domain types and logic.

pub mod bar;
pub mod signal;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod strategy;
pub mod risk;
pub mod backtest;
pub mod metrics;
pub mod data_loader;
pub mod config_validation;
pub mod error;
