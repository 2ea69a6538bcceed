//! Port traits: the seams between the engine and the outside world.

pub mod cache_port;
pub mod config_port;
pub mod data_port;
pub mod report_port;
