//! Port traits separating the engine from storage and output.

pub mod config_port;
pub mod market_port;
pub mod report_port;
