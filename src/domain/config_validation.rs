//! Configuration validation.
//!
//! Validates all config fields before any data is loaded.

use crate::domain::calendar::parse_trade_date;
use crate::domain::error::SimError;
use crate::domain::simulation::{ExePriceType, SimulationConfig};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATA_SOURCES: [&str; 2] = ["csv", "sqlite"];

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    validate_signal_id(config)?;
    validate_init_cash(config)?;
    validate_cost_rate(config)?;
    validate_exe_price(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    let source = data_source(config)?;
    match source.as_str() {
        "csv" => {
            for key in ["calendar", "dominant", "market", "signal"] {
                require_non_empty(config, "data", key)?;
            }
        }
        _ => {
            require_non_empty(config, "sqlite", "path")?;
            let pool_size = config.get_int("sqlite", "pool_size", 4);
            if pool_size <= 0 {
                return Err(invalid("sqlite", "pool_size", "pool_size must be positive"));
            }
        }
    }
    Ok(())
}

/// The configured data source, `csv` unless set.
pub fn data_source(config: &dyn ConfigPort) -> Result<String, SimError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "csv".to_string());
    if !DATA_SOURCES.contains(&source.as_str()) {
        return Err(invalid(
            "data",
            "source",
            &format!("unknown data source '{source}', expected csv or sqlite"),
        ));
    }
    Ok(source)
}

fn invalid(section: &str, key: &str, reason: &str) -> SimError {
    SimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn require_non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SimError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_signal_id(config: &dyn ConfigPort) -> Result<(), SimError> {
    require_non_empty(config, "simulation", "signal_id").map(|_| ())
}

/// Reads a finite float, falling back to `default` when the key is unset.
///
/// Unlike [`ConfigPort::get_double`], a value that does not parse is an error
/// rather than a silent default.
pub fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, SimError> {
    let raw = match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(default),
    };
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| invalid(section, key, &format!("'{}' is not a number", raw.trim())))?;
    if !value.is_finite() {
        return Err(invalid(section, key, &format!("{key} must be finite")));
    }
    Ok(value)
}

fn validate_init_cash(config: &dyn ConfigPort) -> Result<(), SimError> {
    let default = SimulationConfig::default().init_cash;
    let value = read_f64(config, "simulation", "init_cash", default)?;
    if value <= 0.0 {
        return Err(invalid(
            "simulation",
            "init_cash",
            "init_cash must be positive",
        ));
    }
    Ok(())
}

fn validate_cost_rate(config: &dyn ConfigPort) -> Result<(), SimError> {
    let default = SimulationConfig::default().cost_rate;
    let value = read_f64(config, "simulation", "cost_rate", default)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "simulation",
            "cost_rate",
            "cost_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_exe_price(config: &dyn ConfigPort) -> Result<(), SimError> {
    if let Some(value) = config.get_string("simulation", "exe_price") {
        value
            .parse::<ExePriceType>()
            .map_err(|reason| invalid("simulation", "exe_price", &reason))?;
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SimError> {
    let begin = parse_date(config, "begin_date")?;
    let stop = parse_date(config, "stop_date")?;
    if begin >= stop {
        return Err(invalid(
            "simulation",
            "begin_date",
            "begin_date must be before stop_date",
        ));
    }
    Ok(())
}

/// Reads a required `[simulation]` date in `YYYYMMDD` form.
pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, SimError> {
    let value = require_non_empty(config, "simulation", field)?;
    parse_trade_date(&value).ok_or_else(|| {
        invalid(
            "simulation",
            field,
            &format!("invalid {field} format, expected YYYYMMDD"),
        )
    })
}
