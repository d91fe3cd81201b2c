//! CSV file loaders for the calendar and the provider tables.
//!
//! Columns are located by header name, so extra columns are ignored.

use chrono::NaiveDate;
use log::info;
use std::path::Path;

use crate::adapters::memory_store::{
    DominantContractTable, MarketDataTable, MarketRecord, SignalTable,
};
use crate::domain::calendar::{parse_trade_date, TradeCalendar};
use crate::domain::error::SimError;

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, SimError> {
    csv::Reader::from_path(path).map_err(|e| SimError::Database {
        reason: format!("failed to read {}: {}", path.display(), e),
    })
}

fn column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize, SimError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| SimError::Database {
            reason: format!("missing {} column in {}", name, path.display()),
        })
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, SimError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| SimError::Database {
            reason: format!("missing {name} value"),
        })
}

fn date_field(record: &csv::StringRecord, idx: usize) -> Result<NaiveDate, SimError> {
    let value = field(record, idx, "trade_date")?;
    parse_trade_date(value).ok_or_else(|| SimError::Database {
        reason: format!("invalid date format: {value}"),
    })
}

/// Empty cells read as `None`.
fn optional_f64(record: &csv::StringRecord, idx: Option<usize>, name: &str) -> Result<Option<f64>, SimError> {
    let Some(idx) = idx else {
        return Ok(None);
    };
    let value = field(record, idx, name)?;
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|e| SimError::Database {
        reason: format!("invalid {name} value '{value}': {e}"),
    })
}

fn next_record(
    result: Result<csv::StringRecord, csv::Error>,
) -> Result<csv::StringRecord, SimError> {
    result.map_err(|e| SimError::Database {
        reason: format!("CSV parse error: {}", e),
    })
}

/// Reads a `trade_date` column into a calendar.
pub fn load_calendar(path: &Path) -> Result<TradeCalendar, SimError> {
    let mut rdr = open_reader(path)?;
    let headers = rdr.headers().map_err(|e| SimError::Database {
        reason: format!("CSV parse error: {}", e),
    })?;
    let date_idx = column(headers, "trade_date", path)?;

    let mut dates = Vec::new();
    for result in rdr.records() {
        let record = next_record(result)?;
        dates.push(date_field(&record, date_idx)?);
    }
    info!("loaded {} trade dates from {}", dates.len(), path.display());
    TradeCalendar::new(dates)
}

/// Reads `trade_date,dominant` rows. Rows without a dominant contract are
/// skipped.
pub fn load_dominant(path: &Path, universe: &[String]) -> Result<DominantContractTable, SimError> {
    let mut rdr = open_reader(path)?;
    let headers = rdr.headers().map_err(|e| SimError::Database {
        reason: format!("CSV parse error: {}", e),
    })?;
    let date_idx = column(headers, "trade_date", path)?;
    let dominant_idx = column(headers, "dominant", path)?;

    let mut table = DominantContractTable::with_universe(universe.iter().cloned());
    for result in rdr.records() {
        let record = next_record(result)?;
        let contract = field(&record, dominant_idx, "dominant")?;
        if contract.is_empty() {
            continue;
        }
        table.insert(date_field(&record, date_idx)?, contract);
    }
    info!(
        "loaded dominant contracts for {} instruments from {}",
        table.instrument_count(),
        path.display()
    );
    Ok(table)
}

/// Reads `trade_date,contract,open,close,settle,multiplier` rows. Only the
/// first two columns are mandatory.
pub fn load_market(path: &Path) -> Result<MarketDataTable, SimError> {
    let mut rdr = open_reader(path)?;
    let headers = rdr.headers().map_err(|e| SimError::Database {
        reason: format!("CSV parse error: {}", e),
    })?;
    let date_idx = column(headers, "trade_date", path)?;
    let contract_idx = column(headers, "contract", path)?;
    let open_idx = column(headers, "open", path).ok();
    let close_idx = column(headers, "close", path).ok();
    let settle_idx = column(headers, "settle", path).ok();
    let multiplier_idx = column(headers, "multiplier", path).ok();

    let mut table = MarketDataTable::new();
    for result in rdr.records() {
        let record = next_record(result)?;
        let trade_date = date_field(&record, date_idx)?;
        let contract = field(&record, contract_idx, "contract")?;
        let market = MarketRecord {
            open: optional_f64(&record, open_idx, "open")?,
            close: optional_f64(&record, close_idx, "close")?,
            settle: optional_f64(&record, settle_idx, "settle")?,
            multiplier: optional_f64(&record, multiplier_idx, "multiplier")?,
        };
        table.insert(trade_date, contract, market);
    }
    info!("loaded {} market rows from {}", table.len(), path.display());
    Ok(table)
}

/// Reads `trade_date,code,<sid>` rows; the column named after the signal id
/// holds the weight and empty cells are skipped.
pub fn load_signal(path: &Path, sid: &str) -> Result<SignalTable, SimError> {
    let mut rdr = open_reader(path)?;
    let headers = rdr.headers().map_err(|e| SimError::Database {
        reason: format!("CSV parse error: {}", e),
    })?;
    let date_idx = column(headers, "trade_date", path)?;
    let code_idx = column(headers, "code", path)?;
    let weight_idx = column(headers, sid, path)?;

    let mut table = SignalTable::new(sid);
    for result in rdr.records() {
        let record = next_record(result)?;
        let Some(weight) = optional_f64(&record, Some(weight_idx), sid)? else {
            continue;
        };
        let trade_date = date_field(&record, date_idx)?;
        let code = field(&record, code_idx, "code")?;
        table.insert(trade_date, code, weight);
    }
    info!(
        "loaded signal {} for {} dates from {}",
        sid,
        table.date_count(),
        path.display()
    );
    Ok(table)
}
