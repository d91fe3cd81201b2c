//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for futsim.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("no dominant contract for {instrument} on {date}")]
    MissingContract { date: NaiveDate, instrument: String },

    #[error("no {field} for {contract} on {date}")]
    DataGap {
        date: NaiveDate,
        contract: String,
        field: String,
    },

    #[error("invalid {field} {value} for {contract} on {date}")]
    InvalidMarketData {
        date: NaiveDate,
        contract: String,
        field: String,
        value: f64,
    },

    #[error("cannot close {trade_qty} of {key}: only {held_qty} held")]
    OverClose {
        key: String,
        trade_qty: u64,
        held_qty: u64,
    },

    #[error("cannot close {key}: position not in account")]
    UnknownPosition { key: String },

    #[error("invalid offset code {0}")]
    InvalidOffset(i8),

    #[error("trade for {trade_key} applied to position {position_key}")]
    KeyMismatch {
        trade_key: String,
        position_key: String,
    },

    #[error("calendar error: {reason}")]
    Calendar { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// True when a provider had no value for a required key.
    pub fn is_data_gap(&self) -> bool {
        matches!(
            self,
            SimError::MissingContract { .. } | SimError::DataGap { .. }
        )
    }

    /// True for the accounting faults that indicate a sizing or diffing defect.
    pub fn is_accounting(&self) -> bool {
        matches!(
            self,
            SimError::OverClose { .. }
                | SimError::UnknownPosition { .. }
                | SimError::InvalidOffset(_)
                | SimError::KeyMismatch { .. }
        )
    }
}

impl From<&SimError> for std::process::ExitCode {
    fn from(err: &SimError) -> Self {
        let code: u8 = match err {
            SimError::Io(_) => 1,
            SimError::ConfigParse { .. }
            | SimError::ConfigMissing { .. }
            | SimError::ConfigInvalid { .. } => 2,
            SimError::Database { .. } | SimError::DatabaseQuery { .. } => 3,
            SimError::MissingContract { .. }
            | SimError::DataGap { .. }
            | SimError::InvalidMarketData { .. }
            | SimError::Calendar { .. } => 4,
            SimError::OverClose { .. }
            | SimError::UnknownPosition { .. }
            | SimError::InvalidOffset(_)
            | SimError::KeyMismatch { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
