//! Data provider port traits consumed by the simulation engine.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::SimError;

/// Daily market data fields a provider must serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketField {
    Open,
    Close,
    Settle,
    Multiplier,
}

impl MarketField {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketField::Open => "open",
            MarketField::Close => "close",
            MarketField::Settle => "settle",
            MarketField::Multiplier => "multiplier",
        }
    }
}

impl fmt::Display for MarketField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait MajorContractResolver {
    /// The dominant contract traded for `instrument` on `trade_date`.
    fn resolve(&self, trade_date: NaiveDate, instrument: &str) -> Result<String, SimError>;
}

pub trait MarketDataProvider {
    fn lookup(
        &self,
        trade_date: NaiveDate,
        contract: &str,
        field: MarketField,
    ) -> Result<f64, SimError>;
}

pub trait SignalProvider {
    fn sid(&self) -> &str;

    /// Instrument weights observed on `trade_date`; empty when there is none.
    fn signal_for(&self, trade_date: NaiveDate) -> BTreeMap<String, f64>;
}
