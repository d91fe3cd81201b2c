//! In-memory provider tables.
//!
//! Loaders batch-read a data source once into these tables; the simulation
//! then queries them through the port traits without further I/O.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::contract::instrument_of;
use crate::domain::error::SimError;
use crate::ports::market_port::{
    MajorContractResolver, MarketDataProvider, MarketField, SignalProvider,
};

/// Dominant contract per instrument per date.
#[derive(Debug, Clone, Default)]
pub struct DominantContractTable {
    universe: Option<HashSet<String>>,
    contracts: HashMap<String, HashMap<NaiveDate, String>>,
}

impl DominantContractTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the given instruments; an empty universe keeps everything.
    pub fn with_universe<I, S>(universe: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let universe: HashSet<String> = universe.into_iter().map(Into::into).collect();
        DominantContractTable {
            universe: if universe.is_empty() {
                None
            } else {
                Some(universe)
            },
            contracts: HashMap::new(),
        }
    }

    /// Records `contract` as dominant on `trade_date` for its instrument.
    /// Returns false when the instrument is outside the universe.
    pub fn insert(&mut self, trade_date: NaiveDate, contract: &str) -> bool {
        let instrument = instrument_of(contract);
        if let Some(universe) = &self.universe {
            if !universe.contains(&instrument) {
                return false;
            }
        }
        self.contracts
            .entry(instrument)
            .or_default()
            .insert(trade_date, contract.to_string());
        true
    }

    pub fn instrument_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn len(&self) -> usize {
        self.contracts.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MajorContractResolver for DominantContractTable {
    fn resolve(&self, trade_date: NaiveDate, instrument: &str) -> Result<String, SimError> {
        self.contracts
            .get(instrument)
            .and_then(|by_date| by_date.get(&trade_date))
            .cloned()
            .ok_or_else(|| SimError::MissingContract {
                date: trade_date,
                instrument: instrument.to_string(),
            })
    }
}

/// One contract's daily fields. Absent fields stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketRecord {
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub settle: Option<f64>,
    pub multiplier: Option<f64>,
}

impl MarketRecord {
    pub fn get(&self, field: MarketField) -> Option<f64> {
        match field {
            MarketField::Open => self.open,
            MarketField::Close => self.close,
            MarketField::Settle => self.settle,
            MarketField::Multiplier => self.multiplier,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketDataTable {
    records: HashMap<(NaiveDate, String), MarketRecord>,
}

impl MarketDataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, trade_date: NaiveDate, contract: &str, record: MarketRecord) {
        self.records
            .insert((trade_date, contract.to_string()), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MarketDataProvider for MarketDataTable {
    fn lookup(
        &self,
        trade_date: NaiveDate,
        contract: &str,
        field: MarketField,
    ) -> Result<f64, SimError> {
        self.records
            .get(&(trade_date, contract.to_string()))
            .and_then(|record| record.get(field))
            .ok_or_else(|| SimError::DataGap {
                date: trade_date,
                contract: contract.to_string(),
                field: field.to_string(),
            })
    }
}

/// Weights of one signal, by date then instrument.
#[derive(Debug, Clone)]
pub struct SignalTable {
    sid: String,
    weights: HashMap<NaiveDate, BTreeMap<String, f64>>,
}

impl SignalTable {
    pub fn new(sid: impl Into<String>) -> Self {
        SignalTable {
            sid: sid.into(),
            weights: HashMap::new(),
        }
    }

    pub fn insert(&mut self, trade_date: NaiveDate, instrument: &str, weight: f64) {
        self.weights
            .entry(trade_date)
            .or_default()
            .insert(instrument.to_string(), weight);
    }

    pub fn date_count(&self) -> usize {
        self.weights.len()
    }
}

impl SignalProvider for SignalTable {
    fn sid(&self) -> &str {
        &self.sid
    }

    fn signal_for(&self, trade_date: NaiveDate) -> BTreeMap<String, f64> {
        self.weights.get(&trade_date).cloned().unwrap_or_default()
    }
}
