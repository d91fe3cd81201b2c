#![allow(dead_code)]

use chrono::NaiveDate;
use futsim::adapters::memory_store::{
    DominantContractTable, MarketDataTable, MarketRecord, SignalTable,
};
use futsim::cli::{LoadedData, RunSettings};
use futsim::domain::account::Snapshot;
use futsim::domain::calendar::TradeCalendar;
use futsim::domain::error::SimError;
use futsim::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y%m%d").unwrap()
}

/// A small market: calendar, dominant contracts, daily bars and one signal.
/// It can be turned into in-memory tables or written out as CSV files.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub sid: String,
    pub dates: Vec<NaiveDate>,
    pub dominant: Vec<(NaiveDate, String)>,
    pub bars: Vec<(NaiveDate, String, MarketRecord)>,
    pub weights: Vec<(NaiveDate, String, f64)>,
}

impl Dataset {
    pub fn new(sid: &str) -> Self {
        Self {
            sid: sid.to_string(),
            dates: Vec::new(),
            dominant: Vec::new(),
            bars: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn with_dates(mut self, dates: &[&str]) -> Self {
        self.dates.extend(dates.iter().map(|s| d(s)));
        self
    }

    pub fn with_dominant(mut self, date: &str, contract: &str) -> Self {
        self.dominant.push((d(date), contract.to_string()));
        self
    }

    pub fn with_bar(
        mut self,
        date: &str,
        contract: &str,
        open: f64,
        close: f64,
        multiplier: f64,
    ) -> Self {
        self.bars.push((
            d(date),
            contract.to_string(),
            MarketRecord {
                open: Some(open),
                close: Some(close),
                settle: Some(close),
                multiplier: Some(multiplier),
            },
        ));
        self
    }

    pub fn with_weight(mut self, date: &str, instrument: &str, weight: f64) -> Self {
        self.weights.push((d(date), instrument.to_string(), weight));
        self
    }

    pub fn without_bar(mut self, date: &str, contract: &str) -> Self {
        let date = d(date);
        self.bars.retain(|(dt, c, _)| !(*dt == date && c == contract));
        self
    }

    pub fn loaded(&self) -> LoadedData {
        let mut dominant = DominantContractTable::new();
        for (date, contract) in &self.dominant {
            dominant.insert(*date, contract);
        }
        let mut market = MarketDataTable::new();
        for (date, contract, record) in &self.bars {
            market.insert(*date, contract, *record);
        }
        let mut signal = SignalTable::new(self.sid.clone());
        for (date, instrument, weight) in &self.weights {
            signal.insert(*date, instrument, *weight);
        }
        LoadedData {
            calendar: TradeCalendar::new(self.dates.clone()).unwrap(),
            dominant,
            market,
            signal,
        }
    }

    /// Writes calendar.csv, dominant.csv, market.csv and signal.csv into `dir`.
    pub fn write_csv(&self, dir: &Path) {
        let mut calendar = String::from("trade_date\n");
        for date in &self.dates {
            writeln!(calendar, "{}", date.format("%Y%m%d")).unwrap();
        }
        fs::write(dir.join("calendar.csv"), calendar).unwrap();

        let mut dominant = String::from("trade_date,dominant\n");
        for (date, contract) in &self.dominant {
            writeln!(dominant, "{},{}", date.format("%Y%m%d"), contract).unwrap();
        }
        fs::write(dir.join("dominant.csv"), dominant).unwrap();

        let mut market = String::from("trade_date,contract,open,close,settle,multiplier\n");
        for (date, contract, r) in &self.bars {
            writeln!(
                market,
                "{},{},{},{},{},{}",
                date.format("%Y%m%d"),
                contract,
                r.open.unwrap(),
                r.close.unwrap(),
                r.settle.unwrap(),
                r.multiplier.unwrap()
            )
            .unwrap();
        }
        fs::write(dir.join("market.csv"), market).unwrap();

        let mut signal = format!("trade_date,code,{}\n", self.sid);
        for (date, instrument, weight) in &self.weights {
            writeln!(signal, "{},{},{}", date.format("%Y%m%d"), instrument, weight).unwrap();
        }
        fs::write(dir.join("signal.csv"), signal).unwrap();
    }
}

/// One instrument, weight 1.0 then flat, close 100 then 110, multiplier 10.
pub fn round_trip_dataset() -> Dataset {
    Dataset::new("mom")
        .with_dates(&["20250402", "20250403", "20250404", "20250407"])
        .with_dominant("20250402", "CU2506.SHF")
        .with_bar("20250402", "CU2506.SHF", 99.0, 100.0, 10.0)
        .with_bar("20250403", "CU2506.SHF", 100.0, 100.0, 10.0)
        .with_bar("20250404", "CU2506.SHF", 108.0, 110.0, 10.0)
        .with_bar("20250407", "CU2506.SHF", 111.0, 112.0, 10.0)
        .with_weight("20250402", "CU9999.SHF", 1.0)
}

/// Two instruments over a week, with a dominant roll and a direction flip.
pub fn multi_instrument_dataset() -> Dataset {
    let mut ds = Dataset::new("carry").with_dates(&[
        "20250401", "20250402", "20250403", "20250404", "20250407", "20250408",
    ]);
    let days = ["20250401", "20250402", "20250403", "20250404", "20250407", "20250408"];
    for (i, day) in days.iter().enumerate() {
        let step = i as f64;
        let cu = if i < 3 { "CU2505.SHF" } else { "CU2506.SHF" };
        ds = ds
            .with_dominant(day, cu)
            .with_dominant(day, "AL2505.SHF")
            .with_bar(day, "CU2505.SHF", 78_000.0 + 90.0 * step, 78_050.0 + 110.0 * step, 5.0)
            .with_bar(day, "CU2506.SHF", 78_200.0 + 70.0 * step, 78_260.0 + 95.0 * step, 5.0)
            .with_bar(day, "AL2505.SHF", 20_100.0 - 40.0 * step, 20_080.0 - 35.0 * step, 5.0);
    }
    ds.with_weight("20250401", "CU9999.SHF", 0.3)
        .with_weight("20250401", "AL9999.SHF", -0.2)
        .with_weight("20250402", "CU9999.SHF", 0.35)
        .with_weight("20250402", "AL9999.SHF", -0.2)
        .with_weight("20250403", "CU9999.SHF", 0.35)
        .with_weight("20250403", "AL9999.SHF", 0.1)
        .with_weight("20250404", "CU9999.SHF", 0.2)
        .with_weight("20250407", "AL9999.SHF", 0.1)
}

pub fn settings(sid: &str, begin: &str, stop: &str, save_dir: &Path) -> RunSettings {
    RunSettings {
        signal_id: sid.to_string(),
        begin: d(begin),
        stop: d(stop),
        vid: "v1".to_string(),
        save_dir: save_dir.to_path_buf(),
        universe: Vec::new(),
    }
}

/// Records every write instead of touching the filesystem.
pub struct MockReportPort {
    pub calls: RefCell<Vec<(String, Vec<Snapshot>)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReportPort {
    fn write_nav(&self, save_id: &str, snapshots: &[Snapshot]) -> Result<PathBuf, SimError> {
        self.calls
            .borrow_mut()
            .push((save_id.to_string(), snapshots.to_vec()));
        Ok(PathBuf::from(format!("hsim_{save_id}.mock.csv")))
    }
}
