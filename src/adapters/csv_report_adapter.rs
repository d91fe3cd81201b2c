//! CSV writer for the NAV snapshot series.

use log::info;
use std::fs;
use std::path::PathBuf;

use crate::domain::account::Snapshot;
use crate::domain::calendar::COMPACT_DATE;
use crate::domain::error::SimError;
use crate::ports::report_port::ReportPort;

pub const NAV_HEADER: [&str; 10] = [
    "trade_date",
    "init_cash",
    "tot_realized_pnl",
    "this_day_realized_pnl",
    "this_day_cost",
    "tot_unrealized_pnl",
    "last_nav",
    "nav",
    "navps",
    "ret",
];

/// Writes `hsim_{save_id}.{vid}.csv` into `save_dir`, creating it if needed.
pub struct CsvReportAdapter {
    save_dir: PathBuf,
    vid: String,
}

impl CsvReportAdapter {
    pub fn new(save_dir: impl Into<PathBuf>, vid: impl Into<String>) -> Self {
        Self {
            save_dir: save_dir.into(),
            vid: vid.into(),
        }
    }

    pub fn nav_path(&self, save_id: &str) -> PathBuf {
        self.save_dir
            .join(format!("hsim_{}.{}.csv", save_id, self.vid))
    }
}

fn nav_row(snap: &Snapshot) -> [String; 10] {
    [
        snap.trade_date.format(COMPACT_DATE).to_string(),
        format!("{:.8}", snap.init_cash),
        format!("{:.8}", snap.tot_realized_pnl),
        format!("{:.8}", snap.this_day_realized_pnl),
        format!("{:.8}", snap.this_day_cost),
        format!("{:.8}", snap.tot_unrealized_pnl),
        format!("{:.8}", snap.last_nav),
        format!("{:.8}", snap.nav),
        format!("{:.8}", snap.navps),
        format!("{:.8}", snap.ret),
    ]
}

impl ReportPort for CsvReportAdapter {
    fn write_nav(&self, save_id: &str, snapshots: &[Snapshot]) -> Result<PathBuf, SimError> {
        fs::create_dir_all(&self.save_dir)?;
        let path = self.nav_path(save_id);

        let write_err = |e: csv::Error| SimError::Io(std::io::Error::other(format!(
            "failed to write {}: {}",
            path.display(),
            e
        )));
        let mut wtr = csv::Writer::from_path(&path).map_err(write_err)?;
        wtr.write_record(NAV_HEADER).map_err(write_err)?;
        for snap in snapshots {
            wtr.write_record(nav_row(snap)).map_err(write_err)?;
        }
        wtr.flush()?;

        info!("wrote {} NAV rows to {}", snapshots.len(), path.display());
        Ok(path)
    }
}
