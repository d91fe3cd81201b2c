//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_store::{DominantContractTable, MarketDataTable, SignalTable};
use crate::domain::account::{Positions, Snapshot};
use crate::domain::calendar::{parse_trade_date, TradeCalendar, COMPACT_DATE};
use crate::domain::config_validation::{
    data_source, parse_date, read_f64, validate_data_config, validate_simulation_config,
};
use crate::domain::error::SimError;
use crate::domain::simulation::{ExePriceType, Simulation, SimulationConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_VID: &str = "v0";
pub const DEFAULT_SAVE_DIR: &str = "simulations";

#[derive(Parser, Debug)]
#[command(name = "futsim", about = "Daily futures portfolio simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation and write its NAV series
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// First execution date (YYYYMMDD), overrides begin_date
        #[arg(long)]
        begin: Option<String>,
        /// Exclusive end date (YYYYMMDD), overrides stop_date
        #[arg(long)]
        stop: Option<String>,
        /// Version tag used in the output file name
        #[arg(long)]
        vid: Option<String>,
        /// Print each day's snapshot and positions
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Everything a run needs besides the engine parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub signal_id: String,
    pub begin: NaiveDate,
    pub stop: NaiveDate,
    pub vid: String,
    pub save_dir: PathBuf,
    pub universe: Vec<String>,
}

/// Provider tables loaded once before the loop.
pub struct LoadedData {
    pub calendar: TradeCalendar,
    pub dominant: DominantContractTable,
    pub market: MarketDataTable,
    pub signal: SignalTable,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Simulate {
            config,
            begin,
            stop,
            vid,
            verbose,
        } => run_simulate(
            &config,
            begin.as_deref(),
            stop.as_deref(),
            vid.as_deref(),
            verbose,
        ),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_simulate(
    config_path: &Path,
    begin: Option<&str>,
    stop: Option<&str>,
    vid: Option<&str>,
    verbose: bool,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate before touching any data
    if let Err(e) = validate_simulation_config(&adapter).and_then(|_| validate_data_config(&adapter))
    {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let sim_config = match build_simulation_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let settings = match build_run_settings(&adapter, begin, stop, vid) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Load data
    eprintln!("Loading data for signal {}...", settings.signal_id);
    let data = match load_data(&adapter, &settings) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Run and write
    eprintln!(
        "Simulating {} from {} to {} (exe_price={}, cost_rate={})",
        settings.signal_id,
        settings.begin.format(COMPACT_DATE),
        settings.stop.format(COMPACT_DATE),
        sim_config.exe_price,
        sim_config.cost_rate
    );
    let report = CsvReportAdapter::new(&settings.save_dir, &settings.vid);
    match simulate(&sim_config, &settings, &data, &report, verbose) {
        Ok((path, snapshots)) => {
            print_summary(&snapshots);
            eprintln!("NAV series written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(hint) = failure_hint(&e) {
                eprintln!("hint: {hint}");
            }
            (&e).into()
        }
    }
}

/// Extra guidance for run failures that usually point at the inputs or at the
/// engine rather than at the config.
pub fn failure_hint(err: &SimError) -> Option<&'static str> {
    if err.is_data_gap() {
        Some("check that the dominant and market tables cover every date in the range")
    } else if err.is_accounting() {
        Some("the position book is inconsistent; rerun with RUST_LOG=trace to see each trade")
    } else {
        None
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_simulation_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_data_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("Configuration is valid");
    ExitCode::SUCCESS
}

pub fn build_simulation_config(adapter: &dyn ConfigPort) -> Result<SimulationConfig, SimError> {
    let defaults = SimulationConfig::default();
    let exe_price = match adapter.get_string("simulation", "exe_price") {
        Some(value) => {
            value
                .parse::<ExePriceType>()
                .map_err(|reason| SimError::ConfigInvalid {
                    section: "simulation".into(),
                    key: "exe_price".into(),
                    reason,
                })?
        }
        None => defaults.exe_price,
    };

    Ok(SimulationConfig {
        init_cash: read_f64(adapter, "simulation", "init_cash", defaults.init_cash)?,
        cost_rate: read_f64(adapter, "simulation", "cost_rate", defaults.cost_rate)?,
        exe_price,
    })
}

fn override_date(value: &str, key: &str) -> Result<NaiveDate, SimError> {
    parse_trade_date(value).ok_or_else(|| SimError::ConfigInvalid {
        section: "simulation".into(),
        key: key.into(),
        reason: format!("invalid {key} '{value}', expected YYYYMMDD"),
    })
}

/// Resolves run settings from config; command-line values win.
pub fn build_run_settings(
    adapter: &dyn ConfigPort,
    begin: Option<&str>,
    stop: Option<&str>,
    vid: Option<&str>,
) -> Result<RunSettings, SimError> {
    let signal_id = adapter
        .get_string("simulation", "signal_id")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SimError::ConfigMissing {
            section: "simulation".into(),
            key: "signal_id".into(),
        })?;

    let begin = match begin {
        Some(value) => override_date(value, "begin_date")?,
        None => parse_date(adapter, "begin_date")?,
    };
    let stop = match stop {
        Some(value) => override_date(value, "stop_date")?,
        None => parse_date(adapter, "stop_date")?,
    };
    if begin >= stop {
        return Err(SimError::ConfigInvalid {
            section: "simulation".into(),
            key: "begin_date".into(),
            reason: "begin_date must be before stop_date".into(),
        });
    }

    let vid = vid
        .map(str::to_string)
        .or_else(|| adapter.get_string("simulation", "vid"))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VID.to_string());
    let save_dir = adapter
        .get_string("simulation", "save_dir")
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SAVE_DIR.to_string());

    Ok(RunSettings {
        signal_id,
        begin,
        stop,
        vid,
        save_dir: PathBuf::from(save_dir),
        universe: adapter.get_list("simulation", "universe"),
    })
}

fn data_path(adapter: &dyn ConfigPort, key: &str) -> Result<PathBuf, SimError> {
    adapter
        .get_string("data", key)
        .map(|s| PathBuf::from(s.trim()))
        .ok_or_else(|| SimError::ConfigMissing {
            section: "data".into(),
            key: key.into(),
        })
}

/// Loads the calendar and the provider tables from the configured source.
pub fn load_data(adapter: &dyn ConfigPort, settings: &RunSettings) -> Result<LoadedData, SimError> {
    match data_source(adapter)?.as_str() {
        "sqlite" => load_sqlite_data(adapter, settings),
        _ => Ok(LoadedData {
            calendar: csv_adapter::load_calendar(&data_path(adapter, "calendar")?)?,
            dominant: csv_adapter::load_dominant(
                &data_path(adapter, "dominant")?,
                &settings.universe,
            )?,
            market: csv_adapter::load_market(&data_path(adapter, "market")?)?,
            signal: csv_adapter::load_signal(&data_path(adapter, "signal")?, &settings.signal_id)?,
        }),
    }
}

#[cfg(feature = "sqlite")]
fn load_sqlite_data(adapter: &dyn ConfigPort, settings: &RunSettings) -> Result<LoadedData, SimError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let db = SqliteAdapter::from_config(adapter)?;
    Ok(LoadedData {
        calendar: db.load_calendar()?,
        dominant: db.load_dominant(&settings.universe)?,
        market: db.load_market()?,
        signal: db.load_signal(&settings.signal_id)?,
    })
}

#[cfg(not(feature = "sqlite"))]
fn load_sqlite_data(_adapter: &dyn ConfigPort, _settings: &RunSettings) -> Result<LoadedData, SimError> {
    Err(SimError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "built without the sqlite feature".into(),
    })
}

/// Runs the whole date range and writes the NAV series. Nothing is written
/// when the run aborts.
pub fn simulate(
    sim_config: &SimulationConfig,
    settings: &RunSettings,
    data: &LoadedData,
    report: &dyn ReportPort,
    verbose: bool,
) -> Result<(PathBuf, Vec<Snapshot>), SimError> {
    let pairs = data.calendar.sig_exe_pairs(settings.begin, settings.stop)?;
    let mut sim = Simulation::new(sim_config, &data.signal, &data.dominant, &data.market);

    for (sig_date, exe_date) in &pairs {
        let snap = sim.step(*sig_date, *exe_date)?;
        if verbose {
            eprintln!("{}", format_snapshot(&snap));
            eprint!("{}", format_positions(sim.account().positions()));
        }
    }

    let snapshots = sim.account().export();
    let path = report.write_nav(&sim.save_id(), &snapshots)?;
    Ok((path, snapshots))
}

pub fn format_snapshot(snap: &Snapshot) -> String {
    format!(
        "{} nav={:.2} realized={:.2} cost={:.2} unrealized={:.2} ret={:+.4}%",
        snap.trade_date.format(COMPACT_DATE),
        snap.nav,
        snap.this_day_realized_pnl,
        snap.this_day_cost,
        snap.tot_unrealized_pnl,
        snap.ret * 100.0
    )
}

/// One indented line per open position, in key order.
pub fn format_positions(positions: &Positions) -> String {
    positions
        .values()
        .map(|pos| format!("  {pos}\n"))
        .collect()
}

fn print_summary(snapshots: &[Snapshot]) {
    let Some(last) = snapshots.last() else {
        eprintln!("No trade dates in range; empty NAV series");
        return;
    };
    eprintln!();
    eprintln!("=== Simulation Summary ===");
    eprintln!("Trading days:      {}", snapshots.len());
    eprintln!("Final NAV:         {:.2}", last.nav);
    eprintln!("Total return:      {:.4}%", (last.navps - 1.0) * 100.0);
    eprintln!("Realized P&L:      {:.2}", last.tot_realized_pnl);
    eprintln!("Unrealized P&L:    {:.2}", last.tot_unrealized_pnl);
    eprintln!(
        "Total costs:       {:.2}",
        snapshots.iter().map(|s| s.this_day_cost).sum::<f64>()
    );
}
