//! End-to-end simulation tests.
//!
//! Tests cover:
//! - The single-instrument round trip, filled at close and at open
//! - NAV identity and the last_nav chain across a multi-instrument run
//! - Dust weights, empty signals and replay determinism
//! - Aborting on missing contracts and missing prices without writing output
//! - CSV files on disk through the loaders and the NAV writer
//! - SQLite-backed tables matching the in-memory run

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use futsim::adapters::csv_adapter;
use futsim::adapters::csv_report_adapter::{CsvReportAdapter, NAV_HEADER};
use futsim::cli::{self, LoadedData};
use futsim::domain::account::Snapshot;
use futsim::domain::error::SimError;
use futsim::domain::position::{Direction, PositionKey};
use futsim::domain::simulation::{ExePriceType, Simulation, SimulationConfig};
use futsim::ports::market_port::SignalProvider;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn config(exe_price: ExePriceType) -> SimulationConfig {
    SimulationConfig {
        init_cash: 1_000_000.0,
        cost_rate: 0.0002,
        exe_price,
    }
}

fn run_memory(
    data: &LoadedData,
    sim_config: &SimulationConfig,
    begin: &str,
    stop: &str,
) -> Result<Vec<Snapshot>, SimError> {
    let report = MockReportPort::new();
    let settings = settings(data.signal.sid(), begin, stop, Path::new("unused"));
    cli::simulate(sim_config, &settings, data, &report, false).map(|(_, snaps)| snaps)
}

mod round_trip {
    use super::*;

    #[test]
    fn open_then_close_at_close_price() {
        let data = round_trip_dataset().loaded();
        let snaps = run_memory(&data, &config(ExePriceType::Close), "20250403", "20250407").unwrap();
        assert_eq!(snaps.len(), 2);

        let s0 = &snaps[0];
        assert_eq!(s0.trade_date, d("20250403"));
        assert_abs_diff_eq!(s0.this_day_cost, 200.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s0.this_day_realized_pnl, 0.0);
        assert_abs_diff_eq!(s0.tot_unrealized_pnl, 0.0);
        assert_abs_diff_eq!(s0.nav, 999_800.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s0.ret, -0.0002, epsilon = 1e-12);

        let s1 = &snaps[1];
        assert_eq!(s1.trade_date, d("20250404"));
        assert_abs_diff_eq!(s1.this_day_realized_pnl, 100_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s1.this_day_cost, 220.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s1.tot_realized_pnl, 99_580.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s1.tot_unrealized_pnl, 0.0);
        assert_abs_diff_eq!(s1.nav, 1_099_580.0, epsilon = 1e-6);
        assert_eq!(s1.last_nav, s0.nav);
    }

    #[test]
    fn open_price_fills_differ_from_marks() {
        let data = round_trip_dataset().loaded();
        let snaps = run_memory(&data, &config(ExePriceType::Open), "20250403", "20250407").unwrap();

        // Filled at 100 on the 3rd and closed at 108 on the 4th.
        assert_abs_diff_eq!(snaps[0].this_day_cost, 200.0, epsilon = 1e-6);
        assert_abs_diff_eq!(snaps[1].this_day_realized_pnl, 80_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(snaps[1].this_day_cost, 216.0, epsilon = 1e-6);
        assert_abs_diff_eq!(snaps[1].nav, 1_000_000.0 + 80_000.0 - 416.0, epsilon = 1e-6);
    }

    #[test]
    fn held_position_is_marked_each_day() {
        let data = round_trip_dataset()
            .with_weight("20250403", "CU9999.SHF", 1.0)
            .with_dominant("20250403", "CU2506.SHF")
            .loaded();
        let snaps = run_memory(&data, &config(ExePriceType::Close), "20250403", "20250407").unwrap();

        // Sized against 999,800 at close 100 the target stays 1000 lots, so
        // nothing trades and the gain stays unrealized.
        assert_abs_diff_eq!(snaps[1].this_day_cost, 0.0);
        assert_abs_diff_eq!(snaps[1].tot_unrealized_pnl, 100_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(snaps[1].nav, 1_099_800.0, epsilon = 1e-6);
    }

    #[test]
    fn save_id_names_signal_and_price() {
        let data = round_trip_dataset().loaded();
        let report = MockReportPort::new();
        let settings = settings("mom", "20250403", "20250407", Path::new("unused"));
        cli::simulate(&config(ExePriceType::Open), &settings, &data, &report, false).unwrap();

        let calls = report.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "mom-open");
        assert_eq!(calls[0].1.len(), 2);
    }
}

mod accounting_properties {
    use super::*;

    fn big_config() -> SimulationConfig {
        SimulationConfig {
            init_cash: 10_000_000.0,
            ..config(ExePriceType::Close)
        }
    }

    #[test]
    fn nav_identity_and_last_nav_chain() {
        let data = multi_instrument_dataset().loaded();
        let snaps = run_memory(&data, &big_config(), "20250402", "20250409").unwrap();
        assert_eq!(snaps.len(), 5);

        for (i, snap) in snaps.iter().enumerate() {
            assert_eq!(
                snap.nav,
                snap.init_cash + snap.tot_realized_pnl + snap.tot_unrealized_pnl
            );
            assert_eq!(snap.ret, snap.nav / snap.last_nav - 1.0);
            if i == 0 {
                assert_eq!(snap.last_nav, snap.init_cash);
            } else {
                assert_eq!(snap.last_nav, snaps[i - 1].nav);
            }
        }
    }

    #[test]
    fn costs_accumulate_into_realized() {
        let data = multi_instrument_dataset().loaded();
        let snaps = run_memory(&data, &big_config(), "20250402", "20250409").unwrap();

        let mut realized = 0.0;
        for snap in &snaps {
            realized += snap.this_day_realized_pnl - snap.this_day_cost;
            assert_abs_diff_eq!(snap.tot_realized_pnl, realized, epsilon = 1e-6);
            assert!(snap.this_day_cost >= 0.0);
        }
    }

    #[test]
    fn replay_is_bit_identical() {
        let data = multi_instrument_dataset().loaded();
        let first = run_memory(&data, &big_config(), "20250402", "20250409").unwrap();
        let second = run_memory(&data, &big_config(), "20250402", "20250409").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn book_follows_last_signal() {
        let data = multi_instrument_dataset().loaded();
        let mut sim = Simulation::new(&big_config(), &data.signal, &data.dominant, &data.market);
        for (sig, exe) in data.calendar.sig_exe_pairs(d("20250402"), d("20250409")).unwrap() {
            sim.step(sig, exe).unwrap();
        }
        // The last signal read is the 7th, which carries only a long AL weight.
        let keys: Vec<&PositionKey> = sim.account().positions().keys().collect();
        assert_eq!(keys, vec![&PositionKey::new("AL2505.SHF", Direction::Long)]);
        assert!(sim.account().positions().values().all(|p| p.quantity > 0));
    }

    #[test]
    fn dust_weights_never_trade() {
        let data = Dataset::new("tiny")
            .with_dates(&["20250402", "20250403", "20250404"])
            .with_dominant("20250402", "CU2506.SHF")
            .with_dominant("20250403", "CU2506.SHF")
            .with_bar("20250402", "CU2506.SHF", 100.0, 100.0, 10.0)
            .with_bar("20250403", "CU2506.SHF", 100.0, 101.0, 10.0)
            .with_bar("20250404", "CU2506.SHF", 100.0, 102.0, 10.0)
            .with_weight("20250402", "CU9999.SHF", 5e-7)
            .with_weight("20250403", "CU9999.SHF", -5e-7)
            .loaded();
        let snaps = run_memory(&data, &config(ExePriceType::Close), "20250403", "20250405").unwrap();
        assert_eq!(snaps.len(), 2);
        for snap in &snaps {
            assert_eq!(snap.nav, 1_000_000.0);
            assert_eq!(snap.this_day_cost, 0.0);
            assert_eq!(snap.ret, 0.0);
        }
    }

    #[test]
    fn empty_signal_days_still_snapshot() {
        let data = round_trip_dataset().loaded();
        let snaps = run_memory(&data, &config(ExePriceType::Close), "20250404", "20250408").unwrap();
        // Signal on the 3rd is empty and nothing is held.
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].nav, 1_000_000.0);
        assert_eq!(snaps[1].nav, 1_000_000.0);
    }
}

mod aborts {
    use super::*;

    #[test]
    fn missing_exe_price_is_data_gap() {
        let data = round_trip_dataset()
            .without_bar("20250404", "CU2506.SHF")
            .loaded();
        let report = MockReportPort::new();
        let settings = settings("mom", "20250403", "20250407", Path::new("unused"));
        let err = cli::simulate(&config(ExePriceType::Close), &settings, &data, &report, false)
            .unwrap_err();

        assert!(matches!(err, SimError::DataGap { ref contract, .. } if contract == "CU2506.SHF"));
        assert!(err.is_data_gap());
        assert!(report.calls.borrow().is_empty());
    }

    #[test]
    fn unresolved_instrument_is_missing_contract() {
        let data = round_trip_dataset()
            .with_weight("20250402", "AL9999.SHF", 0.5)
            .loaded();
        let err = run_memory(&data, &config(ExePriceType::Close), "20250403", "20250407").unwrap_err();
        assert!(
            matches!(err, SimError::MissingContract { ref instrument, .. } if instrument == "AL9999.SHF")
        );
    }

    #[test]
    fn begin_before_calendar_is_calendar_error() {
        let data = round_trip_dataset().loaded();
        let err = run_memory(&data, &config(ExePriceType::Close), "20250402", "20250407").unwrap_err();
        assert!(matches!(err, SimError::Calendar { .. }));
    }

    #[test]
    fn zero_multiplier_is_rejected() {
        let data = Dataset::new("mom")
            .with_dates(&["20250402", "20250403"])
            .with_dominant("20250402", "CU2506.SHF")
            .with_bar("20250402", "CU2506.SHF", 100.0, 100.0, 0.0)
            .with_bar("20250403", "CU2506.SHF", 100.0, 100.0, 0.0)
            .with_weight("20250402", "CU9999.SHF", 1.0)
            .loaded();
        let err = run_memory(&data, &config(ExePriceType::Close), "20250403", "20250404").unwrap_err();
        assert!(matches!(err, SimError::InvalidMarketData { ref field, .. } if field == "multiplier"));
    }
}

mod csv_files {
    use super::*;

    #[test]
    fn loads_csv_and_writes_nav_file() {
        let dir = TempDir::new().unwrap();
        round_trip_dataset().write_csv(dir.path());

        let data = LoadedData {
            calendar: csv_adapter::load_calendar(&dir.path().join("calendar.csv")).unwrap(),
            dominant: csv_adapter::load_dominant(&dir.path().join("dominant.csv"), &[]).unwrap(),
            market: csv_adapter::load_market(&dir.path().join("market.csv")).unwrap(),
            signal: csv_adapter::load_signal(&dir.path().join("signal.csv"), "mom").unwrap(),
        };

        let out = dir.path().join("out");
        let report = CsvReportAdapter::new(&out, "v1");
        let settings = settings("mom", "20250403", "20250407", &out);
        let (path, snaps) =
            cli::simulate(&config(ExePriceType::Close), &settings, &data, &report, false).unwrap();

        assert_eq!(path, out.join("hsim_mom-close.v1.csv"));
        assert_eq!(snaps.len(), 2);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], NAV_HEADER.join(","));
        assert!(lines[1].starts_with("20250403,1000000.00000000,"));
        assert!(lines[2].starts_with(
            "20250404,1000000.00000000,99580.00000000,100000.00000000,220.00000000,0.00000000,"
        ));
        assert!(lines[2].ends_with(",1099580.00000000,1.09958000,0.09979996"));
    }

    #[test]
    fn csv_and_memory_runs_agree() {
        let dir = TempDir::new().unwrap();
        let ds = multi_instrument_dataset();
        ds.write_csv(dir.path());

        let from_csv = LoadedData {
            calendar: csv_adapter::load_calendar(&dir.path().join("calendar.csv")).unwrap(),
            dominant: csv_adapter::load_dominant(&dir.path().join("dominant.csv"), &[]).unwrap(),
            market: csv_adapter::load_market(&dir.path().join("market.csv")).unwrap(),
            signal: csv_adapter::load_signal(&dir.path().join("signal.csv"), "carry").unwrap(),
        };
        let cfg = SimulationConfig {
            init_cash: 10_000_000.0,
            ..config(ExePriceType::Open)
        };

        let a = run_memory(&from_csv, &cfg, "20250402", "20250409").unwrap();
        let b = run_memory(&ds.loaded(), &cfg, "20250402", "20250409").unwrap();
        assert_eq!(a, b);
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_tables {
    use super::*;
    use futsim::adapters::sqlite_adapter::SqliteAdapter;

    fn seed(ds: &Dataset) -> SqliteAdapter {
        let db = SqliteAdapter::in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.insert_calendar(&ds.dates).unwrap();
        let dominant: Vec<_> = ds.dominant.iter().map(|(dt, c)| (*dt, c.as_str())).collect();
        db.insert_dominant(&dominant).unwrap();
        let bars: Vec<_> = ds.bars.iter().map(|(dt, c, r)| (*dt, c.as_str(), *r)).collect();
        db.insert_market(&bars).unwrap();
        let weights: Vec<_> = ds.weights.iter().map(|(dt, i, w)| (*dt, i.as_str(), *w)).collect();
        db.insert_signal(&ds.sid, &weights).unwrap();
        db
    }

    #[test]
    fn sqlite_and_memory_runs_agree() {
        let ds = multi_instrument_dataset();
        let db = seed(&ds);
        let from_db = LoadedData {
            calendar: db.load_calendar().unwrap(),
            dominant: db.load_dominant(&[]).unwrap(),
            market: db.load_market().unwrap(),
            signal: db.load_signal("carry").unwrap(),
        };
        let cfg = SimulationConfig {
            init_cash: 10_000_000.0,
            ..config(ExePriceType::Close)
        };

        let a = run_memory(&from_db, &cfg, "20250402", "20250409").unwrap();
        let b = run_memory(&ds.loaded(), &cfg, "20250402", "20250409").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn universe_excluding_signalled_instrument_aborts() {
        let ds = multi_instrument_dataset();
        let db = seed(&ds);
        let data = LoadedData {
            calendar: db.load_calendar().unwrap(),
            dominant: db.load_dominant(&["CU9999.SHF".to_string()]).unwrap(),
            market: db.load_market().unwrap(),
            signal: db.load_signal("carry").unwrap(),
        };
        let err = run_memory(&data, &config(ExePriceType::Close), "20250402", "20250409").unwrap_err();
        assert!(matches!(err, SimError::MissingContract { .. }));
    }
}
