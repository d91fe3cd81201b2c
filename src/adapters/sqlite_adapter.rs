//! SQLite data adapter.
//!
//! Each loader reads a whole table once into the in-memory provider tables.
//! Dates are stored as `YYYYMMDD` text.

use chrono::NaiveDate;
use log::info;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::adapters::memory_store::{
    DominantContractTable, MarketDataTable, MarketRecord, SignalTable,
};
use crate::domain::calendar::{parse_trade_date, TradeCalendar, COMPACT_DATE};
use crate::domain::error::SimError;
use crate::ports::config_port::ConfigPort;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> SimError {
    SimError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn stored_date(value: &str) -> Result<NaiveDate, SimError> {
    parse_trade_date(value).ok_or_else(|| SimError::Database {
        reason: format!("invalid stored date '{value}'"),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SimError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| SimError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| SimError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SimError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| SimError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SimError> {
        self.pool.get().map_err(|e: r2d2::Error| SimError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), SimError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trade_calendar (
                trade_date TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS future_dominant (
                trade_date TEXT NOT NULL,
                dominant TEXT NOT NULL,
                PRIMARY KEY (trade_date, dominant)
            );
            CREATE TABLE IF NOT EXISTS future_bar_1day (
                trade_date TEXT NOT NULL,
                contract TEXT NOT NULL,
                open REAL,
                close REAL,
                settle REAL,
                multiplier REAL,
                PRIMARY KEY (trade_date, contract)
            );
            CREATE TABLE IF NOT EXISTS signal (
                trade_date TEXT NOT NULL,
                code TEXT NOT NULL,
                sid TEXT NOT NULL,
                weight REAL NOT NULL,
                PRIMARY KEY (trade_date, code, sid)
            );
            CREATE INDEX IF NOT EXISTS idx_signal_sid ON signal(sid);",
        )
        .map_err(query_err)?;
        Ok(())
    }

    pub fn insert_calendar(&self, dates: &[NaiveDate]) -> Result<(), SimError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        for date in dates {
            tx.execute(
                "INSERT OR REPLACE INTO trade_calendar (trade_date) VALUES (?1)",
                params![date.format(COMPACT_DATE).to_string()],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    pub fn insert_dominant(&self, rows: &[(NaiveDate, &str)]) -> Result<(), SimError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        for (date, contract) in rows {
            tx.execute(
                "INSERT OR REPLACE INTO future_dominant (trade_date, dominant) VALUES (?1, ?2)",
                params![date.format(COMPACT_DATE).to_string(), contract],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    pub fn insert_market(&self, rows: &[(NaiveDate, &str, MarketRecord)]) -> Result<(), SimError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        for (date, contract, record) in rows {
            tx.execute(
                "INSERT OR REPLACE INTO future_bar_1day
                 (trade_date, contract, open, close, settle, multiplier)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    date.format(COMPACT_DATE).to_string(),
                    contract,
                    record.open,
                    record.close,
                    record.settle,
                    record.multiplier
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    pub fn insert_signal(&self, sid: &str, rows: &[(NaiveDate, &str, f64)]) -> Result<(), SimError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        for (date, code, weight) in rows {
            tx.execute(
                "INSERT OR REPLACE INTO signal (trade_date, code, sid, weight)
                 VALUES (?1, ?2, ?3, ?4)",
                params![date.format(COMPACT_DATE).to_string(), code, sid, weight],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    pub fn load_calendar(&self) -> Result<TradeCalendar, SimError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT trade_date FROM trade_calendar ORDER BY trade_date")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_err)?;

        let mut dates = Vec::new();
        for row in rows {
            dates.push(stored_date(&row.map_err(query_err)?)?);
        }
        info!("loaded {} trade dates from sqlite", dates.len());
        TradeCalendar::new(dates)
    }

    pub fn load_dominant(&self, universe: &[String]) -> Result<DominantContractTable, SimError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT trade_date, dominant FROM future_dominant")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(query_err)?;

        let mut table = DominantContractTable::with_universe(universe.iter().cloned());
        for row in rows {
            let (date, contract) = row.map_err(query_err)?;
            table.insert(stored_date(&date)?, &contract);
        }
        info!(
            "loaded dominant contracts for {} instruments from sqlite",
            table.instrument_count()
        );
        Ok(table)
    }

    pub fn load_market(&self) -> Result<MarketDataTable, SimError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT trade_date, contract, open, close, settle, multiplier
                 FROM future_bar_1day",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    MarketRecord {
                        open: row.get(2)?,
                        close: row.get(3)?,
                        settle: row.get(4)?,
                        multiplier: row.get(5)?,
                    },
                ))
            })
            .map_err(query_err)?;

        let mut table = MarketDataTable::new();
        for row in rows {
            let (date, contract, record) = row.map_err(query_err)?;
            table.insert(stored_date(&date)?, &contract, record);
        }
        info!("loaded {} market rows from sqlite", table.len());
        Ok(table)
    }

    pub fn load_signal(&self, sid: &str) -> Result<SignalTable, SimError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT trade_date, code, weight FROM signal WHERE sid = ?1")
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![sid], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })
            .map_err(query_err)?;

        let mut table = SignalTable::new(sid);
        for row in rows {
            let (date, code, weight) = row.map_err(query_err)?;
            table.insert(stored_date(&date)?, &code, weight);
        }
        info!("loaded signal {} for {} dates from sqlite", sid, table.date_count());
        Ok(table)
    }
}
