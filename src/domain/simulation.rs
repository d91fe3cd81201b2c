//! Daily simulation loop.
//!
//! Each iteration takes a (signal date, execution date) pair. The signal seen
//! on the first date is sized against the last settled NAV, diffed against the
//! account's positions, filled at the execution date's open or close, marked to
//! the execution date's close and settled into a [`Snapshot`].

use chrono::NaiveDate;
use log::{debug, trace};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::str::FromStr;

use super::account::{Account, Snapshot};
use super::calendar::COMPACT_DATE;
use super::error::SimError;
use super::position::{Direction, Offset, Position, PositionKey, Trade};
use crate::ports::market_port::{
    MajorContractResolver, MarketDataProvider, MarketField, SignalProvider,
};

/// Weights below this magnitude are treated as flat.
pub const WEIGHT_EPSILON: f64 = 1e-6;

pub type TargetPositions = BTreeMap<PositionKey, Position>;

/// Price field used to fill trades on the execution date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExePriceType {
    Open,
    Close,
}

impl ExePriceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExePriceType::Open => "open",
            ExePriceType::Close => "close",
        }
    }

    pub fn field(self) -> MarketField {
        match self {
            ExePriceType::Open => MarketField::Open,
            ExePriceType::Close => MarketField::Close,
        }
    }
}

impl fmt::Display for ExePriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExePriceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(ExePriceType::Open),
            "close" => Ok(ExePriceType::Close),
            other => Err(format!("execution price must be open or close, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub init_cash: f64,
    pub cost_rate: f64,
    pub exe_price: ExePriceType,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            init_cash: 1_000_000.0,
            cost_rate: 0.0002,
            exe_price: ExePriceType::Close,
        }
    }
}

pub struct Simulation<'a> {
    signal: &'a dyn SignalProvider,
    contracts: &'a dyn MajorContractResolver,
    market: &'a dyn MarketDataProvider,
    exe_price: ExePriceType,
    account: Account,
}

impl<'a> Simulation<'a> {
    pub fn new(
        config: &SimulationConfig,
        signal: &'a dyn SignalProvider,
        contracts: &'a dyn MajorContractResolver,
        market: &'a dyn MarketDataProvider,
    ) -> Self {
        Simulation {
            signal,
            contracts,
            market,
            exe_price: config.exe_price,
            account: Account::new(config.init_cash, config.cost_rate),
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Identifies the run's output: `{sid}-{exe_price}`.
    pub fn save_id(&self) -> String {
        format!("{}-{}", self.signal.sid(), self.exe_price)
    }

    /// Market value used for sizing; only finite positive values can size a
    /// position. Fills read the raw price.
    fn positive_md(
        &self,
        trade_date: NaiveDate,
        contract: &str,
        field: MarketField,
    ) -> Result<f64, SimError> {
        let value = self.market.lookup(trade_date, contract, field)?;
        if !(value.is_finite() && value > 0.0) {
            return Err(SimError::InvalidMarketData {
                date: trade_date,
                contract: contract.to_string(),
                field: field.to_string(),
                value,
            });
        }
        Ok(value)
    }

    /// Sizes the signal observed on `sig_date` into whole contracts.
    pub fn signal_to_target_positions(
        &self,
        sig_date: NaiveDate,
    ) -> Result<TargetPositions, SimError> {
        let mut targets = TargetPositions::new();
        for (instrument, weight) in self.signal.signal_for(sig_date) {
            if weight.abs() < WEIGHT_EPSILON {
                continue;
            }
            let contract = self.contracts.resolve(sig_date, &instrument)?;
            let multiplier = self.positive_md(sig_date, &contract, MarketField::Multiplier)?;
            let sig_price = self.positive_md(sig_date, &contract, MarketField::Close)?;
            let qty = (self.account.last_nav * weight.abs() / multiplier / sig_price)
                .round_ties_even()
                .max(0.0) as u64;
            let key = PositionKey::new(contract, Direction::from_weight(weight));
            let mut target = Position::new(key.clone(), multiplier);
            target.quantity = qty;
            targets.insert(key, target);
        }
        Ok(targets)
    }

    /// Trades that move the account's positions onto `targets`.
    pub fn diff_to_trades(
        &self,
        targets: &TargetPositions,
        exe_date: NaiveDate,
    ) -> Result<Vec<Trade>, SimError> {
        let field = self.exe_price.field();
        let mut trades = Vec::new();

        for (key, target) in targets {
            let exe_price = self.market.lookup(exe_date, &key.contract, field)?;
            let trade = match self.account.position(key) {
                Some(held) => held.trade_to_close_or_open(target.quantity, exe_price),
                None => Position::new(key.clone(), target.multiplier)
                    .trade_to_close_or_open(target.quantity, exe_price),
            };
            if trade.quantity > 0 {
                trades.push(trade);
            }
        }

        for (key, held) in self.account.positions() {
            if targets.contains_key(key) || held.is_closed() {
                continue;
            }
            let exe_price = self.market.lookup(exe_date, &key.contract, field)?;
            trades.push(held.close_all(exe_price));
        }

        Ok(trades)
    }

    /// Fills `trades` and returns the day's `(realized_pnl, cost)`.
    pub fn apply_trades(&mut self, trades: &[Trade]) -> Result<(f64, f64), SimError> {
        let cost_rate = self.account.cost_rate;
        let positions = self.account.positions_mut();
        let mut realized_pnl = 0.0;
        let mut cost = 0.0;

        for trade in trades {
            let pos = match positions.entry(trade.key.clone()) {
                Entry::Occupied(held) => held.into_mut(),
                Entry::Vacant(_) if trade.offset == Offset::Close => {
                    return Err(SimError::UnknownPosition {
                        key: trade.key.to_string(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(Position::new(trade.key.clone(), trade.multiplier))
                }
            };
            let (trade_pnl, trade_cost) = pos.apply_trade(trade, cost_rate)?;
            realized_pnl += trade_pnl;
            cost += trade_cost;
        }

        Ok((realized_pnl, cost))
    }

    /// Marks every held position to `exe_date`'s close, purges closed ones and
    /// returns the total unrealized P&L.
    pub fn mark_and_accrue(&mut self, exe_date: NaiveDate) -> Result<f64, SimError> {
        let mut unrealized_pnl = 0.0;
        for (key, pos) in self.account.positions_mut().iter_mut() {
            if pos.is_closed() {
                continue;
            }
            let last_price = self
                .market
                .lookup(exe_date, &key.contract, MarketField::Close)?;
            pos.mark(last_price);
            unrealized_pnl += pos.unrealized_pnl();
        }
        self.account.purge_closed();
        Ok(unrealized_pnl)
    }

    /// Runs one (signal date, execution date) iteration.
    pub fn step(&mut self, sig_date: NaiveDate, exe_date: NaiveDate) -> Result<Snapshot, SimError> {
        let targets = self.signal_to_target_positions(sig_date)?;
        let trades = self.diff_to_trades(&targets, exe_date)?;
        for trade in &trades {
            trace!("{} trade {}", exe_date.format(COMPACT_DATE), trade);
        }
        let (day_realized, day_cost) = self.apply_trades(&trades)?;
        let day_unrealized = self.mark_and_accrue(exe_date)?;

        self.account.update_pnl(day_unrealized, day_realized, day_cost);
        let snap = self.account.take_snapshot(exe_date, day_realized, day_cost);
        self.account.roll_last_nav();

        debug!(
            "{}: {} targets, {} trades, {} positions, nav={:.2}",
            exe_date.format(COMPACT_DATE),
            targets.len(),
            trades.len(),
            self.account.position_count(),
            self.account.nav()
        );
        for pos in self.account.positions().values() {
            trace!("{} position {}", exe_date.format(COMPACT_DATE), pos);
        }

        Ok(snap)
    }

    /// Folds the loop over every pair and returns the snapshot series.
    ///
    /// The first error aborts the run; no partial series is returned.
    pub fn run(mut self, pairs: &[(NaiveDate, NaiveDate)]) -> Result<Vec<Snapshot>, SimError> {
        for (sig_date, exe_date) in pairs {
            self.step(*sig_date, *exe_date)?;
        }
        Ok(self.account.export())
    }
}
