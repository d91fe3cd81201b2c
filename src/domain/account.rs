//! Account state and the daily NAV snapshot series.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::position::{Position, PositionKey};

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub trade_date: NaiveDate,
    pub init_cash: f64,
    pub tot_realized_pnl: f64,
    pub this_day_realized_pnl: f64,
    pub this_day_cost: f64,
    pub tot_unrealized_pnl: f64,
    pub last_nav: f64,
    pub nav: f64,
    pub navps: f64,
    pub ret: f64,
}

pub type Positions = BTreeMap<PositionKey, Position>;

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub init_cash: f64,
    pub cost_rate: f64,
    pub tot_realized_pnl: f64,
    pub tot_unrealized_pnl: f64,
    pub last_nav: f64,
    positions: Positions,
    snapshots: Vec<Snapshot>,
}

impl Account {
    pub fn new(init_cash: f64, cost_rate: f64) -> Self {
        Account {
            init_cash,
            cost_rate,
            tot_realized_pnl: 0.0,
            tot_unrealized_pnl: 0.0,
            last_nav: init_cash,
            positions: BTreeMap::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn nav(&self) -> f64 {
        self.init_cash + self.tot_realized_pnl + self.tot_unrealized_pnl
    }

    pub fn navps(&self) -> f64 {
        self.nav() / self.init_cash
    }

    /// Return of the current NAV against the previous day's NAV.
    pub fn ret(&self) -> f64 {
        self.nav() / self.last_nav - 1.0
    }

    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut Positions {
        &mut self.positions
    }

    pub fn position(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Drops every position whose quantity has reached zero.
    pub fn purge_closed(&mut self) -> usize {
        let before = self.positions.len();
        self.positions.retain(|_, pos| !pos.is_closed());
        before - self.positions.len()
    }

    /// Realized P&L accumulates net of cost; unrealized P&L is a point-in-time
    /// mark and replaces the previous value.
    pub fn update_pnl(&mut self, day_unrealized: f64, day_realized: f64, day_cost: f64) {
        self.tot_realized_pnl += day_realized - day_cost;
        self.tot_unrealized_pnl = day_unrealized;
    }

    /// Must run before [`Account::roll_last_nav`] so the return uses the
    /// previous day's NAV. Returns a copy of the recorded row.
    pub fn take_snapshot(
        &mut self,
        trade_date: NaiveDate,
        day_realized: f64,
        day_cost: f64,
    ) -> Snapshot {
        let snap = Snapshot {
            trade_date,
            init_cash: self.init_cash,
            tot_realized_pnl: self.tot_realized_pnl,
            this_day_realized_pnl: day_realized,
            this_day_cost: day_cost,
            tot_unrealized_pnl: self.tot_unrealized_pnl,
            last_nav: self.last_nav,
            nav: self.nav(),
            navps: self.navps(),
            ret: self.ret(),
        };
        self.snapshots.push(snap.clone());
        snap
    }

    pub fn roll_last_nav(&mut self) {
        self.last_nav = self.nav();
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn export(&self) -> Vec<Snapshot> {
        self.snapshots.clone()
    }
}
