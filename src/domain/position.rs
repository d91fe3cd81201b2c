//! Position and trade records.
//!
//! A [`Position`] is keyed by contract and direction, so a long and a short
//! holding in the same contract are two independent positions. Quantities are
//! unsigned; the direction carries the P&L sign.

use std::fmt;

use super::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Direction implied by a signal weight. Zero maps to short, but zero
    /// weights never reach sizing.
    pub fn from_weight(weight: f64) -> Self {
        if weight > 0.0 {
            Direction::Long
        } else {
            Direction::Short
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Offset {
    Open,
    Close,
}

impl TryFrom<i8> for Offset {
    type Error = SimError;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Offset::Open),
            -1 => Ok(Offset::Close),
            other => Err(SimError::InvalidOffset(other)),
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Open => write!(f, "OPEN"),
            Offset::Close => write!(f, "CLOSE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub contract: String,
    pub direction: Direction,
}

impl PositionKey {
    pub fn new(contract: impl Into<String>, direction: Direction) -> Self {
        PositionKey {
            contract: contract.into(),
            direction,
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.contract, self.direction)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub key: PositionKey,
    pub offset: Offset,
    pub quantity: u64,
    pub multiplier: f64,
    pub exe_price: f64,
}

impl Trade {
    /// Transaction cost at a flat proportional rate of the traded notional.
    ///
    /// The notional is taken by magnitude so a fill at a negative print is
    /// still charged.
    pub fn cost(&self, cost_rate: f64) -> f64 {
        (self.exe_price * self.multiplier * self.quantity as f64).abs() * cost_rate
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} x{} @ {}",
            self.offset, self.key, self.quantity, self.multiplier, self.exe_price
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub key: PositionKey,
    pub quantity: u64,
    pub multiplier: f64,
    pub cost_price: f64,
    pub last_price: f64,
}

impl Position {
    /// An empty position, ready to take its first OPEN trade.
    pub fn new(key: PositionKey, multiplier: f64) -> Self {
        Position {
            key,
            quantity: 0,
            multiplier,
            cost_price: 0.0,
            last_price: 0.0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.quantity == 0
    }

    pub fn unrealized_pnl(&self) -> f64 {
        (self.last_price - self.cost_price)
            * self.multiplier
            * self.quantity as f64
            * self.key.direction.sign()
    }

    pub fn cost_of(&self, trade: &Trade, cost_rate: f64) -> f64 {
        trade.cost(cost_rate)
    }

    /// The trade that moves this position to `target_qty` contracts.
    ///
    /// Equal quantities yield an OPEN of zero contracts, which callers drop.
    pub fn trade_to_close_or_open(&self, target_qty: u64, exe_price: f64) -> Trade {
        let offset = if self.quantity <= target_qty {
            Offset::Open
        } else {
            Offset::Close
        };
        Trade {
            key: self.key.clone(),
            offset,
            quantity: self.quantity.abs_diff(target_qty),
            multiplier: self.multiplier,
            exe_price,
        }
    }

    /// A CLOSE for the whole holding.
    pub fn close_all(&self, exe_price: f64) -> Trade {
        Trade {
            key: self.key.clone(),
            offset: Offset::Close,
            quantity: self.quantity,
            multiplier: self.multiplier,
            exe_price,
        }
    }

    /// Applies a fill and returns `(realized_pnl, cost)`.
    ///
    /// Opens re-average the cost basis. Closes realize P&L against the cost
    /// basis and leave it unchanged. The position is untouched on error.
    pub fn apply_trade(&mut self, trade: &Trade, cost_rate: f64) -> Result<(f64, f64), SimError> {
        if trade.key != self.key {
            return Err(SimError::KeyMismatch {
                trade_key: trade.key.to_string(),
                position_key: self.key.to_string(),
            });
        }

        let cost = self.cost_of(trade, cost_rate);
        let realized_pnl = match trade.offset {
            Offset::Open => {
                let sum_qty = self.quantity + trade.quantity;
                if sum_qty > 0 {
                    let sum_amt = self.cost_price * self.quantity as f64
                        + trade.exe_price * trade.quantity as f64;
                    self.cost_price = sum_amt / sum_qty as f64;
                }
                self.quantity = sum_qty;
                0.0
            }
            Offset::Close => {
                if trade.quantity > self.quantity {
                    return Err(SimError::OverClose {
                        key: self.key.to_string(),
                        trade_qty: trade.quantity,
                        held_qty: self.quantity,
                    });
                }
                self.quantity -= trade.quantity;
                (trade.exe_price - self.cost_price)
                    * self.multiplier
                    * trade.quantity as f64
                    * self.key.direction.sign()
            }
        };
        Ok((realized_pnl, cost))
    }

    pub fn mark(&mut self, last_price: f64) {
        self.last_price = last_price;
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} qty={} x{} cost={:.4} last={:.4} upnl={:.2}",
            self.key,
            self.quantity,
            self.multiplier,
            self.cost_price,
            self.last_price,
            self.unrealized_pnl()
        )
    }
}
