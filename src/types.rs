//! Core data types shared across the replay engine.
//!
//! These types are designed to be:
//! - Memory efficient (use smallest types possible)
//! - Cache-friendly (plain `Copy` structs, byte-sized enums)
//! - Compatible with the ITCH 5.0 wire format

use serde::{Deserialize, Serialize};

/// ITCH prices are fixed point with four decimal places (1/10000 dollar).
pub const PRICE_SCALE: f64 = 10_000.0;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Buy order (rests on the bid ladder)
    Buy = b'B',
    /// Sell order (rests on the ask ladder)
    Sell = b'S',
}

impl Side {
    /// Parse side from an ITCH buy/sell indicator byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'B' => Some(Side::Buy),
            b'S' => Some(Side::Sell),
            _ => None,
        }
    }

    /// Convert to the wire byte representation.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Check if this is the buy side.
    #[inline(always)]
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Check if this is the sell side.
    #[inline(always)]
    pub fn is_sell(self) -> bool {
        matches!(self, Side::Sell)
    }
}

/// A listed instrument, keyed by its session-unique stock locate code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Stock locate code (16-bit, unique per trading session)
    pub id: u16,

    /// Right-padded ASCII ticker, exactly as it appears on the wire
    pub name: [u8; 8],
}

impl Symbol {
    /// Create a new symbol from a locate code and its wire-format name.
    pub fn new(id: u16, name: [u8; 8]) -> Self {
        Self { id, name }
    }

    /// Ticker with the wire padding stripped.
    pub fn ticker(&self) -> &str {
        std::str::from_utf8(&self.name)
            .unwrap_or("")
            .trim_end_matches(' ')
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.ticker(), self.id)
    }
}

/// Snapshot of a resting order.
///
/// Minimal representation, copied out of the book for observer
/// callbacks and queries. Mutating it has no effect on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order reference number (globally unique while resting)
    pub id: u64,

    /// Stock locate of the owning book
    pub symbol: u16,

    /// Resting side
    pub side: Side,

    /// Limit price in 1/10000 dollar units
    pub price: u32,

    /// Remaining visible shares
    pub quantity: u32,
}

impl Order {
    /// Get the limit price as floating point dollars.
    #[inline]
    pub fn price_as_f64(&self) -> f64 {
        self.price as f64 / PRICE_SCALE
    }
}

/// Snapshot of one price level, taken immediately after a mutation.
///
/// For a `Delete` update the snapshot carries the drained level
/// (`total_volume == 0`); the underlying slot is already released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// Ladder side this level belongs to
    pub side: Side,

    /// Level price in 1/10000 dollar units
    pub price: u32,

    /// Sum of remaining quantities over the level's FIFO
    pub total_volume: u64,

    /// Number of orders resting at this level
    pub order_count: usize,
}

impl LevelInfo {
    /// Get the level price as floating point dollars.
    #[inline]
    pub fn price_as_f64(&self) -> f64 {
        self.price as f64 / PRICE_SCALE
    }
}

/// What a book operation did to the affected price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    /// Level was created by this operation
    Add,
    /// Level existed and its aggregates changed
    Update,
    /// Level was drained and removed by this operation
    Delete,
}
