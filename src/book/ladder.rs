//! Ordered price index for one side of a book.
//!
//! A `BTreeMap` keyed by price keeps the levels sorted, so the best
//! quote is always at one boundary of the map: the last key on the bid
//! side, the first key on the ask side. The price domain is 2^32 and
//! sparse, which rules out a flat array, and best-quote tracking rules
//! out a hash map.

use std::collections::BTreeMap;

use crate::types::Side;

use super::level::LevelNode;
use super::pool::Handle;

/// Sorted price → level index for one side.
#[derive(Debug)]
pub struct PriceLadder {
    side: Side,
    levels: BTreeMap<u32, Handle<LevelNode>>,
}

impl PriceLadder {
    /// Create an empty ladder for `side`.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Side this ladder indexes.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Look up the level at `price`.
    #[inline]
    pub fn find(&self, price: u32) -> Option<Handle<LevelNode>> {
        self.levels.get(&price).copied()
    }

    /// Insert a level. Prices are unique per side; inserting a price
    /// that is already present is a caller bug.
    pub fn insert(&mut self, price: u32, handle: Handle<LevelNode>) {
        let previous = self.levels.insert(price, handle);
        debug_assert!(previous.is_none(), "duplicate price {price} in ladder");
    }

    /// Remove and return the level at `price`.
    pub fn erase(&mut self, price: u32) -> Option<Handle<LevelNode>> {
        self.levels.remove(&price)
    }

    /// The ladder's extremum: highest price for bids, lowest for asks.
    #[inline]
    pub fn best(&self) -> Option<Handle<LevelNode>> {
        match self.side {
            Side::Buy => self.levels.iter().next_back().map(|(_, &h)| h),
            Side::Sell => self.levels.iter().next().map(|(_, &h)| h),
        }
    }

    /// Number of populated price levels.
    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check whether the ladder holds no levels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Iterate levels in ascending price order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Handle<LevelNode>)> + '_ {
        self.levels.iter().map(|(&price, &handle)| (price, handle))
    }

    /// Iterate levels from best to worst.
    pub fn iter_best_first(&self) -> Box<dyn Iterator<Item = (u32, Handle<LevelNode>)> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.iter().rev().map(|(&p, &h)| (p, h))),
            Side::Sell => Box::new(self.levels.iter().map(|(&p, &h)| (p, h))),
        }
    }
}
