//! Per-symbol limit order book.
//!
//! The book owns its nodes through two pools, indexes levels per side
//! with a [`PriceLadder`], and resolves order reference numbers through
//! an `ahash` map. Best bid/ask are cached level handles, refreshed
//! from the ladder's true extremum whenever the best level is erased.
//!
//! Every mutation reports a [`LevelUpdate`] describing what happened to
//! the affected price level (created / changed / drained) and whether
//! the top of book was involved; the registry turns these into observer
//! callbacks.

use ahash::AHashMap;

use crate::error::{ReplayError, Result};
use crate::types::{LevelInfo, Order, Side, UpdateKind};

use super::ladder::PriceLadder;
use super::level::{LevelNode, OrderNode};
use super::pool::{Handle, Pool};

/// Change to a single price level, emitted by every book operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpdate {
    /// What happened to the level
    pub kind: UpdateKind,
    /// Level aggregates right after the mutation
    pub level: LevelInfo,
    /// Whether the level was the best of its side
    pub top: bool,
}

/// Outcome of a single-order mutation.
#[derive(Debug, Clone, Copy)]
pub struct Applied {
    /// The affected order, after the mutation
    pub order: Order,
    /// Whether the order left the book
    pub removed: bool,
    /// What happened to the order's price level
    pub update: LevelUpdate,
}

/// Outcome of an execution: a reduce plus the trade print details.
#[derive(Debug, Clone, Copy)]
pub struct Execution {
    /// Executed price (resting price, or the explicit message price)
    pub price: u32,
    /// Executed shares after clamping
    pub quantity: u32,
    /// The underlying book mutation
    pub applied: Applied,
}

/// Outcome of a modify or replace: removal from the old level plus an
/// optional insertion into the new one.
#[derive(Debug, Clone, Copy)]
pub struct Exchanged {
    /// Removal from the original level
    pub removed: Applied,
    /// Insertion at the new price, absent when the new quantity is zero
    pub added: Option<Applied>,
}

/// Price-ordered two-sided book for one instrument.
pub struct Book {
    symbol: u16,
    bids: PriceLadder,
    asks: PriceLadder,
    orders: AHashMap<u64, Handle<OrderNode>>,
    order_pool: Pool<OrderNode>,
    level_pool: Pool<LevelNode>,
    best_bid: Option<Handle<LevelNode>>,
    best_ask: Option<Handle<LevelNode>>,
}

impl Book {
    /// Create an empty book for `symbol`.
    pub fn new(symbol: u16) -> Self {
        Self {
            symbol,
            bids: PriceLadder::new(Side::Buy),
            asks: PriceLadder::new(Side::Sell),
            orders: AHashMap::new(),
            order_pool: Pool::new(),
            level_pool: Pool::new(),
            best_bid: None,
            best_ask: None,
        }
    }

    /// Stock locate this book belongs to.
    #[inline]
    pub fn symbol(&self) -> u16 {
        self.symbol
    }

    /// Check whether both sides are empty.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Total populated price levels across both sides.
    pub fn size(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Number of populated bid levels.
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Number of populated ask levels.
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Deepest side, used for depth statistics.
    pub fn depth(&self) -> usize {
        self.bids.len().max(self.asks.len())
    }

    /// Number of resting orders.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Best (highest-price) bid level, if any.
    pub fn best_bid(&self) -> Option<LevelInfo> {
        self.best_bid.map(|h| self.level_pool[h].snapshot())
    }

    /// Best (lowest-price) ask level, if any.
    pub fn best_ask(&self) -> Option<LevelInfo> {
        self.best_ask.map(|h| self.level_pool[h].snapshot())
    }

    /// Best bid price, if any.
    pub fn best_bid_price(&self) -> Option<u32> {
        self.best_bid.map(|h| self.level_pool[h].price)
    }

    /// Best ask price, if any.
    pub fn best_ask_price(&self) -> Option<u32> {
        self.best_ask.map(|h| self.level_pool[h].price)
    }

    /// Mid-price in dollars, when both sides are populated.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid_price(), self.best_ask_price()) {
            (Some(bid), Some(ask)) => {
                Some((bid as f64 + ask as f64) / (2.0 * crate::types::PRICE_SCALE))
            }
            _ => None,
        }
    }

    /// Spread in dollars, when both sides are populated.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid_price(), self.best_ask_price()) {
            (Some(bid), Some(ask)) => {
                Some((ask as f64 - bid as f64) / crate::types::PRICE_SCALE)
            }
            _ => None,
        }
    }

    /// Snapshot of a resting order by reference number.
    pub fn order(&self, id: u64) -> Option<Order> {
        self.orders
            .get(&id)
            .map(|&handle| self.order_pool[handle].snapshot())
    }

    /// Snapshot of the level at `(side, price)`, if populated.
    pub fn level(&self, side: Side, price: u32) -> Option<LevelInfo> {
        self.ladder(side)
            .find(price)
            .map(|handle| self.level_pool[handle].snapshot())
    }

    /// FIFO snapshot of the orders queued at `(side, price)`.
    pub fn queue(&self, side: Side, price: u32) -> Vec<Order> {
        match self.ladder(side).find(price) {
            Some(handle) => self.level_pool[handle]
                .orders(&self.order_pool)
                .map(OrderNode::snapshot)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Level snapshots for one side, best first.
    pub fn levels(&self, side: Side) -> Vec<LevelInfo> {
        self.ladder(side)
            .iter_best_first()
            .map(|(_, handle)| self.level_pool[handle].snapshot())
            .collect()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Rest a new order at `(side, price)`.
    ///
    /// The order joins the tail of its level's FIFO; a level is created
    /// if the price is new on that side. Zero quantity and duplicate
    /// ids are protocol errors and leave the book untouched.
    pub fn add_order(&mut self, id: u64, side: Side, price: u32, quantity: u32) -> Result<Applied> {
        if quantity == 0 {
            return Err(ReplayError::InvalidQuantity(quantity));
        }
        if self.orders.contains_key(&id) {
            return Err(ReplayError::DuplicateOrder(id));
        }

        let handle = self
            .order_pool
            .insert(OrderNode::new(id, self.symbol, side, price, quantity));
        self.orders.insert(id, handle);
        let update = self.attach(handle, side, price);

        Ok(Applied {
            order: self.order_pool[handle].snapshot(),
            removed: false,
            update,
        })
    }

    /// Cancel up to `quantity` shares of a resting order.
    ///
    /// The quantity is clamped to the order's remainder. An order
    /// driven to zero leaves the book; a level driven to zero volume is
    /// erased and the best cache refreshed.
    pub fn reduce_order(&mut self, id: u64, quantity: u32) -> Result<Applied> {
        let handle = *self
            .orders
            .get(&id)
            .ok_or(ReplayError::UnknownOrder(id))?;

        let (side, level, remaining) = self.locate(handle)?;
        let quantity = quantity.min(remaining);

        self.level_pool[level].reduce_order(&mut self.order_pool, handle, quantity);
        let update = self.finish_level_mutation(level, side);

        let removed = self.order_pool[handle].quantity == 0;
        let order = self.order_pool[handle].snapshot();
        if removed {
            self.orders.remove(&id);
            self.order_pool.remove(handle);
        }

        Ok(Applied {
            order,
            removed,
            update,
        })
    }

    /// Remove a resting order outright.
    pub fn delete_order(&mut self, id: u64) -> Result<Applied> {
        let handle = *self
            .orders
            .get(&id)
            .ok_or(ReplayError::UnknownOrder(id))?;

        let order = self.order_pool[handle].snapshot();
        let update = self.detach(handle)?;
        self.orders.remove(&id);
        self.order_pool.remove(handle);

        Ok(Applied {
            order,
            removed: true,
            update,
        })
    }

    /// Execute up to `quantity` shares against a resting order.
    ///
    /// Book-state change is identical to [`reduce_order`](Self::reduce_order);
    /// the returned [`Execution`] additionally carries the print price:
    /// the order's resting price, or `price` for the price-bearing
    /// ITCH variant.
    pub fn execute_order(
        &mut self,
        id: u64,
        quantity: u32,
        price: Option<u32>,
    ) -> Result<Execution> {
        let handle = *self
            .orders
            .get(&id)
            .ok_or(ReplayError::UnknownOrder(id))?;

        let node = &self.order_pool[handle];
        let executed = quantity.min(node.quantity);
        let print_price = price.unwrap_or(node.price);

        let applied = self.reduce_order(id, executed)?;

        Ok(Execution {
            price: print_price,
            quantity: executed,
            applied,
        })
    }

    /// Move a resting order to `(new_price, new_quantity)`, keeping its
    /// id but losing time priority (it joins the new level's tail).
    ///
    /// A zero new quantity acts as a plain delete.
    pub fn modify_order(&mut self, id: u64, new_price: u32, new_quantity: u32) -> Result<Exchanged> {
        let handle = *self
            .orders
            .get(&id)
            .ok_or(ReplayError::UnknownOrder(id))?;

        let before = self.order_pool[handle].snapshot();
        let removed_update = self.detach(handle)?;

        if new_quantity == 0 {
            self.orders.remove(&id);
            self.order_pool.remove(handle);
            return Ok(Exchanged {
                removed: Applied {
                    order: before,
                    removed: true,
                    update: removed_update,
                },
                added: None,
            });
        }

        {
            let node = &mut self.order_pool[handle];
            node.price = new_price;
            node.quantity = new_quantity;
        }
        let added_update = self.attach(handle, before.side, new_price);

        Ok(Exchanged {
            removed: Applied {
                order: before,
                removed: false,
                update: removed_update,
            },
            added: Some(Applied {
                order: self.order_pool[handle].snapshot(),
                removed: false,
                update: added_update,
            }),
        })
    }

    /// Retire `old_id` and rest a fresh order under `new_id`, inheriting
    /// side and symbol. Time priority is lost. A zero new quantity acts
    /// as a plain delete of the old order.
    pub fn replace_order(
        &mut self,
        old_id: u64,
        new_id: u64,
        new_price: u32,
        new_quantity: u32,
    ) -> Result<Exchanged> {
        let handle = *self
            .orders
            .get(&old_id)
            .ok_or(ReplayError::UnknownOrder(old_id))?;
        if old_id != new_id && self.orders.contains_key(&new_id) {
            return Err(ReplayError::DuplicateOrder(new_id));
        }

        let before = self.order_pool[handle].snapshot();
        let removed_update = self.detach(handle)?;
        self.orders.remove(&old_id);
        self.order_pool.remove(handle);

        let removed = Applied {
            order: before,
            removed: true,
            update: removed_update,
        };

        if new_quantity == 0 {
            return Ok(Exchanged {
                removed,
                added: None,
            });
        }

        let new_handle = self.order_pool.insert(OrderNode::new(
            new_id,
            before.symbol,
            before.side,
            new_price,
            new_quantity,
        ));
        self.orders.insert(new_id, new_handle);
        let added_update = self.attach(new_handle, before.side, new_price);

        Ok(Exchanged {
            removed,
            added: Some(Applied {
                order: self.order_pool[new_handle].snapshot(),
                removed: false,
                update: added_update,
            }),
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ladder(&self, side: Side) -> &PriceLadder {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn best(&self, side: Side) -> Option<Handle<LevelNode>> {
        match side {
            Side::Buy => self.best_bid,
            Side::Sell => self.best_ask,
        }
    }

    /// Resolve an order's side, level handle and remaining quantity.
    fn locate(&self, handle: Handle<OrderNode>) -> Result<(Side, Handle<LevelNode>, u32)> {
        let node = &self.order_pool[handle];
        let level = node.level.ok_or_else(|| {
            ReplayError::InconsistentState(format!("order {} is not queued on any level", node.id))
        })?;
        Ok((node.side, level, node.quantity))
    }

    /// Queue `handle` at `(side, price)`, creating the level if needed.
    fn attach(&mut self, handle: Handle<OrderNode>, side: Side, price: u32) -> LevelUpdate {
        let (level, kind) = self.find_or_create_level(side, price);
        self.level_pool[level].add_order(level, &mut self.order_pool, handle);

        LevelUpdate {
            kind,
            level: self.level_pool[level].snapshot(),
            top: self.best(side) == Some(level),
        }
    }

    /// Remove `handle` from its level, erasing the level if drained.
    fn detach(&mut self, handle: Handle<OrderNode>) -> Result<LevelUpdate> {
        let (side, level, _) = self.locate(handle)?;
        self.level_pool[level].delete_order(&mut self.order_pool, handle);
        Ok(self.finish_level_mutation(level, side))
    }

    fn find_or_create_level(&mut self, side: Side, price: u32) -> (Handle<LevelNode>, UpdateKind) {
        let ladder = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        if let Some(existing) = ladder.find(price) {
            return (existing, UpdateKind::Update);
        }

        let handle = self.level_pool.insert(LevelNode::new(side, price));
        match side {
            Side::Buy => self.bids.insert(price, handle),
            Side::Sell => self.asks.insert(price, handle),
        }

        // A fresh level takes the best cache when it improves the quote
        // or the side was empty.
        let improves = match (self.best(side), side) {
            (None, _) => true,
            (Some(best), Side::Buy) => price > self.level_pool[best].price,
            (Some(best), Side::Sell) => price < self.level_pool[best].price,
        };
        if improves {
            match side {
                Side::Buy => self.best_bid = Some(handle),
                Side::Sell => self.best_ask = Some(handle),
            }
        }

        (handle, UpdateKind::Add)
    }

    /// Classify a level mutation and erase the level when drained.
    ///
    /// The top flag compares against the best cache before any erase,
    /// so a drained best level still reports `top == true`.
    fn finish_level_mutation(&mut self, level: Handle<LevelNode>, side: Side) -> LevelUpdate {
        let top = self.best(side) == Some(level);
        let info = self.level_pool[level].snapshot();

        if info.total_volume == 0 {
            self.erase_level(level, side);
            LevelUpdate {
                kind: UpdateKind::Delete,
                level: info,
                top,
            }
        } else {
            LevelUpdate {
                kind: UpdateKind::Update,
                level: info,
                top,
            }
        }
    }

    fn erase_level(&mut self, level: Handle<LevelNode>, side: Side) {
        let price = self.level_pool[level].price;
        let new_best = {
            let ladder = match side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            ladder.erase(price);
            // The replacement best comes from the ladder's true
            // extremum; never from the erased node's tree neighbors.
            ladder.best()
        };

        match side {
            Side::Buy => {
                if self.best_bid == Some(level) {
                    self.best_bid = new_best;
                }
            }
            Side::Sell => {
                if self.best_ask == Some(level) {
                    self.best_ask = new_best;
                }
            }
        }

        self.level_pool.remove(level);
    }

    /// Cross-check every structural invariant of the book.
    ///
    /// Walks both ladders, re-derives each level's aggregates from its
    /// FIFO, and verifies the id map and best caches. Intended for
    /// tests and debugging; cost is linear in the book size.
    pub fn verify_invariants(&self) -> Result<()> {
        let mut queued = 0usize;

        for ladder in [&self.bids, &self.asks] {
            let side = ladder.side();
            for (price, level_handle) in ladder.iter() {
                let level = self.level_pool.get(level_handle).ok_or_else(|| {
                    ReplayError::InconsistentState(format!("ladder points at freed level {price}"))
                })?;
                if level.side != side || level.price != price {
                    return Err(ReplayError::InconsistentState(format!(
                        "level keyed at {price} holds ({:?}, {})",
                        level.side, level.price
                    )));
                }
                if level.total_volume == 0 || level.is_empty() {
                    return Err(ReplayError::InconsistentState(format!(
                        "empty level persisted at {price}"
                    )));
                }

                let mut volume = 0u64;
                let mut count = 0usize;
                for node in level.orders(&self.order_pool) {
                    if node.level != Some(level_handle) || node.side != side || node.price != price
                    {
                        return Err(ReplayError::InconsistentState(format!(
                            "order {} mislinked at level {price}",
                            node.id
                        )));
                    }
                    match self.orders.get(&node.id) {
                        Some(&mapped) if self.order_pool.get(mapped).map(|o| o.id) == Some(node.id) => {}
                        _ => {
                            return Err(ReplayError::InconsistentState(format!(
                                "order {} queued but not indexed",
                                node.id
                            )))
                        }
                    }
                    volume += u64::from(node.quantity);
                    count += 1;
                }
                if volume != level.total_volume || count != level.order_count {
                    return Err(ReplayError::InconsistentState(format!(
                        "level {price} aggregates drifted: cached ({}, {}) actual ({volume}, {count})",
                        level.total_volume, level.order_count
                    )));
                }
                queued += count;
            }

            let cached = self.best(side);
            if cached != ladder.best() {
                return Err(ReplayError::InconsistentState(format!(
                    "stale best cache on {side:?} side"
                )));
            }
        }

        if queued != self.orders.len() {
            return Err(ReplayError::InconsistentState(format!(
                "{} orders indexed but {} queued",
                self.orders.len(),
                queued
            )));
        }

        Ok(())
    }
}
