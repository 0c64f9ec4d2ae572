//! Observer surface invoked by the registry on every state transition.
//!
//! Implementations receive borrowed snapshots and must not attempt to
//! mutate the market (callbacks run synchronously on the mutation
//! path). All methods default to no-ops so an observer only implements
//! the transitions it cares about.

use serde::{Deserialize, Serialize};

use crate::book::Book;
use crate::types::{LevelInfo, Order, Symbol};

/// Callbacks for every market state transition.
///
/// Ordering contract: for each book operation the specific level
/// callback (`on_add_level` / `on_update_level` / `on_delete_level`)
/// always precedes `on_update_book`, so observers can compute
/// top-of-book deltas from the pair.
pub trait MarketObserver {
    /// A symbol was announced by the stock directory.
    fn on_add_symbol(&mut self, _symbol: &Symbol) {}

    /// A symbol was withdrawn. Not driven during an ITCH session.
    fn on_delete_symbol(&mut self, _symbol: &Symbol) {}

    /// A book was created for a symbol.
    fn on_add_book(&mut self, _book: &Book) {}

    /// A book was destroyed. Not driven during an ITCH session.
    fn on_delete_book(&mut self, _book: &Book) {}

    /// A book changed; `top` reports whether the best level on the
    /// mutated side was involved.
    fn on_update_book(&mut self, _book: &Book, _top: bool, _symbol: u16) {}

    /// A price level was created.
    fn on_add_level(&mut self, _book: &Book, _level: &LevelInfo, _top: bool) {}

    /// A price level's aggregates changed.
    fn on_update_level(&mut self, _book: &Book, _level: &LevelInfo, _top: bool) {}

    /// A price level was drained and removed.
    fn on_delete_level(&mut self, _book: &Book, _level: &LevelInfo, _top: bool) {}

    /// An order started resting.
    fn on_add_order(&mut self, _order: &Order) {}

    /// A resting order's remaining quantity changed.
    fn on_update_order(&mut self, _order: &Order) {}

    /// An order left the book.
    fn on_delete_order(&mut self, _order: &Order) {}

    /// An order traded `quantity` shares at `price`.
    fn on_execute_order(&mut self, _order: &Order, _price: u32, _quantity: u32) {}
}

/// Observer that ignores every callback.
///
/// Useful for benchmarks and for driving the engine purely for its
/// final state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl MarketObserver for NullObserver {}

/// Aggregate market statistics collected by [`CountingObserver`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStats {
    /// Total observer callbacks received
    pub updates: u64,

    /// Currently listed symbols
    pub symbols: usize,
    /// Peak listed symbols
    pub max_symbols: usize,

    /// Currently live books
    pub books: usize,
    /// Peak live books
    pub max_books: usize,

    /// Deepest per-side level count seen in any book
    pub max_book_depth: usize,
    /// Stock locate of the book that reached `max_book_depth`
    pub deepest_symbol: Option<u16>,

    /// Currently resting orders
    pub orders: usize,
    /// Peak resting orders
    pub max_orders: usize,

    /// Add-order operations
    pub add_orders: u64,
    /// Update-order operations
    pub update_orders: u64,
    /// Delete-order operations
    pub delete_orders: u64,
    /// Execute-order operations
    pub execute_orders: u64,
}

/// Observer that tracks operation counts and high-water marks.
#[derive(Debug, Default, Clone)]
pub struct CountingObserver {
    stats: MarketStats,
}

impl CountingObserver {
    /// Create an observer with zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the collected statistics.
    pub fn stats(&self) -> &MarketStats {
        &self.stats
    }

    /// Consume the observer, returning the collected statistics.
    pub fn into_stats(self) -> MarketStats {
        self.stats
    }
}

impl MarketObserver for CountingObserver {
    fn on_add_symbol(&mut self, _symbol: &Symbol) {
        self.stats.updates += 1;
        self.stats.symbols += 1;
        self.stats.max_symbols = self.stats.max_symbols.max(self.stats.symbols);
    }

    fn on_delete_symbol(&mut self, _symbol: &Symbol) {
        self.stats.updates += 1;
        self.stats.symbols -= 1;
    }

    fn on_add_book(&mut self, _book: &Book) {
        self.stats.updates += 1;
        self.stats.books += 1;
        self.stats.max_books = self.stats.max_books.max(self.stats.books);
    }

    fn on_delete_book(&mut self, _book: &Book) {
        self.stats.updates += 1;
        self.stats.books -= 1;
    }

    fn on_update_book(&mut self, book: &Book, _top: bool, symbol: u16) {
        let depth = book.depth();
        if depth > self.stats.max_book_depth {
            self.stats.max_book_depth = depth;
            self.stats.deepest_symbol = Some(symbol);
        }
    }

    fn on_add_level(&mut self, _book: &Book, _level: &LevelInfo, _top: bool) {
        self.stats.updates += 1;
    }

    fn on_update_level(&mut self, _book: &Book, _level: &LevelInfo, _top: bool) {
        self.stats.updates += 1;
    }

    fn on_delete_level(&mut self, _book: &Book, _level: &LevelInfo, _top: bool) {
        self.stats.updates += 1;
    }

    fn on_add_order(&mut self, _order: &Order) {
        self.stats.updates += 1;
        self.stats.orders += 1;
        self.stats.max_orders = self.stats.max_orders.max(self.stats.orders);
        self.stats.add_orders += 1;
    }

    fn on_update_order(&mut self, _order: &Order) {
        self.stats.updates += 1;
        self.stats.update_orders += 1;
    }

    fn on_delete_order(&mut self, _order: &Order) {
        self.stats.updates += 1;
        self.stats.orders -= 1;
        self.stats.delete_orders += 1;
    }

    fn on_execute_order(&mut self, _order: &Order, _price: u32, _quantity: u32) {
        self.stats.updates += 1;
        self.stats.execute_orders += 1;
    }
}
