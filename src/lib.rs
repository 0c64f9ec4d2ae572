//! # itch-lob-replay
//!
//! High-performance NASDAQ TotalView-ITCH 5.0 replay: reconstructs the
//! exchange's visible per-symbol limit order books from the raw message
//! stream and reports every state transition to an observer.
//!
//! ## Features
//!
//! - **ITCH 5.0 parsing**: incremental framed-stream decoder that
//!   tolerates arbitrary read-chunk boundaries
//! - **Full-depth books**: price-ordered ladders with per-level FIFO
//!   queues, pooled order/level nodes, cached best bid/ask
//! - **Observer callbacks**: add/update/delete for symbols, books,
//!   levels and orders, plus execution prints
//! - **Defensive replay**: protocol violations are counted and skipped
//!   (or surfaced as errors in strict mode)
//!
//! ## Quick Start
//!
//! ```rust
//! use itch_lob_replay::{MarketRegistry, NullObserver, Side, Symbol};
//!
//! let mut market = MarketRegistry::new(NullObserver);
//!
//! // Normally driven by StockDirectory messages.
//! market.add_symbol(Symbol::new(42, *b"AAPL    "));
//! market.add_book(42);
//!
//! // Rest an order: 100 shares bid at $10.00 (prices are 1/10000 dollar).
//! market.add_order(1, 42, Side::Buy, 100_000, 100).unwrap();
//!
//! let book = market.book(42).unwrap();
//! assert_eq!(book.best_bid_price(), Some(100_000));
//! ```
//!
//! ## Replaying a Byte Stream
//!
//! ```rust
//! use itch_lob_replay::{CountingObserver, ItchParser, MarketRegistry};
//!
//! let mut parser = ItchParser::new();
//! let mut market = MarketRegistry::new(CountingObserver::new());
//!
//! // Feed chunks straight from a file or stdin.
//! let chunk: &[u8] = &[];
//! parser.process(chunk, |message| {
//!     let _ = market.apply(&message);
//! });
//!
//! println!("decoded {} messages", parser.messages());
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Core types: `Side`, `Symbol`, `Order`, `LevelInfo` |
//! | [`itch`] | ITCH 5.0 framing and typed messages |
//! | [`book`] | Book engine: pools, levels, ladders, `Book`, `MarketRegistry` |
//! | [`observer`] | `MarketObserver` trait and stock implementations |

pub mod book;
pub mod error;
pub mod itch;
pub mod observer;
pub mod types;

// Re-exports - Core types
pub use error::{ReplayError, Result};
pub use types::{LevelInfo, Order, Side, Symbol, UpdateKind, PRICE_SCALE};

// Re-exports - Book engine
pub use book::{Book, LevelUpdate, MarketRegistry, PriceLadder, ReplayConfig};

// Re-exports - ITCH parsing
pub use itch::{ItchMessage, ItchParser};

// Re-exports - Observers
pub use observer::{CountingObserver, MarketObserver, MarketStats, NullObserver};
