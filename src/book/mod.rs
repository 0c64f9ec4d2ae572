//! Order book engine.
//!
//! Pooled nodes, intrusive per-level FIFOs, ordered price ladders and
//! the per-symbol [`Book`] built from them, plus the locate-indexed
//! [`MarketRegistry`] that drives books from the ITCH event stream.

pub mod book;
pub mod ladder;
pub mod level;
pub mod pool;
pub mod registry;

pub use book::{Applied, Book, Exchanged, Execution, LevelUpdate};
pub use ladder::PriceLadder;
pub use level::{LevelNode, OrderNode};
pub use pool::{Handle, Pool};
pub use registry::{MarketRegistry, ReplayConfig};
