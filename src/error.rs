//! Error types for the replay engine.
//!
//! Clean error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Result type alias for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Main error type for replay operations.
#[derive(Error, Debug, Clone)]
pub enum ReplayError {
    /// Operation referenced an order id that is not resting
    #[error("Unknown order reference: {0}")]
    UnknownOrder(u64),

    /// AddOrder (or Replace target) with an id that is already resting
    #[error("Duplicate order reference: {0}")]
    DuplicateOrder(u64),

    /// Operation referenced a stock locate with no book
    #[error("Unknown stock locate: {0}")]
    UnknownSymbol(u16),

    /// Order quantity outside the valid range (e.g. zero shares on add)
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// Buy/sell indicator byte was neither 'B' nor 'S'
    #[error("Invalid side byte: {0:#04x}")]
    InvalidSide(u8),

    /// Message body shorter than its type requires
    #[error("Truncated message type {kind:#04x}: {len} bytes")]
    TruncatedMessage {
        /// ITCH message type byte
        kind: u8,
        /// Actual body length
        len: usize,
    },

    /// Message type byte not part of ITCH 5.0
    #[error("Unknown message type: {0:#04x}")]
    UnknownMessageType(u8),

    /// Book state inconsistency detected
    #[error("Book inconsistency: {0}")]
    InconsistentState(String),

    /// I/O failure while reading the input stream
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        ReplayError::Io(err.to_string())
    }
}
