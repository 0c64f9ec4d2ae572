//! NASDAQ TotalView-ITCH 5.0 stream parser.
//!
//! ITCH is a framed big-endian binary stream: each message is
//! `[u16 length][u8 type][body]`, where `length` covers the type byte
//! and the body. Every body starts with stock locate (2), tracking
//! number (2) and a 6-byte timestamp; payload fields follow at offset
//! 10. Nothing downstream consumes the tracking number or timestamp,
//! so the parser skips them.
//!
//! The parser is incremental: feed it arbitrary read chunks and it
//! carries partial frames across calls, so messages split by buffer
//! boundaries decode exactly once.
//!
//! Message set (sizes are body bytes, type excluded):
//!
//! | Type | Message | Body |
//! |------|---------|------|
//! | `S` | System Event | 11 |
//! | `R` | Stock Directory | 38 |
//! | `H` | Stock Trading Action | 24 |
//! | `Y` | Reg SHO Restriction | 19 |
//! | `L` | Market Participant Position | 25 |
//! | `V` | MWCB Decline Level | 34 |
//! | `W` | MWCB Status | 11 |
//! | `K` | IPO Quoting Period | 27 |
//! | `J` | LULD Auction Collar | 34 |
//! | `A` | Add Order | 35 |
//! | `F` | Add Order with MPID | 39 |
//! | `E` | Order Executed | 30 |
//! | `C` | Order Executed with Price | 35 |
//! | `X` | Order Cancel | 22 |
//! | `D` | Order Delete | 18 |
//! | `U` | Order Replace | 34 |
//! | `P` | Trade (non-cross) | 43 |
//! | `Q` | Cross Trade | 39 |
//! | `B` | Broken Trade | 18 |
//! | `I` | Net Order Imbalance | 49 |
//! | `N` | Retail Price Improvement | 19 |

use crate::error::{ReplayError, Result};
use crate::types::Side;

/// A decoded ITCH 5.0 message.
///
/// Order-affecting variants carry every field the book engine needs;
/// informational variants are decoded just far enough to be counted
/// and filtered by locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItchMessage {
    /// `S`: market-wide session event
    SystemEvent { locate: u16, event: u8 },
    /// `R`: instrument definition; drives symbol and book creation
    StockDirectory { locate: u16, stock: [u8; 8] },
    /// `H`: per-instrument trading state change
    StockTradingAction { locate: u16, state: u8 },
    /// `Y`: short sale price test restriction
    RegSho { locate: u16, action: u8 },
    /// `L`: market maker registration
    MarketParticipantPosition { locate: u16 },
    /// `V`: market-wide circuit breaker decline levels
    MwcbDecline { locate: u16 },
    /// `W`: market-wide circuit breaker breach
    MwcbStatus { locate: u16, level: u8 },
    /// `K`: IPO quoting period update
    IpoQuoting { locate: u16 },
    /// `J`: limit-up/limit-down auction collar
    LuldAuctionCollar { locate: u16 },
    /// `A`: new visible order
    AddOrder {
        order_ref: u64,
        locate: u16,
        side: Side,
        shares: u32,
        stock: [u8; 8],
        price: u32,
    },
    /// `F`: new visible order with market participant attribution
    AddOrderMpid {
        order_ref: u64,
        locate: u16,
        side: Side,
        shares: u32,
        stock: [u8; 8],
        price: u32,
        mpid: [u8; 4],
    },
    /// `E`: execution at the resting price
    OrderExecuted {
        order_ref: u64,
        locate: u16,
        executed: u32,
        match_number: u64,
    },
    /// `C`: execution at an explicit price
    OrderExecutedWithPrice {
        order_ref: u64,
        locate: u16,
        executed: u32,
        match_number: u64,
        printable: bool,
        execution_price: u32,
    },
    /// `X`: partial cancel
    OrderCancel {
        order_ref: u64,
        locate: u16,
        canceled: u32,
    },
    /// `D`: full cancel
    OrderDelete { order_ref: u64, locate: u16 },
    /// `U`: cancel-and-rewrite under a new reference number
    OrderReplace {
        original_ref: u64,
        locate: u16,
        new_ref: u64,
        shares: u32,
        price: u32,
    },
    /// `P`: match against a hidden order; no book effect
    Trade {
        locate: u16,
        shares: u32,
        price: u32,
    },
    /// `Q`: auction/cross execution
    CrossTrade { locate: u16 },
    /// `B`: trade break
    BrokenTrade { locate: u16 },
    /// `I`: auction imbalance indicator
    Noii { locate: u16 },
    /// `N`: retail price improvement indicator
    Rpii { locate: u16 },
}

impl ItchMessage {
    /// Check if this message mutates book state when applied.
    pub fn is_order_message(&self) -> bool {
        matches!(
            self,
            ItchMessage::AddOrder { .. }
                | ItchMessage::AddOrderMpid { .. }
                | ItchMessage::OrderExecuted { .. }
                | ItchMessage::OrderExecutedWithPrice { .. }
                | ItchMessage::OrderCancel { .. }
                | ItchMessage::OrderDelete { .. }
                | ItchMessage::OrderReplace { .. }
        )
    }
}

#[inline]
fn be_u16(body: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([body[off], body[off + 1]])
}

#[inline]
fn be_u32(body: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]])
}

#[inline]
fn be_u64(body: &[u8], off: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&body[off..off + 8]);
    u64::from_be_bytes(bytes)
}

#[inline]
fn bytes4(body: &[u8], off: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&body[off..off + 4]);
    out
}

#[inline]
fn bytes8(body: &[u8], off: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&body[off..off + 8]);
    out
}

/// Minimum body length per message type, `None` for unknown types.
fn body_len(kind: u8) -> Option<usize> {
    match kind {
        b'S' => Some(11),
        b'R' => Some(38),
        b'H' => Some(24),
        b'Y' => Some(19),
        b'L' => Some(25),
        b'V' => Some(34),
        b'W' => Some(11),
        b'K' => Some(27),
        b'J' => Some(34),
        b'A' => Some(35),
        b'F' => Some(39),
        b'E' => Some(30),
        b'C' => Some(35),
        b'X' => Some(22),
        b'D' => Some(18),
        b'U' => Some(34),
        b'P' => Some(43),
        b'Q' => Some(39),
        b'B' => Some(18),
        b'I' => Some(49),
        b'N' => Some(19),
        _ => None,
    }
}

/// Decode one message body (the bytes after the type byte).
pub fn parse_message(kind: u8, body: &[u8]) -> Result<ItchMessage> {
    let expected = body_len(kind).ok_or(ReplayError::UnknownMessageType(kind))?;
    if body.len() < expected {
        return Err(ReplayError::TruncatedMessage {
            kind,
            len: body.len(),
        });
    }

    let locate = be_u16(body, 0);
    let message = match kind {
        b'S' => ItchMessage::SystemEvent {
            locate,
            event: body[10],
        },
        b'R' => ItchMessage::StockDirectory {
            locate,
            stock: bytes8(body, 10),
        },
        b'H' => ItchMessage::StockTradingAction {
            locate,
            state: body[18],
        },
        b'Y' => ItchMessage::RegSho {
            locate,
            action: body[18],
        },
        b'L' => ItchMessage::MarketParticipantPosition { locate },
        b'V' => ItchMessage::MwcbDecline { locate },
        b'W' => ItchMessage::MwcbStatus {
            locate,
            level: body[10],
        },
        b'K' => ItchMessage::IpoQuoting { locate },
        b'J' => ItchMessage::LuldAuctionCollar { locate },
        b'A' => ItchMessage::AddOrder {
            order_ref: be_u64(body, 10),
            locate,
            side: Side::from_byte(body[18]).ok_or(ReplayError::InvalidSide(body[18]))?,
            shares: be_u32(body, 19),
            stock: bytes8(body, 23),
            price: be_u32(body, 31),
        },
        b'F' => ItchMessage::AddOrderMpid {
            order_ref: be_u64(body, 10),
            locate,
            side: Side::from_byte(body[18]).ok_or(ReplayError::InvalidSide(body[18]))?,
            shares: be_u32(body, 19),
            stock: bytes8(body, 23),
            price: be_u32(body, 31),
            mpid: bytes4(body, 35),
        },
        b'E' => ItchMessage::OrderExecuted {
            order_ref: be_u64(body, 10),
            locate,
            executed: be_u32(body, 18),
            match_number: be_u64(body, 22),
        },
        b'C' => ItchMessage::OrderExecutedWithPrice {
            order_ref: be_u64(body, 10),
            locate,
            executed: be_u32(body, 18),
            match_number: be_u64(body, 22),
            printable: body[30] == b'Y',
            execution_price: be_u32(body, 31),
        },
        b'X' => ItchMessage::OrderCancel {
            order_ref: be_u64(body, 10),
            locate,
            canceled: be_u32(body, 18),
        },
        b'D' => ItchMessage::OrderDelete {
            order_ref: be_u64(body, 10),
            locate,
        },
        b'U' => ItchMessage::OrderReplace {
            original_ref: be_u64(body, 10),
            locate,
            new_ref: be_u64(body, 18),
            shares: be_u32(body, 26),
            price: be_u32(body, 30),
        },
        b'P' => ItchMessage::Trade {
            locate,
            shares: be_u32(body, 19),
            price: be_u32(body, 31),
        },
        b'Q' => ItchMessage::CrossTrade { locate },
        b'B' => ItchMessage::BrokenTrade { locate },
        b'I' => ItchMessage::Noii { locate },
        b'N' => ItchMessage::Rpii { locate },
        _ => return Err(ReplayError::UnknownMessageType(kind)),
    };

    Ok(message)
}

/// Incremental frame walker over an ITCH byte stream.
///
/// Bytes arrive in arbitrary chunks; frames that straddle a chunk
/// boundary are stashed and completed by the next call. Malformed
/// frames are counted and skipped so one bad message cannot poison the
/// rest of the stream.
#[derive(Debug, Default)]
pub struct ItchParser {
    carry: Vec<u8>,
    messages: u64,
    errors: u64,
}

impl ItchParser {
    /// Create a parser with an empty carry buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded message count.
    pub fn messages(&self) -> u64 {
        self.messages
    }

    /// Malformed or unknown message count.
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Bytes of an incomplete trailing frame still buffered.
    ///
    /// Non-zero after the final chunk means the stream was cut mid
    /// message.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    /// Consume a chunk, invoking `sink` for each complete message.
    pub fn process<F>(&mut self, data: &[u8], mut sink: F)
    where
        F: FnMut(ItchMessage),
    {
        if self.carry.is_empty() {
            let consumed = self.scan(data, &mut sink);
            if consumed < data.len() {
                self.carry.extend_from_slice(&data[consumed..]);
            }
        } else {
            let mut buffered = std::mem::take(&mut self.carry);
            buffered.extend_from_slice(data);
            let consumed = self.scan(&buffered, &mut sink);
            if consumed < buffered.len() {
                self.carry.extend_from_slice(&buffered[consumed..]);
            }
        }
    }

    /// Walk complete frames in `data`; returns bytes consumed.
    fn scan<F>(&mut self, data: &[u8], sink: &mut F) -> usize
    where
        F: FnMut(ItchMessage),
    {
        let mut offset = 0usize;

        while offset + 2 <= data.len() {
            let frame_len = be_u16(data, offset) as usize;
            if frame_len == 0 {
                // A frame must at least contain the type byte.
                self.errors += 1;
                offset += 2;
                continue;
            }
            if offset + 2 + frame_len > data.len() {
                break;
            }

            let frame = &data[offset + 2..offset + 2 + frame_len];
            offset += 2 + frame_len;

            match parse_message(frame[0], &frame[1..]) {
                Ok(message) => {
                    self.messages += 1;
                    sink(message);
                }
                Err(err) => {
                    self.errors += 1;
                    log::debug!("skipping malformed frame: {err}");
                }
            }
        }

        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame a message body (type byte + payload) the way the wire does.
    fn frame(kind: u8, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + body.len());
        out.extend_from_slice(&((body.len() as u16 + 1).to_be_bytes()));
        out.push(kind);
        out.extend_from_slice(body);
        out
    }

    fn add_order_body(locate: u16, order_ref: u64, side: u8, shares: u32, price: u32) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&locate.to_be_bytes());
        body.extend_from_slice(&[0u8; 2]); // tracking
        body.extend_from_slice(&[0u8; 6]); // timestamp
        body.extend_from_slice(&order_ref.to_be_bytes());
        body.push(side);
        body.extend_from_slice(&shares.to_be_bytes());
        body.extend_from_slice(b"TEST    ");
        body.extend_from_slice(&price.to_be_bytes());
        body
    }

    fn delete_body(locate: u16, order_ref: u64) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&locate.to_be_bytes());
        body.extend_from_slice(&[0u8; 8]);
        body.extend_from_slice(&order_ref.to_be_bytes());
        body
    }

    #[test]
    fn test_parse_add_order() {
        let body = add_order_body(42, 1001, b'B', 100, 10_000);
        let message = parse_message(b'A', &body).unwrap();

        assert_eq!(
            message,
            ItchMessage::AddOrder {
                order_ref: 1001,
                locate: 42,
                side: Side::Buy,
                shares: 100,
                stock: *b"TEST    ",
                price: 10_000,
            }
        );
        assert!(message.is_order_message());
    }

    #[test]
    fn test_parse_add_order_mpid() {
        let mut body = add_order_body(42, 1001, b'S', 100, 10_000);
        body.extend_from_slice(b"MPID");
        let message = parse_message(b'F', &body).unwrap();

        match message {
            ItchMessage::AddOrderMpid { side, mpid, .. } => {
                assert_eq!(side, Side::Sell);
                assert_eq!(&mpid, b"MPID");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_side() {
        let body = add_order_body(42, 1001, b'Z', 100, 10_000);
        let err = parse_message(b'A', &body).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidSide(b'Z')));
    }

    #[test]
    fn test_parse_executed_with_price() {
        let mut body = Vec::new();
        body.extend_from_slice(&7u16.to_be_bytes());
        body.extend_from_slice(&[0u8; 8]);
        body.extend_from_slice(&55u64.to_be_bytes()); // order_ref
        body.extend_from_slice(&30u32.to_be_bytes()); // executed
        body.extend_from_slice(&900u64.to_be_bytes()); // match
        body.push(b'Y');
        body.extend_from_slice(&10_005u32.to_be_bytes());

        let message = parse_message(b'C', &body).unwrap();
        assert_eq!(
            message,
            ItchMessage::OrderExecutedWithPrice {
                order_ref: 55,
                locate: 7,
                executed: 30,
                match_number: 900,
                printable: true,
                execution_price: 10_005,
            }
        );
    }

    #[test]
    fn test_parse_replace() {
        let mut body = Vec::new();
        body.extend_from_slice(&7u16.to_be_bytes());
        body.extend_from_slice(&[0u8; 8]);
        body.extend_from_slice(&100u64.to_be_bytes());
        body.extend_from_slice(&101u64.to_be_bytes());
        body.extend_from_slice(&5u32.to_be_bytes());
        body.extend_from_slice(&210u32.to_be_bytes());

        let message = parse_message(b'U', &body).unwrap();
        assert_eq!(
            message,
            ItchMessage::OrderReplace {
                original_ref: 100,
                locate: 7,
                new_ref: 101,
                shares: 5,
                price: 210,
            }
        );
    }

    #[test]
    fn test_parse_truncated() {
        let body = add_order_body(42, 1001, b'B', 100, 10_000);
        let err = parse_message(b'A', &body[..20]).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::TruncatedMessage { kind: b'A', len: 20 }
        ));
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = parse_message(b'z', &[0u8; 64]).unwrap_err();
        assert!(matches!(err, ReplayError::UnknownMessageType(b'z')));
    }

    #[test]
    fn test_informational_messages_are_not_order_messages() {
        let mut body = vec![0u8; 11];
        body[10] = b'O';
        let message = parse_message(b'S', &body).unwrap();
        assert_eq!(
            message,
            ItchMessage::SystemEvent {
                locate: 0,
                event: b'O'
            }
        );
        assert!(!message.is_order_message());
    }

    #[test]
    fn test_stream_parses_consecutive_frames() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&frame(b'A', &add_order_body(1, 10, b'B', 100, 500)));
        stream.extend_from_slice(&frame(b'D', &delete_body(1, 10)));

        let mut parser = ItchParser::new();
        let mut seen = Vec::new();
        parser.process(&stream, |m| seen.push(m));

        assert_eq!(parser.messages(), 2);
        assert_eq!(parser.errors(), 0);
        assert_eq!(parser.pending(), 0);
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[1], ItchMessage::OrderDelete { order_ref: 10, locate: 1 }));
    }

    #[test]
    fn test_stream_handles_chunk_boundaries() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&frame(b'A', &add_order_body(1, 10, b'B', 100, 500)));
        stream.extend_from_slice(&frame(b'X', &{
            let mut b = delete_body(1, 10);
            b.extend_from_slice(&25u32.to_be_bytes());
            b
        }));
        stream.extend_from_slice(&frame(b'D', &delete_body(1, 10)));

        // Feed the stream one byte at a time.
        let mut parser = ItchParser::new();
        let mut seen = Vec::new();
        for byte in &stream {
            parser.process(std::slice::from_ref(byte), |m| seen.push(m));
        }

        assert_eq!(parser.messages(), 3);
        assert_eq!(parser.errors(), 0);
        assert_eq!(parser.pending(), 0);
        assert!(matches!(seen[1], ItchMessage::OrderCancel { canceled: 25, .. }));
    }

    #[test]
    fn test_stream_counts_unknown_types_and_recovers() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&frame(b'z', &[0u8; 5]));
        stream.extend_from_slice(&frame(b'A', &add_order_body(1, 10, b'B', 100, 500)));

        let mut parser = ItchParser::new();
        let mut seen = Vec::new();
        parser.process(&stream, |m| seen.push(m));

        assert_eq!(parser.errors(), 1);
        assert_eq!(parser.messages(), 1);
        assert!(matches!(seen[0], ItchMessage::AddOrder { .. }));
    }

    #[test]
    fn test_stream_reports_trailing_partial_frame() {
        let full = frame(b'A', &add_order_body(1, 10, b'B', 100, 500));
        let mut parser = ItchParser::new();
        parser.process(&full[..10], |_| {});

        assert_eq!(parser.messages(), 0);
        assert_eq!(parser.pending(), 10);

        parser.process(&full[10..], |_| {});
        assert_eq!(parser.messages(), 1);
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn test_zero_length_frame_is_skipped() {
        let mut stream = vec![0u8, 0u8];
        stream.extend_from_slice(&frame(b'D', &delete_body(1, 10)));

        let mut parser = ItchParser::new();
        let mut count = 0;
        parser.process(&stream, |_| count += 1);

        assert_eq!(parser.errors(), 1);
        assert_eq!(count, 1);
    }
}
