//! Market registry: stock locate → book dispatch.
//!
//! The locate space is small (a few thousand per session), so symbols
//! and books live in dense tables indexed by locate. The registry owns
//! the observer and fans every book mutation out to it, preserving the
//! callback ordering documented on [`MarketObserver`].

use crate::error::{ReplayError, Result};
use crate::itch::ItchMessage;
use crate::observer::MarketObserver;
use crate::types::{Side, Symbol, UpdateKind};

use super::book::{Book, LevelUpdate};

/// Initial size of the locate-indexed tables; grows on demand.
const LOCATE_TABLE: usize = 10_000;

/// Behavior knobs for the replay engine.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Turn protocol violations into hard errors instead of skipping
    pub strict: bool,

    /// Log skipped operations at debug level
    pub log_warnings: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            strict: false,
            log_warnings: true,
        }
    }
}

impl ReplayConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail hard on protocol violations.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable/disable warning logs.
    pub fn with_logging(mut self, log: bool) -> Self {
        self.log_warnings = log;
        self
    }
}

/// Per-symbol book collection driven by the typed ITCH event stream.
pub struct MarketRegistry<H: MarketObserver> {
    config: ReplayConfig,
    symbols: Vec<Option<Symbol>>,
    books: Vec<Option<Book>>,
    observer: H,
    ignored_messages: u64,
    protocol_errors: u64,
}

impl<H: MarketObserver> MarketRegistry<H> {
    /// Create a registry with the default configuration.
    pub fn new(observer: H) -> Self {
        Self::with_config(ReplayConfig::default(), observer)
    }

    /// Create a registry with a custom configuration.
    pub fn with_config(config: ReplayConfig, observer: H) -> Self {
        let mut symbols = Vec::new();
        symbols.resize_with(LOCATE_TABLE, || None);
        let mut books = Vec::new();
        books.resize_with(LOCATE_TABLE, || None);
        Self {
            config,
            symbols,
            books,
            observer,
            ignored_messages: 0,
            protocol_errors: 0,
        }
    }

    /// Borrow the observer.
    pub fn observer(&self) -> &H {
        &self.observer
    }

    /// Consume the registry, returning the observer.
    pub fn into_observer(self) -> H {
        self.observer
    }

    /// Look up the book for `locate`.
    pub fn book(&self, locate: u16) -> Option<&Book> {
        self.books.get(locate as usize).and_then(Option::as_ref)
    }

    /// Look up the symbol for `locate`.
    pub fn symbol(&self, locate: u16) -> Option<&Symbol> {
        self.symbols.get(locate as usize).and_then(Option::as_ref)
    }

    /// Number of live books.
    pub fn book_count(&self) -> usize {
        self.books.iter().filter(|b| b.is_some()).count()
    }

    /// Non-order messages consumed and ignored by `apply`.
    pub fn ignored_messages(&self) -> u64 {
        self.ignored_messages
    }

    /// Operations skipped because they violated the ITCH protocol.
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors
    }

    /// Register a symbol from the stock directory.
    pub fn add_symbol(&mut self, symbol: Symbol) {
        self.ensure_locate(symbol.id);
        self.symbols[symbol.id as usize] = Some(symbol);
        self.observer.on_add_symbol(&symbol);
    }

    /// Create the book for `locate` if it does not exist yet.
    pub fn add_book(&mut self, locate: u16) {
        self.ensure_locate(locate);
        if self.books[locate as usize].is_some() {
            return;
        }
        self.books[locate as usize] = Some(Book::new(locate));
        if let Some(book) = self.books[locate as usize].as_ref() {
            self.observer.on_add_book(book);
        }
    }

    /// Rest a new order.
    pub fn add_order(
        &mut self,
        id: u64,
        locate: u16,
        side: Side,
        price: u32,
        quantity: u32,
    ) -> Result<()> {
        let outcome = match self.books.get_mut(locate as usize).and_then(Option::as_mut) {
            Some(book) => book.add_order(id, side, price, quantity),
            None => Err(ReplayError::UnknownSymbol(locate)),
        };
        match outcome {
            Ok(applied) => {
                if let Some(book) = self.books.get(locate as usize).and_then(Option::as_ref) {
                    self.observer.on_add_order(&applied.order);
                    emit_level(&mut self.observer, book, &applied.update, locate);
                }
                Ok(())
            }
            Err(err) => self.protocol_violation(err),
        }
    }

    /// Cancel up to `quantity` shares of a resting order.
    pub fn reduce_order(&mut self, id: u64, locate: u16, quantity: u32) -> Result<()> {
        let outcome = match self.books.get_mut(locate as usize).and_then(Option::as_mut) {
            Some(book) => book.reduce_order(id, quantity),
            None => Err(ReplayError::UnknownSymbol(locate)),
        };
        match outcome {
            Ok(applied) => {
                if let Some(book) = self.books.get(locate as usize).and_then(Option::as_ref) {
                    if applied.removed {
                        self.observer.on_delete_order(&applied.order);
                    } else {
                        self.observer.on_update_order(&applied.order);
                    }
                    emit_level(&mut self.observer, book, &applied.update, locate);
                }
                Ok(())
            }
            Err(err) => self.protocol_violation(err),
        }
    }

    /// Remove a resting order outright.
    pub fn delete_order(&mut self, id: u64, locate: u16) -> Result<()> {
        let outcome = match self.books.get_mut(locate as usize).and_then(Option::as_mut) {
            Some(book) => book.delete_order(id),
            None => Err(ReplayError::UnknownSymbol(locate)),
        };
        match outcome {
            Ok(applied) => {
                if let Some(book) = self.books.get(locate as usize).and_then(Option::as_ref) {
                    emit_level(&mut self.observer, book, &applied.update, locate);
                    self.observer.on_delete_order(&applied.order);
                }
                Ok(())
            }
            Err(err) => self.protocol_violation(err),
        }
    }

    /// Execute shares against a resting order at its resting price.
    pub fn execute_order(&mut self, id: u64, locate: u16, quantity: u32) -> Result<()> {
        self.execute_inner(id, locate, quantity, None)
    }

    /// Execute shares against a resting order at an explicit price.
    pub fn execute_order_at(
        &mut self,
        id: u64,
        locate: u16,
        price: u32,
        quantity: u32,
    ) -> Result<()> {
        self.execute_inner(id, locate, quantity, Some(price))
    }

    fn execute_inner(
        &mut self,
        id: u64,
        locate: u16,
        quantity: u32,
        price: Option<u32>,
    ) -> Result<()> {
        let outcome = match self.books.get_mut(locate as usize).and_then(Option::as_mut) {
            Some(book) => book.execute_order(id, quantity, price),
            None => Err(ReplayError::UnknownSymbol(locate)),
        };
        match outcome {
            Ok(execution) => {
                if let Some(book) = self.books.get(locate as usize).and_then(Option::as_ref) {
                    let applied = &execution.applied;
                    self.observer
                        .on_execute_order(&applied.order, execution.price, execution.quantity);
                    emit_level(&mut self.observer, book, &applied.update, locate);
                    if applied.removed {
                        self.observer.on_delete_order(&applied.order);
                    } else {
                        self.observer.on_update_order(&applied.order);
                    }
                }
                Ok(())
            }
            Err(err) => self.protocol_violation(err),
        }
    }

    /// Reprice a resting order in place (delete + re-add, keeping the id).
    ///
    /// No ITCH message drives this; it is kept as the single-order
    /// price/size change primitive.
    pub fn modify_order(
        &mut self,
        id: u64,
        locate: u16,
        new_price: u32,
        new_quantity: u32,
    ) -> Result<()> {
        let outcome = match self.books.get_mut(locate as usize).and_then(Option::as_mut) {
            Some(book) => book.modify_order(id, new_price, new_quantity),
            None => Err(ReplayError::UnknownSymbol(locate)),
        };
        match outcome {
            Ok(exchanged) => {
                if let Some(book) = self.books.get(locate as usize).and_then(Option::as_ref) {
                    emit_level(&mut self.observer, book, &exchanged.removed.update, locate);
                    match exchanged.added.as_ref() {
                        Some(added) => {
                            self.observer.on_update_order(&added.order);
                            emit_level(&mut self.observer, book, &added.update, locate);
                        }
                        None => self.observer.on_delete_order(&exchanged.removed.order),
                    }
                }
                Ok(())
            }
            Err(err) => self.protocol_violation(err),
        }
    }

    /// Retire `old_id` and rest its remainder under `new_id`.
    pub fn replace_order(
        &mut self,
        old_id: u64,
        locate: u16,
        new_id: u64,
        new_price: u32,
        new_quantity: u32,
    ) -> Result<()> {
        let outcome = match self.books.get_mut(locate as usize).and_then(Option::as_mut) {
            Some(book) => book.replace_order(old_id, new_id, new_price, new_quantity),
            None => Err(ReplayError::UnknownSymbol(locate)),
        };
        match outcome {
            Ok(exchanged) => {
                if let Some(book) = self.books.get(locate as usize).and_then(Option::as_ref) {
                    emit_level(&mut self.observer, book, &exchanged.removed.update, locate);
                    self.observer.on_delete_order(&exchanged.removed.order);
                    if let Some(added) = exchanged.added.as_ref() {
                        self.observer.on_add_order(&added.order);
                        emit_level(&mut self.observer, book, &added.update, locate);
                    }
                }
                Ok(())
            }
            Err(err) => self.protocol_violation(err),
        }
    }

    /// Dispatch one typed ITCH message.
    ///
    /// Order-affecting messages route to the matching book operation;
    /// everything else is counted and dropped. With the default
    /// configuration this never fails: protocol violations are skipped
    /// and tallied in [`protocol_errors`](Self::protocol_errors).
    pub fn apply(&mut self, message: &ItchMessage) -> Result<()> {
        match *message {
            ItchMessage::StockDirectory { locate, stock } => {
                let symbol = Symbol::new(locate, stock);
                self.add_symbol(symbol);
                self.add_book(locate);
                Ok(())
            }
            ItchMessage::AddOrder {
                order_ref,
                locate,
                side,
                shares,
                price,
                ..
            } => self.add_order(order_ref, locate, side, price, shares),
            // MPID attribution is discarded; book effect is identical.
            ItchMessage::AddOrderMpid {
                order_ref,
                locate,
                side,
                shares,
                price,
                ..
            } => self.add_order(order_ref, locate, side, price, shares),
            ItchMessage::OrderExecuted {
                order_ref,
                locate,
                executed,
                ..
            } => self.execute_order(order_ref, locate, executed),
            ItchMessage::OrderExecutedWithPrice {
                order_ref,
                locate,
                executed,
                execution_price,
                ..
            } => self.execute_order_at(order_ref, locate, execution_price, executed),
            ItchMessage::OrderCancel {
                order_ref,
                locate,
                canceled,
            } => self.reduce_order(order_ref, locate, canceled),
            ItchMessage::OrderDelete { order_ref, locate } => {
                self.delete_order(order_ref, locate)
            }
            ItchMessage::OrderReplace {
                original_ref,
                locate,
                new_ref,
                shares,
                price,
            } => self.replace_order(original_ref, locate, new_ref, price, shares),
            _ => {
                self.ignored_messages += 1;
                Ok(())
            }
        }
    }

    fn ensure_locate(&mut self, locate: u16) {
        let needed = locate as usize + 1;
        if self.symbols.len() < needed {
            self.symbols.resize_with(needed, || None);
            self.books.resize_with(needed, || None);
        }
    }

    fn protocol_violation(&mut self, err: ReplayError) -> Result<()> {
        self.protocol_errors += 1;
        if self.config.log_warnings {
            log::debug!("skipping operation: {err}");
        }
        if self.config.strict {
            Err(err)
        } else {
            Ok(())
        }
    }
}

/// Emit the level-kind callback followed by the book-changed callback.
fn emit_level<H: MarketObserver>(
    observer: &mut H,
    book: &Book,
    update: &LevelUpdate,
    symbol: u16,
) {
    match update.kind {
        UpdateKind::Add => observer.on_add_level(book, &update.level, update.top),
        UpdateKind::Update => observer.on_update_level(book, &update.level, update.top),
        UpdateKind::Delete => observer.on_delete_level(book, &update.level, update.top),
    }
    observer.on_update_book(book, update.top, symbol);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::CountingObserver;
    use crate::types::{LevelInfo, Order};

    fn registry() -> MarketRegistry<CountingObserver> {
        let mut market = MarketRegistry::new(CountingObserver::new());
        market.add_symbol(Symbol::new(42, *b"TEST    "));
        market.add_book(42);
        market
    }

    #[test]
    fn test_symbol_and_book_creation() {
        let market = registry();
        assert_eq!(market.symbol(42).unwrap().ticker(), "TEST");
        assert!(market.book(42).is_some());
        assert_eq!(market.book_count(), 1);
        assert_eq!(market.observer().stats().max_symbols, 1);
        assert_eq!(market.observer().stats().max_books, 1);
    }

    #[test]
    fn test_duplicate_directory_keeps_book_state() {
        let mut market = registry();
        market.add_order(1, 42, Side::Buy, 100, 10).unwrap();

        // A repeated directory message must not wipe the book.
        market.add_symbol(Symbol::new(42, *b"TEST    "));
        market.add_book(42);
        assert_eq!(market.book(42).unwrap().order_count(), 1);
        assert_eq!(market.observer().stats().max_books, 1);
    }

    #[test]
    fn test_add_and_execute_flow() {
        let mut market = registry();
        market.add_order(1, 42, Side::Buy, 10_000, 100).unwrap();
        market.execute_order(1, 42, 30).unwrap();
        market.execute_order(1, 42, 70).unwrap();

        let stats = market.observer().stats();
        assert_eq!(stats.add_orders, 1);
        assert_eq!(stats.execute_orders, 2);
        assert_eq!(stats.update_orders, 1);
        assert_eq!(stats.delete_orders, 1);
        assert_eq!(stats.orders, 0);
        assert!(market.book(42).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_order_is_skipped_and_counted() {
        let mut market = registry();
        market.delete_order(999, 42).unwrap();
        market.execute_order(999, 42, 10).unwrap();
        assert_eq!(market.protocol_errors(), 2);
    }

    #[test]
    fn test_unknown_locate_is_skipped_and_counted() {
        let mut market = registry();
        market.add_order(1, 77, Side::Buy, 100, 10).unwrap();
        assert_eq!(market.protocol_errors(), 1);
    }

    #[test]
    fn test_duplicate_add_is_skipped_and_counted() {
        let mut market = registry();
        market.add_order(1, 42, Side::Buy, 100, 10).unwrap();
        market.add_order(1, 42, Side::Buy, 200, 20).unwrap();

        assert_eq!(market.protocol_errors(), 1);
        // The resting order is untouched.
        assert_eq!(market.book(42).unwrap().order(1).unwrap().price, 100);
    }

    #[test]
    fn test_strict_mode_surfaces_violations() {
        let mut market = MarketRegistry::with_config(
            ReplayConfig::new().with_strict(true).with_logging(false),
            CountingObserver::new(),
        );
        market.add_symbol(Symbol::new(1, *b"X       "));
        market.add_book(1);

        let err = market.delete_order(5, 1).unwrap_err();
        assert!(matches!(err, ReplayError::UnknownOrder(5)));
        assert_eq!(market.protocol_errors(), 1);
    }

    #[test]
    fn test_apply_dispatches_and_counts() {
        let mut market = MarketRegistry::new(CountingObserver::new());

        market
            .apply(&ItchMessage::StockDirectory {
                locate: 3,
                stock: *b"ABC     ",
            })
            .unwrap();
        market
            .apply(&ItchMessage::AddOrder {
                order_ref: 9,
                locate: 3,
                side: Side::Sell,
                shares: 50,
                stock: *b"ABC     ",
                price: 777,
            })
            .unwrap();
        market
            .apply(&ItchMessage::SystemEvent {
                locate: 0,
                event: b'O',
            })
            .unwrap();
        market
            .apply(&ItchMessage::Trade {
                locate: 3,
                shares: 5,
                price: 777,
            })
            .unwrap();

        assert_eq!(market.ignored_messages(), 2);
        assert_eq!(market.book(3).unwrap().best_ask_price(), Some(777));
    }

    #[test]
    fn test_apply_mpid_matches_plain_add() {
        let mut market = registry();
        market
            .apply(&ItchMessage::AddOrderMpid {
                order_ref: 5,
                locate: 42,
                side: Side::Buy,
                shares: 10,
                stock: *b"TEST    ",
                price: 5_000,
                mpid: *b"VIRT",
            })
            .unwrap();
        assert_eq!(market.book(42).unwrap().best_bid_price(), Some(5_000));
    }

    #[test]
    fn test_replace_flow_callbacks() {
        let mut market = registry();
        market.add_order(100, 42, Side::Buy, 200, 10).unwrap();
        market.replace_order(100, 42, 101, 210, 5).unwrap();

        let book = market.book(42).unwrap();
        assert!(book.order(100).is_none());
        assert_eq!(book.order(101).unwrap().quantity, 5);
        assert_eq!(book.best_bid_price(), Some(210));

        let stats = market.observer().stats();
        assert_eq!(stats.add_orders, 2);
        assert_eq!(stats.delete_orders, 1);
        assert_eq!(stats.orders, 1);
    }

    #[test]
    fn test_locate_table_grows_on_demand() {
        let mut market = MarketRegistry::new(CountingObserver::new());
        market.add_symbol(Symbol::new(20_000, *b"BIG     "));
        market.add_book(20_000);
        market
            .add_order(1, 20_000, Side::Buy, 100, 10)
            .unwrap();
        assert_eq!(market.book(20_000).unwrap().order_count(), 1);
    }

    // ========================================================================
    // Callback ordering
    // ========================================================================

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        AddLevel(u32, bool),
        UpdateLevel(u32, bool),
        DeleteLevel(u32, bool),
        UpdateBook(bool),
        AddOrder(u64),
        UpdateOrder(u64),
        DeleteOrder(u64),
        Execute(u64, u32, u32),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl MarketObserver for Recorder {
        fn on_update_book(&mut self, _book: &Book, top: bool, _symbol: u16) {
            self.events.push(Event::UpdateBook(top));
        }
        fn on_add_level(&mut self, _book: &Book, level: &LevelInfo, top: bool) {
            self.events.push(Event::AddLevel(level.price, top));
        }
        fn on_update_level(&mut self, _book: &Book, level: &LevelInfo, top: bool) {
            self.events.push(Event::UpdateLevel(level.price, top));
        }
        fn on_delete_level(&mut self, _book: &Book, level: &LevelInfo, top: bool) {
            self.events.push(Event::DeleteLevel(level.price, top));
        }
        fn on_add_order(&mut self, order: &Order) {
            self.events.push(Event::AddOrder(order.id));
        }
        fn on_update_order(&mut self, order: &Order) {
            self.events.push(Event::UpdateOrder(order.id));
        }
        fn on_delete_order(&mut self, order: &Order) {
            self.events.push(Event::DeleteOrder(order.id));
        }
        fn on_execute_order(&mut self, order: &Order, price: u32, quantity: u32) {
            self.events.push(Event::Execute(order.id, price, quantity));
        }
    }

    fn recording_registry() -> MarketRegistry<Recorder> {
        let mut market = MarketRegistry::new(Recorder::default());
        market.add_symbol(Symbol::new(1, *b"REC     "));
        market.add_book(1);
        market
    }

    #[test]
    fn test_add_order_callback_order() {
        let mut market = recording_registry();
        market.add_order(1, 1, Side::Buy, 100, 10).unwrap();

        assert_eq!(
            market.observer().events,
            vec![
                Event::AddOrder(1),
                Event::AddLevel(100, true),
                Event::UpdateBook(true),
            ]
        );
    }

    #[test]
    fn test_cancel_callback_order() {
        let mut market = recording_registry();
        market.add_order(1, 1, Side::Buy, 100, 10).unwrap();
        market.add_order(2, 1, Side::Buy, 100, 10).unwrap();

        let start = market.observer().events.len();
        market.reduce_order(1, 1, 4).unwrap();
        assert_eq!(
            market.observer().events[start..],
            [
                Event::UpdateOrder(1),
                Event::UpdateLevel(100, true),
                Event::UpdateBook(true),
            ]
        );

        let start = market.observer().events.len();
        market.reduce_order(1, 1, 999).unwrap();
        assert_eq!(
            market.observer().events[start..],
            [
                Event::DeleteOrder(1),
                Event::UpdateLevel(100, true),
                Event::UpdateBook(true),
            ]
        );
    }

    #[test]
    fn test_delete_callback_order() {
        let mut market = recording_registry();
        market.add_order(1, 1, Side::Sell, 300, 10).unwrap();

        let start = market.observer().events.len();
        market.delete_order(1, 1).unwrap();
        assert_eq!(
            market.observer().events[start..],
            [
                Event::DeleteLevel(300, true),
                Event::UpdateBook(true),
                Event::DeleteOrder(1),
            ]
        );
    }

    #[test]
    fn test_execute_callback_order() {
        let mut market = recording_registry();
        market.add_order(1, 1, Side::Buy, 100, 10).unwrap();

        let start = market.observer().events.len();
        market.execute_order_at(1, 1, 99, 4).unwrap();
        assert_eq!(
            market.observer().events[start..],
            [
                Event::Execute(1, 99, 4),
                Event::UpdateLevel(100, true),
                Event::UpdateBook(true),
                Event::UpdateOrder(1),
            ]
        );

        let start = market.observer().events.len();
        market.execute_order(1, 1, 6).unwrap();
        assert_eq!(
            market.observer().events[start..],
            [
                Event::Execute(1, 100, 6),
                Event::DeleteLevel(100, true),
                Event::UpdateBook(true),
                Event::DeleteOrder(1),
            ]
        );
    }

    #[test]
    fn test_replace_callback_order() {
        let mut market = recording_registry();
        market.add_order(1, 1, Side::Buy, 100, 10).unwrap();

        let start = market.observer().events.len();
        market.replace_order(1, 1, 2, 110, 5).unwrap();
        assert_eq!(
            market.observer().events[start..],
            [
                Event::DeleteLevel(100, true),
                Event::UpdateBook(true),
                Event::DeleteOrder(1),
                Event::AddOrder(2),
                Event::AddLevel(110, true),
                Event::UpdateBook(true),
            ]
        );
    }

    #[test]
    fn test_modify_callback_order() {
        let mut market = recording_registry();
        market.add_order(1, 1, Side::Buy, 100, 10).unwrap();

        let start = market.observer().events.len();
        market.modify_order(1, 1, 110, 5).unwrap();
        assert_eq!(
            market.observer().events[start..],
            [
                Event::DeleteLevel(100, true),
                Event::UpdateBook(true),
                Event::UpdateOrder(1),
                Event::AddLevel(110, true),
                Event::UpdateBook(true),
            ]
        );
    }
}
