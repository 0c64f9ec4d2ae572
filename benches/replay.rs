//! Benchmarks for book reconstruction throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use itch_lob_replay::{ItchMessage, MarketRegistry, NullObserver, Side, Symbol};

/// A plausible single-symbol message mix: adds spread over ten price
/// points per side, with interleaved executions and deletes.
fn create_test_messages(count: usize) -> Vec<ItchMessage> {
    let mut messages = Vec::with_capacity(count);
    let base_price: u32 = 1_000_000; // $100.00

    for i in 0..count {
        let order_ref = (i + 1) as u64;
        let is_bid = i % 2 == 0;
        let price_offset = ((i % 10) as u32) * 100; // $0.01 increments

        let price = if is_bid {
            base_price - price_offset
        } else {
            base_price + 100 + price_offset
        };

        messages.push(ItchMessage::AddOrder {
            order_ref,
            locate: 1,
            side: if is_bid { Side::Buy } else { Side::Sell },
            shares: ((i % 100) + 1) as u32,
            stock: *b"BENCH   ",
            price,
        });

        // Retire a quarter of the flow through executions and another
        // quarter through deletes, staying a few thousand orders deep.
        if i % 4 == 3 && i >= 16 {
            messages.push(ItchMessage::OrderExecuted {
                order_ref: (i - 15) as u64,
                locate: 1,
                executed: 1_000,
                match_number: i as u64,
            });
        } else if i % 4 == 1 && i >= 16 {
            messages.push(ItchMessage::OrderDelete {
                order_ref: (i - 15) as u64,
                locate: 1,
            });
        }
    }

    messages
}

fn bench_reconstruction(c: &mut Criterion) {
    let messages = create_test_messages(10_000);

    let mut group = c.benchmark_group("reconstruction");
    group.throughput(Throughput::Elements(messages.len() as u64));

    group.bench_function("apply_messages", |b| {
        b.iter(|| {
            let mut market = MarketRegistry::new(NullObserver);
            market.add_symbol(Symbol::new(1, *b"BENCH   "));
            market.add_book(1);
            for message in &messages {
                let _ = black_box(market.apply(message));
            }
        })
    });

    group.finish();
}

fn bench_book_queries(c: &mut Criterion) {
    // Build a populated book first
    let messages = create_test_messages(1_000);
    let mut market = MarketRegistry::new(NullObserver);
    market.add_symbol(Symbol::new(1, *b"BENCH   "));
    market.add_book(1);
    for message in &messages {
        let _ = market.apply(message);
    }

    let book = market.book(1).unwrap();

    let mut group = c.benchmark_group("book_queries");

    group.bench_function("best_bid_price", |b| {
        b.iter(|| black_box(book.best_bid_price()))
    });

    group.bench_function("mid_price", |b| b.iter(|| black_box(book.mid_price())));

    group.bench_function("levels_snapshot", |b| {
        b.iter(|| black_box(book.levels(Side::Buy)))
    });

    group.finish();
}

criterion_group!(benches, bench_reconstruction, bench_book_queries);
criterion_main!(benches);
