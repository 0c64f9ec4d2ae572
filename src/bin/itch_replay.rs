//! ITCH 5.0 replay CLI.
//!
//! Reads a raw TotalView-ITCH 5.0 stream from a file or standard
//! input, reconstructs every order book, and reports throughput and
//! market statistics at end of stream.
//!
//! # Usage
//!
//! ```bash
//! # Replay a captured session file
//! cargo run --release --bin itch_replay -- --input data/01302019.NASDAQ_ITCH50
//!
//! # Or pipe the stream in
//! zcat data/01302019.NASDAQ_ITCH50.gz | cargo run --release --bin itch_replay
//!
//! # Machine-readable summary
//! cargo run --release --bin itch_replay -- -i data/session.itch --json
//! ```

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use itch_lob_replay::{CountingObserver, ItchParser, MarketRegistry, MarketStats, Result};

/// Command-line arguments
struct Args {
    /// Input file with raw ITCH frames; stdin when absent
    input: Option<PathBuf>,
    /// Emit the summary as JSON instead of text
    json: bool,
}

fn parse_args() -> std::result::Result<Args, String> {
    let args: Vec<String> = std::env::args().collect();

    let mut input: Option<PathBuf> = None;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                i += 1;
                if i >= args.len() {
                    return Err("--input requires a path".to_string());
                }
                input = Some(PathBuf::from(&args[i]));
            }
            "--json" => {
                json = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg => {
                if input.is_none() && !arg.starts_with('-') {
                    input = Some(PathBuf::from(arg));
                } else {
                    return Err(format!("Unknown argument: {}", arg));
                }
            }
        }
        i += 1;
    }

    Ok(Args { input, json })
}

fn print_help() {
    eprintln!(
        r#"
ITCH 5.0 Order Book Replay

Reconstructs per-symbol limit order books from a raw NASDAQ
TotalView-ITCH 5.0 stream and reports market statistics.

USAGE:
    itch_replay [OPTIONS] [INPUT]

OPTIONS:
    -i, --input <PATH>    Input file with raw ITCH frames (default: stdin)
        --json            Print the summary as JSON
    -h, --help            Print this help message

EXAMPLES:
    # Replay a captured session file
    itch_replay -i data/01302019.NASDAQ_ITCH50

    # Pipe a compressed capture through
    zcat capture.itch.gz | itch_replay
"#
    );
}

/// End-of-stream report.
#[derive(Debug, Serialize)]
struct Summary {
    messages: u64,
    parse_errors: u64,
    protocol_errors: u64,
    ignored_messages: u64,
    trailing_bytes: usize,
    elapsed_ns: u128,
    stats: MarketStats,
}

impl Summary {
    fn print_text(&self) {
        let elapsed_s = self.elapsed_ns as f64 / 1e9;
        let messages = self.messages.max(1);
        let updates = self.stats.updates.max(1);

        println!();
        println!("Errors: {}", self.parse_errors);
        println!("Protocol violations: {}", self.protocol_errors);
        if self.trailing_bytes > 0 {
            println!("Trailing partial frame: {} bytes", self.trailing_bytes);
        }
        println!();
        println!("Processing time: {}", format_duration(elapsed_s));
        println!("Total ITCH messages: {}", self.messages);
        println!(
            "ITCH message latency: {} ns",
            self.elapsed_ns / u128::from(messages)
        );
        println!(
            "ITCH message throughput: {:.0} msg/s",
            self.messages as f64 / elapsed_s.max(1e-9)
        );
        println!("Total market updates: {}", self.stats.updates);
        println!(
            "Market update latency: {} ns",
            self.elapsed_ns / u128::from(updates)
        );
        println!(
            "Market update throughput: {:.0} upd/s",
            self.stats.updates as f64 / elapsed_s.max(1e-9)
        );
        println!();
        println!("Market statistics:");
        println!("  Max symbols: {}", self.stats.max_symbols);
        println!("  Max order books: {}", self.stats.max_books);
        println!(
            "  Max order book levels: {}{}",
            self.stats.max_book_depth,
            match self.stats.deepest_symbol {
                Some(locate) => format!(" (locate {locate})"),
                None => String::new(),
            }
        );
        println!("  Max orders: {}", self.stats.max_orders);
        println!();
        println!("Order statistics:");
        println!("  Add order operations: {}", self.stats.add_orders);
        println!("  Update order operations: {}", self.stats.update_orders);
        println!("  Delete order operations: {}", self.stats.delete_orders);
        println!("  Execute order operations: {}", self.stats.execute_orders);
    }
}

fn format_duration(secs: f64) -> String {
    if secs >= 60.0 {
        format!("{:.1} min", secs / 60.0)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1} ms", secs * 1e3)
    }
}

fn run(args: &Args) -> Result<Summary> {
    let mut input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(std::io::stdin().lock()),
    };

    let mut parser = ItchParser::new();
    let mut market = MarketRegistry::new(CountingObserver::new());

    let mut buffer = [0u8; 8192];
    let start = Instant::now();

    loop {
        let read = input.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        parser.process(&buffer[..read], |message| {
            // Default config: violations are counted, never surfaced.
            let _ = market.apply(&message);
        });
    }

    let elapsed = start.elapsed();
    if parser.pending() > 0 {
        log::warn!(
            "input ended inside a frame; {} bytes dropped",
            parser.pending()
        );
    }

    Ok(Summary {
        messages: parser.messages(),
        parse_errors: parser.errors(),
        protocol_errors: market.protocol_errors(),
        ignored_messages: market.ignored_messages(),
        trailing_bytes: parser.pending(),
        elapsed_ns: elapsed.as_nanos(),
        stats: market.into_observer().into_stats(),
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    if !args.json {
        println!("ITCH processing...");
    }

    match run(&args) {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Error serializing summary: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                summary.print_text();
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
