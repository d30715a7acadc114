use clap::Parser;
use exchange_book::logging::{init_logging, LogFormat};
use exchange_book::replay::read_commands;
use exchange_book::{BookConfig, Engine, HybridIndex, IndexKind, OrderCommand, PriceIndex, RadixIndex, ResultCode};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Run a CSV command file through one book and print the final depth.
#[derive(Parser)]
#[command(name = "replay")]
struct Cli {
    /// CSV file: command,order_id,uid,side,type,price,size,timestamp
    input: PathBuf,

    #[command(flatten)]
    book: BookConfig,

    /// Ticks per price unit (100 for cents)
    #[arg(long, default_value_t = 100)]
    price_scale: u64,

    /// Levels per side to print
    #[arg(long, default_value_t = 10)]
    depth: usize,

    /// Print every event as it happens
    #[arg(long)]
    events: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Default)]
struct Summary {
    commands: usize,
    rejected: usize,
    trades: usize,
    traded_volume: u64,
}

fn run<I: PriceIndex>(cli: &Cli, commands: &[OrderCommand]) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine: Engine<I> = Engine::new(&cli.book)?;
    let mut summary = Summary::default();

    for cmd in commands {
        let result = engine.process_command(cmd);
        summary.commands += 1;
        if result.code != ResultCode::Success {
            summary.rejected += 1;
        }
        for event in &result.events {
            if event.is_trade() {
                summary.trades += 1;
                summary.traded_volume += event.size;
            }
            if cli.events {
                println!("{event:?}");
            }
        }
        if let Some(data) = result.market_data {
            println!("{data}");
        }
    }

    engine.validate()?;
    tracing::info!(?summary, resting = engine.order_count(), "replay finished");

    let snapshot = engine.l2_snapshot(cli.depth);
    println!("{:>12} {:>12} {:>6}", "ASK", "VOLUME", "ORDERS");
    for i in (0..snapshot.ask_size()).rev() {
        println!(
            "{:>12} {:>12} {:>6}",
            snapshot.ask_prices[i], snapshot.ask_volumes[i], snapshot.ask_orders[i]
        );
    }
    println!("{:>12} {:>12} {:>6}", "BID", "VOLUME", "ORDERS");
    for i in 0..snapshot.bid_size() {
        println!(
            "{:>12} {:>12} {:>6}",
            snapshot.bid_prices[i], snapshot.bid_volumes[i], snapshot.bid_orders[i]
        );
    }
    println!("state hash: {:016x}", engine.state_hash());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;
    cli.book.validate()?;

    let file = File::open(&cli.input)?;
    let commands = read_commands(BufReader::new(file), cli.book.symbol, cli.price_scale)?;
    tracing::info!(path = %cli.input.display(), commands = commands.len(), "loaded commands");

    match cli.book.index {
        IndexKind::Hybrid => run::<HybridIndex>(&cli, &commands),
        IndexKind::Radix => run::<RadixIndex>(&cli, &commands),
    }
}
