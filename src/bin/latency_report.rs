use clap::Parser;
use exchange_book::logging::{init_logging, LogFormat};
use exchange_book::{BookConfig, Engine, HybridIndex, IndexKind, OrderCommand, PriceIndex, RadixIndex, Side};
use hdrhistogram::Histogram;
use std::time::{Duration, Instant};

/// Per-command latency percentiles for a synthetic order flow.
#[derive(Parser)]
#[command(name = "latency-report")]
struct Cli {
    #[command(flatten)]
    book: BookConfig,

    /// Commands to time
    #[arg(long, default_value_t = 1_000_000)]
    iterations: u64,

    /// Seed of the order flow generator
    #[arg(long, default_value_t = 12_345)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

/// Limit orders around a drifting mid, with cancels and amends of recent orders.
struct OrderFlow {
    rng: u64,
    next_id: u64,
    mid: u64,
}

impl OrderFlow {
    fn new(seed: u64) -> Self {
        Self {
            rng: seed,
            next_id: 0,
            mid: 1_000_000,
        }
    }

    fn next(&mut self) -> OrderCommand {
        self.rng = self.rng.wrapping_mul(6364136223846793005).wrapping_add(1);
        // High bits, LCG low bits are poor
        let r = self.rng >> 32;

        if r % 97 == 0 {
            self.mid = (self.mid + r % 11).saturating_sub(5).max(1_000);
        }

        let uid = r % 64;
        match r % 10 {
            0 | 1 if self.next_id > 0 => {
                let back = r % self.next_id.min(16);
                OrderCommand::cancel(self.next_id - back, uid)
            }
            2 if self.next_id > 0 => {
                let back = r % self.next_id.min(8);
                OrderCommand::amend(self.next_id - back, uid, Some(self.mid + r % 200 - 100), None)
            }
            _ => {
                self.next_id += 1;
                let side = if r & 0x100 == 0 { Side::Bid } else { Side::Ask };
                let offset = r % 150;
                let price = match side {
                    Side::Bid => self.mid - offset,
                    Side::Ask => self.mid + offset,
                };
                OrderCommand::limit(self.next_id, uid, side, price, 1 + r % 100)
            }
        }
    }
}

fn measure<I: PriceIndex>(cli: &Cli) -> Result<(Histogram<u64>, Duration), Box<dyn std::error::Error>> {
    let mut engine: Engine<I> = Engine::new(&cli.book)?;
    engine.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3)?;
    let mut flow = OrderFlow::new(cli.seed);
    let mut total = Duration::ZERO;

    for _ in 0..cli.iterations {
        let cmd = flow.next();

        let start = Instant::now();
        std::hint::black_box(engine.process_command(&cmd));
        let elapsed = start.elapsed();

        // Outliers above the histogram bound are saturated
        histogram.saturating_record(elapsed.as_nanos() as u64);
        total += elapsed;
    }

    tracing::info!(
        resting = engine.order_count(),
        best_bid = ?engine.best_bid(),
        best_ask = ?engine.best_ask(),
        "order flow finished"
    );
    Ok((histogram, total))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;
    cli.book.validate()?;

    tracing::info!(index = ?cli.book.index, iterations = cli.iterations, "preparing latency run");
    let (histogram, total) = match cli.book.index {
        IndexKind::Hybrid => measure::<HybridIndex>(&cli)?,
        IndexKind::Radix => measure::<RadixIndex>(&cli)?,
    };

    println!("\n=== Latency Report (ns, {:?} index) ===", cli.book.index);
    println!("Total Ops:  {}", cli.iterations);
    println!("Throughput: {:.2} ops/sec", cli.iterations as f64 / total.as_secs_f64());
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for v in histogram.iter_log(100, 2.0) {
        let count = v.count_since_last_iteration();
        if count > 0 {
            println!("<= {:6} ns: {:10} count", v.value_iterated_to(), count);
        }
    }
    Ok(())
}
