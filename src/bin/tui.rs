use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use exchange_book::{
    BookConfig, Engine, HybridIndex, IndexKind, L2MarketData, OrderCommand, PriceIndex, RadixIndex, Side,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::{io, time::Duration};

/// Live depth view of a book under synthetic load.
#[derive(Parser)]
#[command(name = "tui-demo")]
struct Cli {
    #[command(flatten)]
    book: BookConfig,

    /// Levels per side on screen
    #[arg(long, default_value_t = 15)]
    depth: usize,
}

struct SharedStats {
    ops_count: AtomicU64,
    avg_latency_ns: AtomicU64,
    trades: AtomicU64,
    resting: AtomicU64,
    capacity: u64,
    snapshot: RwLock<L2MarketData>,
}

impl SharedStats {
    fn new(capacity: u64) -> Self {
        Self {
            ops_count: AtomicU64::new(0),
            avg_latency_ns: AtomicU64::new(0),
            trades: AtomicU64::new(0),
            resting: AtomicU64::new(0),
            capacity,
            snapshot: RwLock::new(L2MarketData::default()),
        }
    }
}

/// `price | bar | volume` lines, bars scaled to the largest level.
fn render_level_bars(levels: &[(u64, u64)]) -> String {
    let max_volume = levels.iter().map(|(_, v)| *v).max().unwrap_or(1).max(1) as f64;
    let mut out = String::new();
    for &(price, volume) in levels {
        // Fixed point, two decimals
        let price_fmt = format!("{:.2}", price as f64 / 100.0);
        let bar = "█".repeat(((volume as f64 / max_volume) * 20.0) as usize);
        out.push_str(&format!("{price_fmt:>10} {bar:<20} {volume:<6}\n"));
    }
    out
}

/// Random walk order flow; publishes a snapshot every 50 batches.
fn drive<I: PriceIndex>(config: BookConfig, depth: usize, stats: Arc<SharedStats>) {
    let mut engine: Engine<I> = match Engine::new(&config) {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!(%err, "invalid book configuration");
            return;
        }
    };
    engine.warm_up();

    let mut order_id = 1u64;
    let mut rng = 12345u64;
    let mut loop_count = 0u64;
    // $3,000.00
    let mut mid = 300_000u64;
    const BATCH_SIZE: u64 = 1000;

    loop {
        let start_batch = std::time::Instant::now();
        let mut trades = 0;

        for _ in 0..BATCH_SIZE {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            let r = rng >> 32;

            if r % 100 == 0 {
                mid = (mid + r % 11).saturating_sub(5).max(1_000);
            }

            let cmd = if r % 5 == 0 {
                OrderCommand::cancel(order_id.saturating_sub(r % 64), r % 16)
            } else {
                order_id += 1;
                let side = if r % 2 == 0 { Side::Bid } else { Side::Ask };
                let offset = (100 + r % 400) / 2;
                let noise = r % 20;
                let price = match side {
                    Side::Bid => (mid + noise).saturating_sub(offset + 10),
                    Side::Ask => mid + offset + noise - 10,
                };
                OrderCommand::limit(order_id, r % 16, side, price.max(1), 1 + rng % 100)
            };
            let result = engine.process_command(&cmd);
            trades += result.events.iter().filter(|e| e.is_trade()).count() as u64;
        }
        loop_count += 1;

        let elapsed = start_batch.elapsed();
        stats.ops_count.fetch_add(BATCH_SIZE, Ordering::Relaxed);
        stats.trades.fetch_add(trades, Ordering::Relaxed);
        stats
            .avg_latency_ns
            .store(elapsed.as_nanos() as u64 / BATCH_SIZE, Ordering::Relaxed);
        stats.resting.store(engine.order_count() as u64, Ordering::Relaxed);

        if loop_count % 50 == 0 {
            if let Ok(mut guard) = stats.snapshot.write() {
                *guard = engine.l2_snapshot(depth);
            }
        }

        if engine.order_count() as u64 > stats.capacity * 9 / 10 {
            engine.reset();
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    cli.book.validate()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let stats = Arc::new(SharedStats::new(u64::from(cli.book.order_capacity)));
    let engine_stats = stats.clone();
    let config = cli.book.clone();
    let depth = cli.depth;
    thread::spawn(move || match config.index {
        IndexKind::Hybrid => drive::<HybridIndex>(config, depth, engine_stats),
        IndexKind::Radix => drive::<RadixIndex>(config, depth, engine_stats),
    });

    let mut last_ops = 0;
    let mut last_time = std::time::Instant::now();
    let mut throughput = 0.0;

    loop {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q') {
                    break;
                }
            }
        }

        let now = std::time::Instant::now();
        if now.duration_since(last_time).as_secs_f64() >= 1.0 {
            let current_ops = stats.ops_count.load(Ordering::Relaxed);
            throughput = (current_ops - last_ops) as f64;
            last_ops = current_ops;
            last_time = now;
        }

        let snapshot = match stats.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let bids: Vec<(u64, u64)> = snapshot.bids().collect();
        let asks: Vec<(u64, u64)> = snapshot.asks().collect();

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(7)])
                .split(f.size());

            let title = Paragraph::new(format!("{:?} index | Press 'q' to quit", cli.book.index))
                .block(Block::default().borders(Borders::ALL).title("Exchange Book Demo"))
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(title, chunks[0]);

            let book_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[1]);

            let bids_widget = Paragraph::new(render_level_bars(&bids)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("BIDS")
                    .style(Style::default().fg(Color::Green)),
            );
            let asks_widget = Paragraph::new(render_level_bars(&asks)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("ASKS")
                    .style(Style::default().fg(Color::Red)),
            );
            f.render_widget(bids_widget, book_chunks[0]);
            f.render_widget(asks_widget, book_chunks[1]);

            let ops_fmt = if throughput > 1_000_000.0 {
                format!("{:.2} M", throughput / 1_000_000.0)
            } else {
                format!("{:.0} k", throughput / 1_000.0)
            };
            let resting = stats.resting.load(Ordering::Relaxed);
            let stats_text = format!(
                "Throughput: {} ops/sec\nLatency (Avg Batch): {} ns\nTrades: {}\nResting: {} / {} ({:.1}%)",
                ops_fmt,
                stats.avg_latency_ns.load(Ordering::Relaxed),
                stats.trades.load(Ordering::Relaxed),
                resting,
                stats.capacity,
                resting as f64 / stats.capacity.max(1) as f64 * 100.0
            );
            let stats_block = Paragraph::new(stats_text)
                .block(Block::default().borders(Borders::ALL).title("Engine Telemetry"))
                .style(Style::default().fg(Color::Yellow));
            f.render_widget(stats_block, chunks[2]);
        })?;
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}
