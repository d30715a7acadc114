//! Determinism Test - Golden Master verification.
//!
//! Verifies that the engine produces identical results across runs
//! when given the same input sequence, and that both price indexes
//! drive the book to the same state through the same events.

use exchange_book::{
    BookConfig, Engine, HybridIndex, MatcherTradeEvent, OrderCommand, PriceIndex, RadixIndex, ResultCode, Side,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate a deterministic sequence of commands
fn generate_commands(seed: u64, count: usize) -> Vec<OrderCommand> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut commands = Vec::with_capacity(count);
    let mut active_orders: Vec<(u64, u64)> = Vec::new();
    let mut next_order_id = 1u64;

    for ts in 0..count as i64 {
        let roll = rng.gen_range(0..100);
        let cmd = if active_orders.is_empty() || roll < 55 {
            let order_id = next_order_id;
            next_order_id += 1;
            let uid = rng.gen_range(1..50);
            let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
            // 950.00 to 1050.00, with a tail of far prices
            let price = if rng.gen_bool(0.05) {
                rng.gen_range(1..2_000_000)
            } else {
                rng.gen_range(95_000..105_000)
            };
            let size = rng.gen_range(1..500);
            active_orders.push((order_id, uid));
            match rng.gen_range(0..10) {
                0 => OrderCommand::ioc(order_id, uid, side, price, size),
                1 => OrderCommand::market(order_id, uid, side, size),
                _ => OrderCommand::limit(order_id, uid, side, price, size),
            }
        } else {
            let idx = rng.gen_range(0..active_orders.len());
            let (order_id, uid) = active_orders[idx];
            match roll {
                55..=74 => {
                    active_orders.swap_remove(idx);
                    OrderCommand::cancel(order_id, uid)
                }
                75..=89 => {
                    let price = rng.gen_bool(0.8).then(|| rng.gen_range(95_000..105_000));
                    let size = rng.gen_bool(0.3).then(|| rng.gen_range(1..300));
                    OrderCommand::amend(order_id, uid, price, size)
                }
                _ => OrderCommand::reduce(order_id, uid, rng.gen_range(1..200)),
            }
        };
        commands.push(cmd.at(ts));
    }

    commands
}

/// Compute a hash of all output events
fn hash_events(events: &[MatcherTradeEvent]) -> u64 {
    let mut hasher = DefaultHasher::new();
    events.hash(&mut hasher);
    hasher.finish()
}

fn config() -> BookConfig {
    // Narrow window so far prices and re-anchoring are exercised
    BookConfig::default().with_capacity(1 << 12, 1 << 10).with_hot_window(256)
}

/// Run the engine with a command sequence and return (event hash, state hash)
fn run_engine<I: PriceIndex>(commands: &[OrderCommand]) -> (u64, u64) {
    let mut engine: Engine<I> = Engine::new(&config()).unwrap();
    let mut all_events = Vec::new();

    for cmd in commands {
        let result = engine.process_command(cmd);
        all_events.extend(result.events);
    }
    engine.validate().unwrap();

    (hash_events(&all_events), engine.state_hash())
}

#[test]
fn test_determinism_small() {
    const SEED: u64 = 0xDEADBEEF;
    const COUNT: usize = 1000;
    const RUNS: usize = 10;

    let commands = generate_commands(SEED, COUNT);
    let (first_event_hash, first_state_hash) = run_engine::<HybridIndex>(&commands);

    for run in 1..RUNS {
        let (event_hash, state_hash) = run_engine::<HybridIndex>(&commands);
        assert_eq!(event_hash, first_event_hash, "Event hash mismatch on run {}", run);
        assert_eq!(state_hash, first_state_hash, "State hash mismatch on run {}", run);
    }

    println!("  Event hash: {:#018x}", first_event_hash);
    println!("  State hash: {:#018x}", first_state_hash);
}

#[test]
fn test_determinism_large() {
    const SEED: u64 = 0xCAFEBABE;
    const COUNT: usize = 100_000;
    const RUNS: usize = 3;

    let commands = generate_commands(SEED, COUNT);
    let (first_event_hash, first_state_hash) = run_engine::<RadixIndex>(&commands);

    for run in 1..RUNS {
        let (event_hash, state_hash) = run_engine::<RadixIndex>(&commands);
        assert_eq!(event_hash, first_event_hash, "Event hash mismatch on run {}", run);
        assert_eq!(state_hash, first_state_hash, "State hash mismatch on run {}", run);
    }
}

#[test]
fn test_indexes_agree() {
    for seed in [1u64, 7, 0xFEED, 0xC0FFEE] {
        let commands = generate_commands(seed, 20_000);
        let hybrid = run_engine::<HybridIndex>(&commands);
        let radix = run_engine::<RadixIndex>(&commands);
        assert_eq!(hybrid, radix, "Index implementations diverged for seed {:#x}", seed);
    }
}

#[test]
fn test_indexes_agree_step_by_step() {
    let commands = generate_commands(0xABCD, 5_000);
    let mut hybrid: Engine<HybridIndex> = Engine::new(&config()).unwrap();
    let mut radix: Engine<RadixIndex> = Engine::new(&config()).unwrap();

    for (i, cmd) in commands.iter().enumerate() {
        let a = hybrid.process_command(cmd);
        let b = radix.process_command(cmd);
        assert_eq!(a, b, "Results diverged at command {}: {:?}", i, cmd);
        assert_eq!(hybrid.best_bid(), radix.best_bid(), "Best bid diverged at command {}", i);
        assert_eq!(hybrid.best_ask(), radix.best_ask(), "Best ask diverged at command {}", i);
    }
    assert_eq!(hybrid.l2_snapshot(usize::MAX), radix.l2_snapshot(usize::MAX));
}

#[test]
fn test_reset_restores_initial_state() {
    let commands = generate_commands(99, 2_000);
    let mut engine: Engine<HybridIndex> = Engine::new(&config()).unwrap();
    let empty_hash = engine.state_hash();

    for cmd in &commands {
        engine.process_command(cmd);
    }
    assert_ne!(engine.state_hash(), empty_hash);

    assert_eq!(engine.process_command(&OrderCommand::reset()).code, ResultCode::Success);
    assert_eq!(engine.state_hash(), empty_hash);

    // Replaying after a reset reproduces a fresh run
    for cmd in &commands {
        engine.process_command(cmd);
    }
    let (_, fresh_state) = run_engine::<HybridIndex>(&commands);
    assert_eq!(engine.state_hash(), fresh_state);
}

#[test]
fn test_different_seeds_produce_different_results() {
    let (hash1, _) = run_engine::<HybridIndex>(&generate_commands(1, 1000));
    let (hash2, _) = run_engine::<HybridIndex>(&generate_commands(2, 1000));
    assert_ne!(hash1, hash2, "Different seeds should produce different results");
}
